//! Core orchestration for Proposalgen.
//!
//! Runs the four stages of a proposal (industry research, use case
//! ideation, resource discovery, proposal writing) against a model client
//! and a set of tool adapters, validates every stage, and assembles the
//! final document.

pub mod assembler;
pub mod citations;
pub mod context;
pub mod extract;
pub mod orchestrator;
pub mod prompts;
pub mod report;
pub mod runner;
pub mod sink;
pub mod spec;
pub mod validator;
pub mod workbook;

#[cfg(test)]
pub(crate) mod testing;

pub use assembler::assemble;
pub use context::SharedContext;
pub use orchestrator::{Orchestrator, ProgressReporter, SilentProgress};
pub use report::{ReportFile, ReportFiles, render_markdown, write_report};
pub use runner::StageRunner;
pub use sink::{NullSink, PersistenceSink};
pub use spec::{StageSpec, TemplateId};
pub use validator::{Candidate, Validation, Validator, ValidatorId};
pub use workbook::render_workbook;
