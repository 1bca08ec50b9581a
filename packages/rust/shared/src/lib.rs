//! Shared types, error model, and configuration for Proposalgen.
//!
//! This crate is the foundation depended on by all other Proposalgen crates.
//! It provides:
//! - [`ProposalError`]: the unified error type
//! - Domain types ([`Run`], [`StageResult`], [`Citation`], [`Document`], ...)
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)
//! - Input validation ([`ProposalInput`])

pub mod config;
pub mod error;
pub mod input;
pub mod proposal;
pub mod run;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CredentialStatus, DatasetToolConfig, DefaultsConfig, OpenRouterConfig,
    PipelineConfig, RepoToolConfig, RetryConfig, RetryPolicy, SearchToolConfig,
    ThresholdsConfig, ToolsConfig, TrustConfig, config_dir, config_file_path, credential_status,
    database_path, init_config, load_config, load_config_from, validate_config,
    validate_credentials,
};
pub use error::{ProposalError, Result};
pub use input::{ProposalInput, SUPPORTED_INDUSTRIES};
pub use proposal::{
    Document, DocumentSection, ProposalOutput, ProposalSection, ResearchOutput, ResourceEntry,
    ResourceOutput, SectionKind, StageOutput, UseCase, UseCaseOutput,
};
pub use run::{
    AttemptLog, AttemptOutcome, FailureKind, FailureReason, Run, RunStatus, Severity,
    StageResult, StageStatus, Violation,
};
pub use types::{
    Citation, ResultItem, RunId, SNAPSHOT_SCHEMA_VERSION, StageName, ToolCallRecord, ToolKind,
    TrustTier, UseCaseCategory, is_resolvable_url,
};
