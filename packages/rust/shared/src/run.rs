//! Run and StageResult state, with their forward-only transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProposalError, Result};
use crate::input::ProposalInput;
use crate::proposal::{Document, StageOutput};
use crate::types::{Citation, RunId, SNAPSHOT_SCHEMA_VERSION, StageName, ToolCallRecord};

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal forward move from `self`.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown run status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Success,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Violations and failures
// ---------------------------------------------------------------------------

/// How a validation violation affects acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Accepted, but flagged for QA.
    Degrade,
    /// Rejected; retried with the violation as feedback.
    Retry,
    /// Rejected; the stage fails without further attempts.
    Fatal,
}

/// One failed validator rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Stable rule identifier, e.g. `research.min_citations`.
    pub rule: String,
    pub message: String,
    pub severity: Severity,
}

impl Violation {
    pub fn new(rule: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
            severity,
        }
    }

    pub fn blocks(&self) -> bool {
        self.severity != Severity::Degrade
    }
}

/// Why a stage (and so the run) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    ModelUnavailable,
    ModelRateLimited,
    ModelTimeout,
    InvalidResponse,
    ValidationFailed,
    MissingContext,
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelUnavailable => "ModelUnavailable",
            Self::ModelRateLimited => "ModelRateLimited",
            Self::ModelTimeout => "ModelTimeout",
            Self::InvalidResponse => "InvalidResponse",
            Self::ValidationFailed => "ValidationFailed",
            Self::MissingContext => "MissingContext",
            Self::Timeout => "Timeout",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured terminal reason attached to a failed stage and Run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub stage: StageName,
    pub kind: FailureKind,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

impl FailureReason {
    pub fn new(stage: StageName, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            detail: detail.into(),
            violations: Vec::new(),
        }
    }

    pub fn with_violations(mut self, violations: Vec<Violation>) -> Self {
        self.violations = violations;
        self
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed ({}): {}", self.stage, self.kind, self.detail)
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    ModelError,
    Rejected,
    Timeout,
}

/// What happened in one attempt of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptLog {
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

/// The outcome of executing one stage.
///
/// Built while pending, then sealed exactly once by [`StageResult::succeed`]
/// or [`StageResult::fail`]. Sealed results are shared behind `Arc` and never
/// touched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: StageName,
    pub status: StageStatus,
    /// Raw model text of the last attempt.
    #[serde(default)]
    pub raw_output: Option<String>,
    /// Validated payload; present only on success.
    #[serde(default)]
    pub output: Option<StageOutput>,
    /// Tool calls of the last attempt, in request order.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub attempts: u32,
    #[serde(default)]
    pub degraded: bool,
    /// Degradation notes on success, blocking violations on failure.
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub attempt_log: Vec<AttemptLog>,
    #[serde(default)]
    pub failure: Option<FailureReason>,
}

impl StageResult {
    pub fn pending(stage: StageName) -> Self {
        Self {
            stage,
            status: StageStatus::Pending,
            raw_output: None,
            output: None,
            tool_calls: Vec::new(),
            citations: Vec::new(),
            attempts: 0,
            degraded: false,
            violations: Vec::new(),
            attempt_log: Vec::new(),
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StageStatus::Success
    }

    /// Start a new attempt. Returns its number (1-based).
    pub fn begin_attempt(&mut self) -> u32 {
        debug_assert_eq!(self.status, StageStatus::Pending);
        self.attempts += 1;
        self.attempts
    }

    pub fn log_attempt(&mut self, outcome: AttemptOutcome, detail: impl Into<String>, violations: Vec<Violation>) {
        self.attempt_log.push(AttemptLog {
            attempt: self.attempts,
            outcome,
            detail: detail.into(),
            violations,
        });
    }

    /// Seal as successful. Degradation notes are kept as violations.
    pub fn succeed(
        mut self,
        output: StageOutput,
        citations: Vec<Citation>,
        tool_calls: Vec<ToolCallRecord>,
        notes: Vec<Violation>,
    ) -> Self {
        self.status = StageStatus::Success;
        self.output = Some(output);
        self.citations = citations;
        self.tool_calls = tool_calls;
        self.degraded = !notes.is_empty()
            || self.tool_calls.iter().any(|call| call.degraded);
        self.violations = notes;
        self
    }

    /// Seal as failed with a terminal reason.
    pub fn fail(mut self, reason: FailureReason) -> Self {
        self.status = StageStatus::Failed;
        self.violations = reason.violations.clone();
        self.failure = Some(reason);
        self
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// One end-to-end proposal generation. Owned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub input: ProposalInput,
    /// Stage results in execution order.
    pub stages: Vec<StageResult>,
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub failure: Option<FailureReason>,
    /// The run this one continued from, if resumed.
    #[serde(default)]
    pub resumed_from: Option<RunId>,
    pub schema_version: u32,
}

impl Run {
    pub fn new(input: ProposalInput) -> Self {
        Self {
            id: RunId::new(),
            status: RunStatus::Pending,
            created_at: Utc::now(),
            finished_at: None,
            input,
            stages: Vec::new(),
            document: None,
            failure: None,
            resumed_from: None,
            schema_version: SNAPSHOT_SCHEMA_VERSION,
        }
    }

    fn advance(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(ProposalError::validation(format!(
                "run {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// pending → running.
    pub fn start(&mut self) -> Result<()> {
        self.advance(RunStatus::Running)
    }

    /// Append a sealed stage result. Stages must arrive in order.
    pub fn record_stage(&mut self, result: StageResult) -> Result<()> {
        if self.status != RunStatus::Running {
            return Err(ProposalError::validation(format!(
                "run {} is {}, cannot record {}",
                self.id,
                self.status.as_str(),
                result.stage
            )));
        }
        if result.status == StageStatus::Pending {
            return Err(ProposalError::validation(format!(
                "stage {} is still pending",
                result.stage
            )));
        }
        if result.stage.index() != self.stages.len() {
            return Err(ProposalError::validation(format!(
                "stage {} recorded out of order (have {} stages)",
                result.stage,
                self.stages.len()
            )));
        }
        if self.stages.last().is_some_and(|prev| !prev.is_success()) {
            return Err(ProposalError::validation(
                "cannot record a stage after a failed one",
            ));
        }
        self.stages.push(result);
        Ok(())
    }

    /// running → completed. Requires four successful stages.
    pub fn complete(&mut self, document: Document) -> Result<()> {
        let successes = self.stages.iter().filter(|s| s.is_success()).count();
        if successes != StageName::ALL.len() {
            return Err(ProposalError::validation(format!(
                "run {} has {successes} successful stages, cannot complete",
                self.id
            )));
        }
        self.advance(RunStatus::Completed)?;
        self.document = Some(document);
        Ok(())
    }

    /// {pending, running} → failed.
    pub fn fail(&mut self, reason: FailureReason) -> Result<()> {
        self.advance(RunStatus::Failed)?;
        self.failure = Some(reason);
        Ok(())
    }

    /// Result for a stage, if it has run.
    pub fn stage(&self, stage: StageName) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn is_degraded(&self) -> bool {
        self.stages.iter().any(|s| s.degraded)
    }
}
