//! Text-generation client abstraction.
//!
//! Stages talk to a language model only through [`ModelClient`]. The one
//! production implementation is [`OpenRouterClient`]; tests substitute
//! scripted fakes.

mod openrouter;

use std::time::Duration;

use async_trait::async_trait;
use proposalgen_shared::{FailureKind, PipelineConfig};

pub use openrouter::OpenRouterClient;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The closed set of ways a generation call can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("model unavailable: {0}")]
    Unavailable(String),
}

impl ModelError {
    /// Rate limits, timeouts and malformed answers are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }

    /// Failure kind recorded on the stage when this error is terminal.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::RateLimited(_) => FailureKind::ModelRateLimited,
            Self::Timeout(_) => FailureKind::ModelTimeout,
            Self::InvalidResponse(_) => FailureKind::InvalidResponse,
            Self::Unavailable(_) => FailureKind::ModelUnavailable,
        }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// A two-part chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Per-call generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on the whole HTTP exchange.
    pub timeout: Duration,
}

impl From<&PipelineConfig> for GenerationConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.model_timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// ModelClient
// ---------------------------------------------------------------------------

/// One text-generation call.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(
        &self,
        prompt: &Prompt,
        config: &GenerationConfig,
    ) -> Result<String, ModelError>;
}
