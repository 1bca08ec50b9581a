//! External information-retrieval tools.
//!
//! Each capability (web search, dataset lookup, repository lookup) sits
//! behind the same [`ToolAdapter`] interface with a closed error set, so the
//! stage runner never sees vendor-specific error shapes.

mod dataset;
mod http;
mod repo;
mod search;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proposalgen_shared::{ResultItem, ToolKind, ToolsConfig};
use tracing::{info, warn};

pub use dataset::KaggleDatasets;
pub use repo::GithubRepos;
pub use search::SerperSearch;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The closed set of ways a tool query can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// Nothing matched. Callers treat this as an empty answer.
    #[error("no results")]
    NoResults,

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("unreachable: {0}")]
    Unreachable(String),
}

impl ToolError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NoResults)
    }
}

// ---------------------------------------------------------------------------
// Query and adapter
// ---------------------------------------------------------------------------

/// One query against a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolQuery {
    pub text: String,
    pub max_results: usize,
    /// Upper bound on the HTTP exchange.
    pub timeout: Duration,
}

impl ToolQuery {
    pub fn new(text: impl Into<String>, max_results: usize, timeout: Duration) -> Self {
        Self {
            text: text.into(),
            max_results,
            timeout,
        }
    }
}

/// One external retrieval capability.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn kind(&self) -> ToolKind;

    /// Run a query; items come back in the tool's rank order.
    async fn query(&self, query: &ToolQuery) -> Result<Vec<ResultItem>, ToolError>;
}

// ---------------------------------------------------------------------------
// ToolSet
// ---------------------------------------------------------------------------

/// The adapters available to a pipeline, keyed by capability.
#[derive(Clone, Default)]
pub struct ToolSet {
    adapters: HashMap<ToolKind, Arc<dyn ToolAdapter>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one of the same kind.
    pub fn with(mut self, adapter: Arc<dyn ToolAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn ToolAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ToolKind) -> bool {
        self.adapters.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Build every adapter whose credentials are present in the environment.
    ///
    /// Missing credentials leave the adapter out; stages that need it then
    /// run degraded.
    pub fn from_config(config: &ToolsConfig) -> proposalgen_shared::Result<Self> {
        let mut set = Self::new();

        match env_value(&config.search.api_key_env) {
            Some(key) => {
                set = set.with(Arc::new(SerperSearch::new(&config.search.base_url, key)?));
            }
            None => warn!(env = %config.search.api_key_env, "search tool disabled: key not set"),
        }

        match (
            env_value(&config.dataset.username_env),
            env_value(&config.dataset.key_env),
        ) {
            (Some(user), Some(key)) => {
                set = set.with(Arc::new(KaggleDatasets::new(
                    &config.dataset.base_url,
                    user,
                    key,
                )?));
            }
            _ => warn!("dataset tool disabled: Kaggle credentials not set"),
        }

        let token = env_value(&config.repo.token_env);
        if token.is_none() {
            info!("repo tool running unauthenticated");
        }
        set = set.with(Arc::new(GithubRepos::new(&config.repo.base_url, token)?));

        Ok(set)
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.adapters.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("ToolSet").field("adapters", &kinds).finish()
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
