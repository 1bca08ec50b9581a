//! Application configuration for Proposalgen.
//!
//! User config lives at `~/.proposalgen/proposalgen.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProposalError, Result};
use crate::types::TrustTier;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "proposalgen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".proposalgen";

/// Default run database file name inside the config directory.
const DB_FILE_NAME: &str = "runs.db";

// ---------------------------------------------------------------------------
// Config structs (matching proposalgen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// External retrieval tools.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Retry and backoff policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Validator thresholds.
    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    /// Citation trust settings.
    #[serde(default)]
    pub trust: TrustConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory where reports are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Wall-clock budget for a whole run, in seconds.
    #[serde(default = "default_run_deadline")]
    pub run_deadline_secs: u64,

    /// Run database path. Empty means `~/.proposalgen/runs.db`.
    #[serde(default)]
    pub db_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            run_deadline_secs: default_run_deadline(),
            db_path: String::new(),
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}
fn default_run_deadline() -> u64 {
    900
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for every stage.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_openrouter_base")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-call timeout for model requests, in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_openrouter_base(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_model_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_openrouter_base() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_model_timeout() -> u64 {
    300
}

/// `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Per-call timeout for tool requests, in seconds.
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent tool calls within one stage.
    #[serde(default = "default_tool_concurrency")]
    pub max_concurrency: usize,

    /// Results requested per tool query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default)]
    pub search: SearchToolConfig,

    #[serde(default)]
    pub dataset: DatasetToolConfig,

    #[serde(default)]
    pub repo: RepoToolConfig,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout(),
            max_concurrency: default_tool_concurrency(),
            max_results: default_max_results(),
            search: SearchToolConfig::default(),
            dataset: DatasetToolConfig::default(),
            repo: RepoToolConfig::default(),
        }
    }
}

fn default_tool_timeout() -> u64 {
    30
}
fn default_tool_concurrency() -> usize {
    4
}
fn default_max_results() -> usize {
    5
}

/// `[tools.search]` section (Serper web search).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchToolConfig {
    #[serde(default = "default_serper_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_serper_base")]
    pub base_url: String,
}

impl Default for SearchToolConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_serper_key_env(),
            base_url: default_serper_base(),
        }
    }
}

fn default_serper_key_env() -> String {
    "SERPER_API_KEY".into()
}
fn default_serper_base() -> String {
    "https://google.serper.dev".into()
}

/// `[tools.dataset]` section (Kaggle dataset search).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetToolConfig {
    #[serde(default = "default_kaggle_user_env")]
    pub username_env: String,

    #[serde(default = "default_kaggle_key_env")]
    pub key_env: String,

    #[serde(default = "default_kaggle_base")]
    pub base_url: String,
}

impl Default for DatasetToolConfig {
    fn default() -> Self {
        Self {
            username_env: default_kaggle_user_env(),
            key_env: default_kaggle_key_env(),
            base_url: default_kaggle_base(),
        }
    }
}

fn default_kaggle_user_env() -> String {
    "KAGGLE_USERNAME".into()
}
fn default_kaggle_key_env() -> String {
    "KAGGLE_KEY".into()
}
fn default_kaggle_base() -> String {
    "https://www.kaggle.com/api/v1".into()
}

/// `[tools.repo]` section (GitHub repository search).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoToolConfig {
    /// Optional; unauthenticated requests work with a lower quota.
    #[serde(default = "default_github_token_env")]
    pub token_env: String,

    #[serde(default = "default_github_base")]
    pub base_url: String,
}

impl Default for RepoToolConfig {
    fn default() -> Self {
        Self {
            token_env: default_github_token_env(),
            base_url: default_github_base(),
        }
    }
}

fn default_github_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_github_base() -> String {
    "https://api.github.com".into()
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per stage, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Tries per individual tool call before it is recorded as degraded.
    #[serde(default = "default_tool_attempts")]
    pub tool_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay(),
            tool_attempts: default_tool_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_delay() -> u64 {
    30_000
}
fn default_tool_attempts() -> u32 {
    3
}

/// `[thresholds]` section. Validator limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    /// Distinct authoritative citations required from Research.
    #[serde(default = "default_min_citations")]
    pub min_citations: usize,

    /// Weakest tier still counted as authoritative.
    #[serde(default = "default_min_tier")]
    pub min_citation_tier: TrustTier,

    #[serde(default = "default_use_case_min")]
    pub use_case_min: usize,

    #[serde(default = "default_use_case_max")]
    pub use_case_max: usize,

    #[serde(default = "default_min_per_category")]
    pub min_per_category: usize,

    /// Share of use cases that must resolve at least one resource link.
    #[serde(default = "default_min_coverage")]
    pub min_resource_coverage: f64,

    /// Upper bound on tool calls per stage attempt.
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: usize,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            min_citations: default_min_citations(),
            min_citation_tier: default_min_tier(),
            use_case_min: default_use_case_min(),
            use_case_max: default_use_case_max(),
            min_per_category: default_min_per_category(),
            min_resource_coverage: default_min_coverage(),
            max_tool_calls: default_max_tool_calls(),
        }
    }
}

fn default_min_citations() -> usize {
    5
}
fn default_min_tier() -> TrustTier {
    TrustTier::Primary
}
fn default_use_case_min() -> usize {
    15
}
fn default_use_case_max() -> usize {
    20
}
fn default_min_per_category() -> usize {
    1
}
fn default_min_coverage() -> f64 {
    0.5
}
fn default_max_tool_calls() -> usize {
    40
}

/// `[trust]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Hosts whose citations rank as primary sources.
    #[serde(default = "default_authoritative_domains")]
    pub authoritative_domains: Vec<String>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            authoritative_domains: default_authoritative_domains(),
        }
    }
}

fn default_authoritative_domains() -> Vec<String> {
    [
        "mckinsey.com",
        "bcg.com",
        "bain.com",
        "deloitte.com",
        "pwc.com",
        "ey.com",
        "kpmg.com",
        "accenture.com",
        "gartner.com",
        "forrester.com",
        "idc.com",
        "statista.com",
        "hbr.org",
        "weforum.org",
        "oecd.org",
        "worldbank.org",
        "imf.org",
        "nature.com",
        "arxiv.org",
        "ieee.org",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Exponential backoff policy for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first. Never less than 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait before attempt `next_attempt` (2 is the first retry).
    pub fn backoff(&self, next_attempt: u32) -> Duration {
        let exponent = next_attempt.saturating_sub(2) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Immutable runtime configuration handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model identifier sent with every generation request.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-call timeout for the model client.
    pub model_timeout: Duration,
    /// Per-call timeout for tool adapters.
    pub tool_timeout: Duration,
    /// Maximum concurrent tool calls within one stage.
    pub tool_concurrency: usize,
    /// Results requested per tool query.
    pub max_results: usize,
    /// Stage-level retry policy.
    pub retry: RetryPolicy,
    /// Tries per tool call.
    pub tool_attempts: u32,
    pub thresholds: ThresholdsConfig,
    pub authoritative_domains: Vec<String>,
    /// Wall-clock budget for the whole run.
    pub run_deadline: Duration,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.openrouter.default_model.clone(),
            temperature: config.openrouter.temperature,
            max_tokens: config.openrouter.max_tokens,
            model_timeout: Duration::from_secs(config.openrouter.timeout_secs),
            tool_timeout: Duration::from_secs(config.tools.timeout_secs),
            tool_concurrency: config.tools.max_concurrency.max(1),
            max_results: config.tools.max_results.max(1),
            retry: RetryPolicy::from(&config.retry),
            tool_attempts: config.retry.tool_attempts.max(1),
            thresholds: config.thresholds.clone(),
            authoritative_domains: config.trust.authoritative_domains.clone(),
            run_deadline: Duration::from_secs(config.defaults.run_deadline_secs),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.proposalgen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ProposalError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.proposalgen/proposalgen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the run database path from config, falling back to the config dir.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    if config.defaults.db_path.is_empty() {
        Ok(config_dir()?.join(DB_FILE_NAME))
    } else {
        Ok(PathBuf::from(&config.defaults.db_path))
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ProposalError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ProposalError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProposalError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProposalError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProposalError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject threshold combinations the validator cannot satisfy.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let t = &config.thresholds;
    if t.use_case_min > t.use_case_max {
        return Err(ProposalError::config(format!(
            "thresholds.use_case_min ({}) exceeds use_case_max ({})",
            t.use_case_min, t.use_case_max
        )));
    }
    if !(0.0..=1.0).contains(&t.min_resource_coverage) {
        return Err(ProposalError::config(
            "thresholds.min_resource_coverage must be between 0.0 and 1.0",
        ));
    }
    if config.retry.multiplier < 1.0 {
        return Err(ProposalError::config("retry.multiplier must be at least 1.0"));
    }
    Ok(())
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_credentials(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    if env_is_set(var_name) {
        Ok(())
    } else {
        Err(ProposalError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        )))
    }
}

/// Presence of every credential env var the tools and model use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub configured: Vec<String>,
    pub missing: Vec<String>,
}

/// Report which credential env vars are set, without reading their values out.
pub fn credential_status(config: &AppConfig) -> CredentialStatus {
    let names = [
        &config.openrouter.api_key_env,
        &config.tools.search.api_key_env,
        &config.tools.dataset.username_env,
        &config.tools.dataset.key_env,
        &config.tools.repo.token_env,
    ];
    let (configured, missing) = names
        .into_iter()
        .cloned()
        .partition(|name| env_is_set(name));
    CredentialStatus {
        configured,
        missing,
    }
}

fn env_is_set(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.is_empty())
}
