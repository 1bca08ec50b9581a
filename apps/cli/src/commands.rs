//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use proposalgen_core::{Orchestrator, ProgressReporter, ReportFiles, write_report};
use proposalgen_model::{ModelClient, OpenRouterClient};
use proposalgen_shared::{
    AppConfig, PipelineConfig, ProposalInput, Run, RunId, RunStatus, SUPPORTED_INDUSTRIES,
    StageName, StageResult, config_file_path, credential_status, database_path, init_config,
    load_config, validate_config, validate_credentials,
};
use proposalgen_storage::Storage;
use proposalgen_tools::ToolSet;
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Proposalgen: AI adoption proposals, researched and validated.
#[derive(Parser)]
#[command(
    name = "proposalgen",
    version,
    about = "Generate researched AI adoption proposals for a company and industry.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Overrides shared by `generate` and `resume`.
#[derive(clap::Args, Debug, Default, Clone)]
pub(crate) struct RunOverrides {
    /// Model id (overrides `openrouter.default_model`).
    #[arg(long)]
    pub model: Option<String>,

    /// Report directory (overrides `defaults.output_dir`).
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Run deadline in seconds (overrides `defaults.run_deadline_secs`).
    #[arg(long)]
    pub deadline_secs: Option<u64>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Generate a proposal for a company.
    Generate {
        /// Company name.
        #[arg(short, long)]
        company: String,

        /// Industry (see `proposalgen industries`).
        #[arg(short, long)]
        industry: String,

        #[command(flatten)]
        overrides: RunOverrides,
    },

    /// Continue a failed run from its first unfinished stage.
    Resume {
        /// Id of the run to continue.
        run_id: String,

        #[command(flatten)]
        overrides: RunOverrides,
    },

    /// Inspect run history.
    Runs {
        #[command(subcommand)]
        action: RunsAction,
    },

    /// Show configuration, credentials and run history health.
    Status,

    /// List supported industries.
    Industries,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Run history subcommands.
#[derive(Subcommand)]
pub(crate) enum RunsAction {
    /// List recent runs, newest first.
    List {
        /// Maximum number of runs to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
    /// Show one run in detail.
    Show {
        /// Run id.
        run_id: String,

        /// Print the full run as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "proposalgen=info",
        1 => "proposalgen=debug",
        _ => "proposalgen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            company,
            industry,
            overrides,
        } => cmd_generate(&company, &industry, &overrides).await,
        Command::Resume { run_id, overrides } => cmd_resume(&run_id, &overrides).await,
        Command::Runs { action } => match action {
            RunsAction::List { limit } => cmd_runs_list(limit).await,
            RunsAction::Show { run_id, json } => cmd_runs_show(&run_id, json).await,
        },
        Command::Status => cmd_status().await,
        Command::Industries => cmd_industries(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Fold CLI flags into the loaded config. Flags win.
fn apply_overrides(config: &mut AppConfig, overrides: &RunOverrides) {
    if let Some(model) = &overrides.model {
        config.openrouter.default_model = model.clone();
    }
    if let Some(out) = &overrides.out {
        config.defaults.output_dir = out.to_string_lossy().into_owned();
    }
    if let Some(secs) = overrides.deadline_secs {
        config.defaults.run_deadline_secs = secs;
    }
}

/// Build an orchestrator wired to OpenRouter, the configured tools and the
/// run database.
async fn build_orchestrator(config: &AppConfig) -> Result<Orchestrator> {
    validate_config(config)?;
    validate_credentials(config)?;

    let pipeline = Arc::new(PipelineConfig::from(config));
    let model: Arc<dyn ModelClient> = Arc::new(OpenRouterClient::from_config(&config.openrouter)?);
    let tools = ToolSet::from_config(&config.tools)?;
    let storage = Arc::new(Storage::open(&database_path(config)?).await?);

    info!(
        model = %pipeline.model,
        tools = ?tools,
        deadline_secs = pipeline.run_deadline.as_secs(),
        "pipeline ready"
    );
    Ok(Orchestrator::new(pipeline, model, tools, storage))
}

async fn cmd_generate(company: &str, industry: &str, overrides: &RunOverrides) -> Result<()> {
    let mut config = load_config()?;
    apply_overrides(&mut config, overrides);

    let input = ProposalInput::new(company, industry)?;
    let orchestrator = build_orchestrator(&config).await?;

    info!(company = %input.company, industry = %input.industry, "generating proposal");

    let reporter = CliProgress::new();
    let run = orchestrator.run(input, &reporter).await?;
    finish(&config, &run)
}

async fn cmd_resume(run_id: &str, overrides: &RunOverrides) -> Result<()> {
    let mut config = load_config()?;
    apply_overrides(&mut config, overrides);

    let id: RunId = run_id
        .parse()
        .map_err(|e| eyre!("invalid run id '{run_id}': {e}"))?;

    let storage = Storage::open(&database_path(&config)?).await?;
    let previous = storage
        .latest_run(&id)
        .await?
        .ok_or_else(|| eyre!("no run with id {id}"))?;
    drop(storage);

    let orchestrator = build_orchestrator(&config).await?;
    info!(previous = %previous.id, status = previous.status.as_str(), "resuming run");

    let reporter = CliProgress::new();
    let run = orchestrator.resume(&previous, &reporter).await?;
    finish(&config, &run)
}

/// Write the report and print a summary. A failed run is an error exit.
fn finish(config: &AppConfig, run: &Run) -> Result<()> {
    let files = write_report(Path::new(&config.defaults.output_dir), run)?;
    print_summary(run, &files);

    match (&run.status, &run.failure) {
        (RunStatus::Failed, Some(reason)) => Err(eyre!("run {} failed: {reason}", run.id)),
        (RunStatus::Failed, None) => Err(eyre!("run {} failed", run.id)),
        _ => Ok(()),
    }
}

fn print_summary(run: &Run, files: &ReportFiles) {
    println!();
    match run.status {
        RunStatus::Completed if run.is_degraded() => {
            println!("  Proposal generated (degraded mode).")
        }
        RunStatus::Completed => println!("  Proposal generated successfully!"),
        _ => println!("  Proposal generation failed."),
    }
    println!("  Run:      {}", run.id);
    println!("  Company:  {} ({})", run.input.company, run.input.industry);
    if let Some(previous) = &run.resumed_from {
        println!("  Resumed:  {previous}");
    }
    for stage in &run.stages {
        println!("  {}", stage_line(stage));
    }
    if let Some(doc) = &run.document {
        println!("  Use cases:  {}", doc.use_cases.len());
        println!("  Citations:  {}", doc.citations.len());
        if !doc.pending_resources.is_empty() {
            println!("  Resources pending: {}", doc.pending_resources.join(", "));
        }
    }
    if let Some(md) = &files.markdown {
        println!("  Report:   {}", md.path.display());
    }
    if let Some(xlsx) = &files.workbook {
        println!("  Workbook: {}", xlsx.path.display());
    }
    println!("  Run JSON: {}", files.json.path.display());
    println!();
}

fn stage_line(stage: &StageResult) -> String {
    let mut line = format!(
        "{:<9} {:<8} attempts={}",
        stage.stage.as_str(),
        stage.status.as_str(),
        stage.attempts
    );
    if stage.degraded {
        line.push_str(" degraded");
    }
    if let Some(reason) = &stage.failure {
        line.push_str(&format!(" ({}: {})", reason.kind, reason.detail));
    }
    line
}

async fn open_history(config: &AppConfig) -> Result<Option<Storage>> {
    let path = database_path(config)?;
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(Storage::open_readonly(&path).await?))
}

async fn cmd_runs_list(limit: u32) -> Result<()> {
    let config = load_config()?;
    let Some(storage) = open_history(&config).await? else {
        println!("No runs recorded yet.");
        return Ok(());
    };

    let runs = storage.list_runs(limit).await?;
    if runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<9}  {:<24}  {:<18}  {}",
        "RUN", "STATUS", "COMPANY", "INDUSTRY", "UPDATED"
    );
    for run in runs {
        println!(
            "{:<36}  {:<9}  {:<24}  {:<18}  {}",
            run.id,
            run.status.as_str(),
            run.company,
            run.industry,
            run.updated_at
        );
    }
    Ok(())
}

async fn cmd_runs_show(run_id: &str, json: bool) -> Result<()> {
    let config = load_config()?;
    let id: RunId = run_id
        .parse()
        .map_err(|e| eyre!("invalid run id '{run_id}': {e}"))?;
    let db_path = database_path(&config)?;
    let storage = open_history(&config)
        .await?
        .ok_or_else(|| eyre!("no run history at {}", db_path.display()))?;
    let run = storage
        .latest_run(&id)
        .await?
        .ok_or_else(|| eyre!("no run with id {id}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(());
    }

    println!("Run:      {}", run.id);
    println!("Status:   {}", run.status.as_str());
    println!("Company:  {} ({})", run.input.company, run.input.industry);
    println!("Created:  {}", run.created_at.to_rfc3339());
    if let Some(finished) = run.finished_at {
        println!("Finished: {}", finished.to_rfc3339());
    }
    if let Some(previous) = &run.resumed_from {
        println!("Resumed from: {previous}");
    }
    println!();
    for name in StageName::ALL {
        match run.stage(name) {
            Some(stage) => {
                println!("  {}", stage_line(stage));
                for violation in &stage.violations {
                    println!("      - [{}] {}", violation.rule, violation.message);
                }
            }
            None => println!("  {:<9} not started", name.as_str()),
        }
    }
    if let Some(reason) = &run.failure {
        println!();
        println!("Failure: {reason}");
    }
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let config_path = config_file_path()?;
    let creds = credential_status(&config);

    println!(
        "Config:      {} ({})",
        config_path.display(),
        if config_path.exists() { "found" } else { "defaults" }
    );
    println!("Model:       {}", config.openrouter.default_model);
    println!("Output dir:  {}", config.defaults.output_dir);
    println!(
        "Credentials: {} set, {} missing",
        creds.configured.len(),
        creds.missing.len()
    );
    for name in &creds.missing {
        println!("  missing: {name}");
    }

    let db_path = database_path(&config)?;
    match open_history(&config).await? {
        Some(storage) => {
            println!(
                "History:     {} ({} runs)",
                db_path.display(),
                storage.count_runs().await?
            );
            if let Some(run) = storage.most_recent_run().await? {
                println!(
                    "Last run:    {} {} for {}",
                    run.id,
                    run.status.as_str(),
                    run.input.company
                );
            }
        }
        None => println!("History:     {} (not created yet)", db_path.display()),
    }
    Ok(())
}

fn cmd_industries() -> Result<()> {
    for industry in SUPPORTED_INDUSTRIES {
        println!("{industry}");
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage: StageName) {
        self.spinner
            .set_message(format!("[{}/4] {stage}", stage.index() + 1));
    }

    fn stage_attempt(&self, stage: StageName, attempt: u32, max_attempts: u32) {
        if attempt > 1 {
            self.spinner.set_message(format!(
                "[{}/4] {stage} (retry {attempt}/{max_attempts})",
                stage.index() + 1
            ));
        }
    }

    fn stage_finished(&self, result: &StageResult) {
        self.spinner.println(format!("  {}", stage_line(result)));
    }

    fn done(&self, _run: &Run) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn generate_parses_overrides() {
        let cli = Cli::try_parse_from([
            "proposalgen",
            "generate",
            "--company",
            "Acme",
            "--industry",
            "retail",
            "--model",
            "openai/gpt-4o",
            "--deadline-secs",
            "60",
        ])
        .unwrap();
        let Command::Generate {
            company,
            industry,
            overrides,
        } = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!(company, "Acme");
        assert_eq!(industry, "retail");

        let mut config = AppConfig::default();
        apply_overrides(&mut config, &overrides);
        assert_eq!(config.openrouter.default_model, "openai/gpt-4o");
        assert_eq!(config.defaults.run_deadline_secs, 60);
        assert_eq!(config.defaults.output_dir, "outputs");
    }

    #[test]
    fn no_overrides_keeps_config() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &RunOverrides::default());
        assert_eq!(config.openrouter.default_model, AppConfig::default().openrouter.default_model);
    }
}
