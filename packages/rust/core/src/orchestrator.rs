//! End-to-end run: Research → UseCase → Resource → Proposal → Document.

use std::sync::Arc;

use proposalgen_model::ModelClient;
use proposalgen_shared::{
    FailureKind, FailureReason, PipelineConfig, ProposalInput, Result, Run, RunStatus, StageName,
    StageResult,
};
use proposalgen_tools::ToolSet;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::assembler::assemble;
use crate::context::SharedContext;
use crate::runner::StageRunner;
use crate::sink::PersistenceSink;
use crate::spec::StageSpec;

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a stage's first attempt.
    fn stage_started(&self, stage: StageName);
    /// Called at the start of every attempt (1-based).
    fn stage_attempt(&self, stage: StageName, attempt: u32, max_attempts: u32);
    /// Called once a stage is sealed.
    fn stage_finished(&self, result: &StageResult);
    /// Called when the run reaches a terminal status.
    fn done(&self, run: &Run);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _stage: StageName) {}
    fn stage_attempt(&self, _stage: StageName, _attempt: u32, _max_attempts: u32) {}
    fn stage_finished(&self, _result: &StageResult) {}
    fn done(&self, _run: &Run) {}
}

/// Drives the four stages of a run in strict order.
pub struct Orchestrator {
    config: Arc<PipelineConfig>,
    runner: StageRunner,
    specs: Vec<StageSpec>,
    sink: Arc<dyn PersistenceSink>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<PipelineConfig>,
        model: Arc<dyn ModelClient>,
        tools: ToolSet,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            specs: StageSpec::pipeline(&config),
            runner: StageRunner::new(Arc::clone(&config), model, tools),
            config,
            sink,
        }
    }

    /// Replace the default stage specs. Specs must stay in stage order.
    pub fn with_specs(mut self, specs: Vec<StageSpec>) -> Self {
        self.specs = specs;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run all four stages for `input`.
    ///
    /// Stage failures end up in the returned run (`status = failed`); an
    /// `Err` means a run invariant was broken.
    #[instrument(skip_all, fields(company = %input.company, industry = %input.industry))]
    pub async fn run(&self, input: ProposalInput, progress: &dyn ProgressReporter) -> Result<Run> {
        let run = Run::new(input.clone());
        info!(run_id = %run.id, "starting run");
        self.drive(run, SharedContext::new(input), Vec::new(), progress)
            .await
    }

    /// Continue `previous` in a new run.
    ///
    /// The previous run's successful stages are carried over as-is and
    /// execution picks up at the first stage that did not succeed. A
    /// completed run is only re-assembled.
    #[instrument(skip_all, fields(previous = %previous.id))]
    pub async fn resume(&self, previous: &Run, progress: &dyn ProgressReporter) -> Result<Run> {
        let mut run = Run::new(previous.input.clone());
        run.resumed_from = Some(previous.id.clone());

        let mut context = SharedContext::new(previous.input.clone());
        let mut seeded = Vec::new();
        for result in previous.stages.iter().take_while(|s| s.is_success()) {
            context.append(result.clone())?;
            seeded.push(result.clone());
        }

        info!(
            run_id = %run.id,
            carried = seeded.len(),
            next = ?context.next_stage(),
            "resuming run"
        );
        self.drive(run, context, seeded, progress).await
    }

    async fn drive(
        &self,
        mut run: Run,
        mut context: SharedContext,
        seeded: Vec<StageResult>,
        progress: &dyn ProgressReporter,
    ) -> Result<Run> {
        let deadline = Instant::now() + self.config.run_deadline;

        self.persist_run(&run).await;
        run.start()?;
        for result in seeded {
            run.record_stage(result)?;
        }
        self.persist_run(&run).await;

        for spec in &self.specs {
            if context.contains(spec.stage) {
                continue;
            }
            if Instant::now() >= deadline {
                warn!(run_id = %run.id, stage = %spec.stage, "run deadline reached");
                let reason = FailureReason::new(
                    spec.stage,
                    FailureKind::Timeout,
                    "run deadline reached before the stage started",
                );
                return self.finish_failed(run, reason, progress).await;
            }

            progress.stage_started(spec.stage);
            info!(run_id = %run.id, stage = %spec.stage, "stage started");

            let snapshot = context.clone();
            let result = self
                .runner
                .execute(spec, &snapshot, deadline, progress)
                .await;

            progress.stage_finished(&result);
            self.persist_stage(&run, &result).await;
            run.record_stage(result.clone())?;

            if !result.is_success() {
                let reason = result.failure.clone().unwrap_or_else(|| {
                    FailureReason::new(spec.stage, FailureKind::ValidationFailed, "stage failed")
                });
                error!(
                    run_id = %run.id,
                    stage = %spec.stage,
                    kind = %reason.kind,
                    attempts = result.attempts,
                    "stage failed"
                );
                return self.finish_failed(run, reason, progress).await;
            }

            info!(
                run_id = %run.id,
                stage = %spec.stage,
                attempts = result.attempts,
                degraded = result.degraded,
                "stage succeeded"
            );
            context.append(result)?;
        }

        let document = match assemble(&context) {
            Ok(document) => document,
            Err(e) => {
                let reason = FailureReason::new(
                    StageName::Proposal,
                    FailureKind::ValidationFailed,
                    e.to_string(),
                );
                return self.finish_failed(run, reason, progress).await;
            }
        };

        run.complete(document)?;
        info!(
            run_id = %run.id,
            degraded = run.is_degraded(),
            "run completed"
        );
        self.persist_run(&run).await;
        progress.done(&run);
        Ok(run)
    }

    async fn finish_failed(
        &self,
        mut run: Run,
        reason: FailureReason,
        progress: &dyn ProgressReporter,
    ) -> Result<Run> {
        run.fail(reason)?;
        debug_assert_eq!(run.status, RunStatus::Failed);
        self.persist_run(&run).await;
        progress.done(&run);
        Ok(run)
    }

    async fn persist_run(&self, run: &Run) {
        if let Err(e) = self.sink.record_run(run).await {
            warn!(run_id = %run.id, status = run.status.as_str(), error = %e, "failed to persist run snapshot");
        }
    }

    async fn persist_stage(&self, run: &Run, result: &StageResult) {
        if let Err(e) = self.sink.record_stage(&run.id, result).await {
            warn!(run_id = %run.id, stage = %result.stage, error = %e, "failed to persist stage snapshot");
        }
    }
}
