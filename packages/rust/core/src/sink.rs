//! Where run and stage snapshots go.

use async_trait::async_trait;
use proposalgen_shared::{Result, Run, RunId, StageResult};
use proposalgen_storage::Storage;

/// Receives a snapshot at every run transition and after every stage.
///
/// Writes are best-effort from the orchestrator's point of view: a failing
/// sink is logged and the run carries on.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn record_run(&self, run: &Run) -> Result<()>;

    async fn record_stage(&self, run_id: &RunId, result: &StageResult) -> Result<()>;
}

/// Drops every snapshot.
pub struct NullSink;

#[async_trait]
impl PersistenceSink for NullSink {
    async fn record_run(&self, _run: &Run) -> Result<()> {
        Ok(())
    }

    async fn record_stage(&self, _run_id: &RunId, _result: &StageResult) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for Storage {
    async fn record_run(&self, run: &Run) -> Result<()> {
        self.insert_run_snapshot(run).await
    }

    async fn record_stage(&self, run_id: &RunId, result: &StageResult) -> Result<()> {
        self.insert_stage_snapshot(run_id, result).await
    }
}
