//! libSQL storage for run history (offline mode).
//!
//! The [`Storage`] struct wraps a local libSQL database holding append-only
//! snapshots of every Run status transition and every sealed StageResult.
//! Rows are only ever inserted; the latest snapshot of a run is its state.
//!
//! **Access rules:**
//! - `generate` / `resume`: read-write via [`Storage::open`]
//! - `runs`, `status`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use proposalgen_shared::{ProposalError, Result, Run, RunId, RunStatus, StageResult};
use tracing::{debug, instrument};

/// One line of run history: the latest snapshot of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub id: String,
    pub status: RunStatus,
    pub company: String,
    pub industry: String,
    pub resumed_from: Option<String>,
    pub created_at: String,
    /// When the latest snapshot was written.
    pub updated_at: String,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> ProposalError {
    ProposalError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProposalError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` for reads only.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ProposalError::Storage(format!(
                "no run database at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ProposalError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ProposalError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Writes (insert-only)
    // -----------------------------------------------------------------------

    /// Append a snapshot of the run in its current state.
    #[instrument(skip_all, fields(run_id = %run.id, status = run.status.as_str()))]
    pub async fn insert_run_snapshot(&self, run: &Run) -> Result<()> {
        self.check_writable()?;
        let json = serde_json::to_string(run)?;
        let now = Utc::now().to_rfc3339();
        let id = run.id.to_string();
        let created_at = run.created_at.to_rfc3339();
        let resumed_from = run.resumed_from.as_ref().map(|r| r.to_string());

        self.conn
            .execute(
                "INSERT INTO run_snapshots
                    (run_id, status, company, industry, resumed_from, created_at, recorded_at, run_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.as_str(),
                    run.status.as_str(),
                    run.input.company.as_str(),
                    run.input.industry.as_str(),
                    resumed_from.as_deref(),
                    created_at.as_str(),
                    now.as_str(),
                    json.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        debug!("run snapshot stored");
        Ok(())
    }

    /// Append a sealed stage result for a run.
    #[instrument(skip_all, fields(run_id = %run_id, stage = %result.stage))]
    pub async fn insert_stage_snapshot(&self, run_id: &RunId, result: &StageResult) -> Result<()> {
        self.check_writable()?;
        let json = serde_json::to_string(result)?;
        let now = Utc::now().to_rfc3339();
        let id = run_id.to_string();

        self.conn
            .execute(
                "INSERT INTO stage_snapshots
                    (run_id, stage, status, attempts, degraded, recorded_at, result_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.as_str(),
                    result.stage.as_str(),
                    result.status.as_str(),
                    i64::from(result.attempts),
                    i64::from(result.degraded),
                    now.as_str(),
                    json.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        debug!("stage snapshot stored");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The most recent snapshot of a run, if any was stored.
    pub async fn latest_run(&self, run_id: &RunId) -> Result<Option<Run>> {
        let id = run_id.to_string();
        let mut rows = self
            .conn
            .query(
                "SELECT run_json FROM run_snapshots WHERE run_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![id.as_str()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => {
                let json = row.get::<String>(0).map_err(storage_err)?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    /// The most recently created run, if any.
    pub async fn most_recent_run(&self) -> Result<Option<Run>> {
        let mut rows = self
            .conn
            .query(
                "SELECT run_id FROM run_snapshots ORDER BY created_at DESC, seq DESC LIMIT 1",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let Some(row) = rows.next().await.map_err(storage_err)? else {
            return Ok(None);
        };
        let id: RunId = row
            .get::<String>(0)
            .map_err(storage_err)?
            .parse()
            .map_err(storage_err)?;
        self.latest_run(&id).await
    }

    /// Latest state of the newest `limit` runs, newest first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT r.run_id, r.status, r.company, r.industry, r.resumed_from,
                        r.created_at, r.recorded_at
                 FROM run_snapshots r
                 WHERE r.seq = (SELECT MAX(seq) FROM run_snapshots WHERE run_id = r.run_id)
                 ORDER BY r.created_at DESC
                 LIMIT ?1",
                params![i64::from(limit)],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let status = row.get::<String>(1).map_err(storage_err)?;
            results.push(RunSummary {
                id: row.get::<String>(0).map_err(storage_err)?,
                status: status.parse().map_err(storage_err)?,
                company: row.get::<String>(2).map_err(storage_err)?,
                industry: row.get::<String>(3).map_err(storage_err)?,
                resumed_from: match row.get_value(4).map_err(storage_err)? {
                    libsql::Value::Text(text) => Some(text),
                    _ => None,
                },
                created_at: row.get::<String>(5).map_err(storage_err)?,
                updated_at: row.get::<String>(6).map_err(storage_err)?,
            });
        }
        Ok(results)
    }

    /// Every stage snapshot of a run, in write order.
    pub async fn stage_snapshots(&self, run_id: &RunId) -> Result<Vec<StageResult>> {
        let id = run_id.to_string();
        let mut rows = self
            .conn
            .query(
                "SELECT result_json FROM stage_snapshots WHERE run_id = ?1 ORDER BY seq",
                params![id.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let json = row.get::<String>(0).map_err(storage_err)?;
            results.push(serde_json::from_str(&json)?);
        }
        Ok(results)
    }

    /// Number of runs on record.
    pub async fn count_runs(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(DISTINCT run_id) FROM run_snapshots", params![])
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)?.max(0) as u64),
            None => Ok(0),
        }
    }
}
