//! SQL migration definitions for the run database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: run_snapshots, stage_snapshots",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per Run status transition; never updated
CREATE TABLE IF NOT EXISTS run_snapshots (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id       TEXT NOT NULL,
    status       TEXT NOT NULL,
    company      TEXT NOT NULL,
    industry     TEXT NOT NULL,
    resumed_from TEXT,
    created_at   TEXT NOT NULL,
    recorded_at  TEXT NOT NULL,
    run_json     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_run_snapshots_run_id ON run_snapshots(run_id);

-- One row per sealed StageResult; never updated
CREATE TABLE IF NOT EXISTS stage_snapshots (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id      TEXT NOT NULL,
    stage       TEXT NOT NULL,
    status      TEXT NOT NULL,
    attempts    INTEGER NOT NULL,
    degraded    INTEGER NOT NULL,
    recorded_at TEXT NOT NULL,
    result_json TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stage_snapshots_run_id ON stage_snapshots(run_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
