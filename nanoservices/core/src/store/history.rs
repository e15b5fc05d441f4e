use rusqlite::{params, Connection};
use std::path::Path;

use crate::report::{ExecutionReport, RecordOutcome};

/// SQLite-backed store for run history.
pub struct RunHistory {
    conn: Connection,
}

impl RunHistory {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        let history = Self { conn };
        history.migrate()?;
        Ok(history)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let history = Self { conn };
        history.migrate()?;
        Ok(history)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pipeline_runs (
                id TEXT PRIMARY KEY,
                pipeline TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                error TEXT
            );
            CREATE TABLE IF NOT EXISTS task_runs (
                run_id TEXT NOT NULL REFERENCES pipeline_runs(id),
                seq INTEGER NOT NULL,
                phase TEXT NOT NULL,
                position INTEGER NOT NULL,
                task_name TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                detail TEXT NOT NULL,
                PRIMARY KEY (run_id, seq)
            );
            CREATE INDEX IF NOT EXISTS idx_pipeline_runs_pipeline ON pipeline_runs(pipeline);
            CREATE INDEX IF NOT EXISTS idx_pipeline_runs_status ON pipeline_runs(status);"
        )?;
        Ok(())
    }

    /// Persist a finished run and all of its records.
    pub fn record<T>(&mut self, report: &ExecutionReport<T>) -> Result<(), rusqlite::Error> {
        let tx = self.conn.transaction()?;
        let run_id = report.run_id().to_string();
        tx.execute(
            "INSERT INTO pipeline_runs (id, pipeline, status, started_at, finished_at, duration_ms, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                report.pipeline(),
                report.status(),
                report.started_at().to_rfc3339(),
                report.finished_at().to_rfc3339(),
                report.duration_ms(),
                report.error().map(|e| e.to_string()),
            ],
        )?;

        for (seq, record) in report.records().iter().enumerate() {
            let (status, detail) = match &record.outcome {
                RecordOutcome::Succeeded { summary } => ("completed", summary.as_str()),
                RecordOutcome::Failed { error } => ("failed", error.as_str()),
            };
            tx.execute(
                "INSERT INTO task_runs (run_id, seq, phase, position, task_name, status, started_at, duration_ms, detail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    run_id,
                    seq as i64,
                    record.phase.as_str(),
                    record.position as i64,
                    record.task,
                    status,
                    record.started_at.to_rfc3339(),
                    record.duration_ms as i64,
                    detail,
                ],
            )?;
        }
        tx.commit()
    }

    /// Get recent pipeline runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRunRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, pipeline, status, started_at, finished_at, duration_ms, error
             FROM pipeline_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1"
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(PipelineRunRow {
                id: row.get(0)?,
                pipeline: row.get(1)?,
                status: row.get(2)?,
                started_at: row.get(3)?,
                finished_at: row.get(4)?,
                duration_ms: row.get(5)?,
                error: row.get(6)?,
            })
        })?;
        rows.collect()
    }

    /// Get task records for a specific run, in invocation order.
    pub fn records_for(&self, run_id: &str) -> Result<Vec<TaskRunRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, seq, phase, position, task_name, status, started_at, duration_ms, detail
             FROM task_runs WHERE run_id = ?1 ORDER BY seq"
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok(TaskRunRow {
                run_id: row.get(0)?,
                seq: row.get(1)?,
                phase: row.get(2)?,
                position: row.get(3)?,
                task_name: row.get(4)?,
                status: row.get(5)?,
                started_at: row.get(6)?,
                duration_ms: row.get(7)?,
                detail: row.get(8)?,
            })
        })?;
        rows.collect()
    }
}

#[derive(Debug)]
pub struct PipelineRunRow {
    pub id: String,
    pub pipeline: String,
    pub status: String,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: i64,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct TaskRunRow {
    pub run_id: String,
    pub seq: i64,
    pub phase: String,
    pub position: i64,
    pub task_name: String,
    pub status: String,
    pub started_at: String,
    pub duration_ms: i64,
    pub detail: String,
}
