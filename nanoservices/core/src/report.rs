use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use phaseflow_utils::error::Error;
use crate::phase::Phase;

/// Why a run stopped early.
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("{phase} task '{task}' (#{position}) failed: {source}")]
    Task {
        phase: Phase,
        task: String,
        position: usize,
        #[source]
        source: Error,
    },

    #[error("combining {count} extract results failed: {source}")]
    Combine {
        count: usize,
        #[source]
        source: Error,
    },
}

impl PhaseError {
    pub fn phase(&self) -> Phase {
        match self {
            PhaseError::Task { phase, .. } => *phase,
            PhaseError::Combine { .. } => Phase::Extract,
        }
    }

    /// Name of the failing task, if a task (not the combiner) failed.
    pub fn task(&self) -> Option<&str> {
        match self {
            PhaseError::Task { task, .. } => Some(task),
            PhaseError::Combine { .. } => None,
        }
    }
}

/// One-line description of a task result, stored in the execution record.
pub trait Summary {
    fn summary(&self) -> String;
}

impl Summary for serde_json::Value {
    fn summary(&self) -> String {
        use serde_json::Value;
        match self {
            Value::Null => "null".to_string(),
            Value::Array(items) => format!("array of {} items", items.len()),
            Value::Object(map) => format!("object with {} keys", map.len()),
            Value::String(s) => format!("string of {} chars", s.chars().count()),
            other => other.to_string(),
        }
    }
}

impl<U> Summary for Vec<U> {
    fn summary(&self) -> String {
        format!("{} items", self.len())
    }
}

impl<K, V, S> Summary for HashMap<K, V, S> {
    fn summary(&self) -> String {
        format!("{} entries", self.len())
    }
}

impl<K, V> Summary for BTreeMap<K, V> {
    fn summary(&self) -> String {
        format!("{} entries", self.len())
    }
}

impl Summary for String {
    fn summary(&self) -> String {
        format!("string of {} chars", self.chars().count())
    }
}

impl Summary for () {
    fn summary(&self) -> String {
        "()".to_string()
    }
}

macro_rules! display_summary {
    ($($t:ty),*) => {
        $(impl Summary for $t {
            fn summary(&self) -> String { self.to_string() }
        })*
    };
}

display_summary!(bool, i32, i64, u32, u64, usize, f64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Succeeded { summary: String },
    Failed { error: String },
}

/// The outcome of one task invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub task: String,
    pub phase: Phase,
    pub position: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: RecordOutcome,
}

impl ExecutionRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RecordOutcome::Succeeded { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            RecordOutcome::Failed { error } => Some(error),
            RecordOutcome::Succeeded { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum RunOutcome<T> {
    Completed { context: Option<T> },
    Failed { error: PhaseError },
}

/// Everything one run did. Built fresh per run and read-only once returned.
#[derive(Debug)]
pub struct ExecutionReport<T> {
    run_id: Uuid,
    pipeline: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    records: Vec<ExecutionRecord>,
    outcome: RunOutcome<T>,
}

impl<T> ExecutionReport<T> {
    pub(crate) fn new(
        run_id: Uuid,
        pipeline: String,
        started_at: DateTime<Utc>,
        records: Vec<ExecutionRecord>,
        outcome: RunOutcome<T>,
    ) -> Self {
        Self {
            run_id,
            pipeline,
            started_at,
            finished_at: Utc::now(),
            records,
            outcome,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Records in invocation order.
    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn records_for(&self, phase: Phase) -> impl Iterator<Item = &ExecutionRecord> {
        self.records.iter().filter(move |r| r.phase == phase)
    }

    pub fn last_record(&self) -> Option<&ExecutionRecord> {
        self.records.last()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    pub fn status(&self) -> &'static str {
        if self.is_success() { "completed" } else { "failed" }
    }

    pub fn outcome(&self) -> &RunOutcome<T> {
        &self.outcome
    }

    /// The final context of a completed run.
    pub fn final_context(&self) -> Option<&T> {
        match &self.outcome {
            RunOutcome::Completed { context } => context.as_ref(),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&PhaseError> {
        match &self.outcome {
            RunOutcome::Failed { error } => Some(error),
            RunOutcome::Completed { .. } => None,
        }
    }

    pub fn into_result(self) -> Result<Option<T>, PhaseError> {
        match self.outcome {
            RunOutcome::Completed { context } => Ok(context),
            RunOutcome::Failed { error } => Err(error),
        }
    }
}

impl<T> fmt::Display for ExecutionReport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline '{}' {} (run {})", self.pipeline, self.status(), self.run_id)?;
        for record in &self.records {
            let detail = match &record.outcome {
                RecordOutcome::Succeeded { summary } => format!("ok     {summary}"),
                RecordOutcome::Failed { error } => format!("FAILED {error}"),
            };
            writeln!(
                f,
                "  {:<9} #{} {:<24} {:>6}ms  {}",
                record.phase, record.position, record.task, record.duration_ms, detail
            )?;
        }
        write!(f, "  Duration: {}ms", self.duration_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(task: &str, phase: Phase, outcome: RecordOutcome) -> ExecutionRecord {
        ExecutionRecord {
            task: task.to_string(),
            phase,
            position: 0,
            started_at: Utc::now(),
            duration_ms: 1,
            outcome,
        }
    }

    #[test]
    fn value_summaries() {
        assert_eq!(json!([1, 2, 3]).summary(), "array of 3 items");
        assert_eq!(json!({"n": 1}).summary(), "object with 1 keys");
        assert_eq!(json!(7).summary(), "7");
        assert_eq!(vec![1, 2].summary(), "2 items");
    }

    #[test]
    fn completed_report_exposes_context() {
        let report = ExecutionReport::new(
            Uuid::new_v4(),
            "p".to_string(),
            Utc::now(),
            vec![record("fetch", Phase::Extract, RecordOutcome::Succeeded { summary: "1".into() })],
            RunOutcome::Completed { context: Some(1) },
        );
        assert!(report.is_success());
        assert_eq!(report.status(), "completed");
        assert_eq!(report.final_context(), Some(&1));
        assert!(report.error().is_none());
        assert_eq!(report.into_result().unwrap(), Some(1));
    }

    #[test]
    fn failed_report_exposes_error() {
        let report: ExecutionReport<i64> = ExecutionReport::new(
            Uuid::new_v4(),
            "p".to_string(),
            Utc::now(),
            vec![record("clean", Phase::Transform, RecordOutcome::Failed { error: "boom".into() })],
            RunOutcome::Failed {
                error: PhaseError::Task {
                    phase: Phase::Transform,
                    task: "clean".to_string(),
                    position: 0,
                    source: Error::task("boom"),
                },
            },
        );
        assert!(!report.is_success());
        assert_eq!(report.last_record().unwrap().error(), Some("boom"));
        let err = report.error().unwrap();
        assert_eq!(err.phase(), Phase::Transform);
        assert_eq!(err.task(), Some("clean"));
        assert!(report.to_string().contains("FAILED boom"));
    }
}
