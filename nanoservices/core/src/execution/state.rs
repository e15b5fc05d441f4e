use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::phase::Phase;
use crate::report::{ExecutionRecord, ExecutionReport, PhaseError, RecordOutcome, RunOutcome};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NotStarted,
    Running { phase: Phase, index: usize },
    Completed,
    Failed,
}

/// In-memory state for a single run. Owns the context and the record list.
#[derive(Debug)]
pub struct RunState<T> {
    pub id: Uuid,
    pub pipeline: String,
    pub status: RunStatus,
    /// Value handed to the next task; `None` until something produces one.
    pub context: Option<T>,
    pub records: Vec<ExecutionRecord>,
    pub started_at: DateTime<Utc>,
}

impl<T> RunState<T> {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            status: RunStatus::NotStarted,
            context: None,
            records: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Move to the task at `index` within `phase`.
    pub fn begin(&mut self, phase: Phase, index: usize) {
        debug_assert!(!self.is_finished(), "run already finished");
        self.status = RunStatus::Running { phase, index };
    }

    pub fn task_succeeded(
        &mut self,
        task: &str,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        summary: String,
    ) {
        self.push_record(task, started_at, duration_ms, RecordOutcome::Succeeded { summary });
    }

    /// Record a failed task. The run is failed from here on.
    pub fn task_failed(
        &mut self,
        task: &str,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        error: String,
    ) {
        self.push_record(task, started_at, duration_ms, RecordOutcome::Failed { error });
        self.status = RunStatus::Failed;
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Failed)
    }

    /// Close the run successfully and hand back its report.
    pub fn complete(mut self) -> ExecutionReport<T> {
        self.status = RunStatus::Completed;
        let context = self.context.take();
        ExecutionReport::new(
            self.id,
            self.pipeline,
            self.started_at,
            self.records,
            RunOutcome::Completed { context },
        )
    }

    /// Close the run as failed. Any in-flight context is dropped.
    pub fn fail(mut self, error: PhaseError) -> ExecutionReport<T> {
        self.status = RunStatus::Failed;
        ExecutionReport::new(
            self.id,
            self.pipeline,
            self.started_at,
            self.records,
            RunOutcome::Failed { error },
        )
    }

    fn push_record(
        &mut self,
        task: &str,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        outcome: RecordOutcome,
    ) {
        let (phase, position) = match self.status {
            RunStatus::Running { phase, index } => (phase, index),
            other => unreachable!("task finished while run was {other:?}"),
        };
        self.records.push(ExecutionRecord {
            task: task.to_string(),
            phase,
            position,
            started_at,
            duration_ms,
            outcome,
        });
    }
}
