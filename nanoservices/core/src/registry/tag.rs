//! Tagging ordinary closures with a phase.
//!
//! `phase(Phase::Transform).apply("double", |ctx| ...)` wraps the closure in a
//! task of the requested phase. Tagging declares intent only: nothing is run
//! or registered until the task is handed to a registry.

use std::sync::Arc;

use async_trait::async_trait;
use phaseflow_utils::PhaseflowResult;
use super::binding::PhaseTask;
use super::RegistryError;
use crate::destinations::traits::Destination;
use crate::phase::Phase;
use crate::sources::traits::Source;
use crate::transforms::traits::Transform;

type TaskFn<T> = dyn Fn(Option<T>) -> PhaseflowResult<T> + Send + Sync;

/// Start tagging a closure with `phase`.
pub fn phase(phase: Phase) -> PhaseTag {
    PhaseTag { phase }
}

/// Phase metadata waiting to be attached to a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTag {
    phase: Phase,
}

impl PhaseTag {
    /// Tag by phase name. Unknown names fail here, before anything runs.
    pub fn parse(name: &str) -> Result<Self, RegistryError> {
        Ok(Self { phase: name.parse()? })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Attach the tag to `f`. The closure receives `None` when it is the first
    /// task of the run, otherwise the current context.
    pub fn apply<T, F>(self, name: impl Into<String>, f: F) -> PhaseTask<T>
    where
        T: Send + 'static,
        F: Fn(Option<T>) -> PhaseflowResult<T> + Send + Sync + 'static,
    {
        let task = FnTask { name: name.into(), f: Arc::new(f) };
        match self.phase {
            Phase::Extract => PhaseTask::Extract(Arc::new(task)),
            Phase::Transform => PhaseTask::Transform(Arc::new(task)),
            Phase::Load => PhaseTask::Load(Arc::new(task)),
        }
    }
}

/// A closure usable as any phase's task.
pub struct FnTask<T> {
    name: String,
    f: Arc<TaskFn<T>>,
}

#[async_trait]
impl<T: Send + 'static> Source<T> for FnTask<T> {
    fn name(&self) -> &str { &self.name }
    async fn extract(&self) -> PhaseflowResult<T> {
        (self.f)(None)
    }
}

#[async_trait]
impl<T: Send + 'static> Transform<T> for FnTask<T> {
    fn name(&self) -> &str { &self.name }
    async fn transform(&self, input: T) -> PhaseflowResult<T> {
        (self.f)(Some(input))
    }
    async fn transform_empty(&self) -> PhaseflowResult<T> {
        (self.f)(None)
    }
}

#[async_trait]
impl<T: Send + 'static> Destination<T> for FnTask<T> {
    fn name(&self) -> &str { &self.name }
    async fn load(&self, input: T) -> PhaseflowResult<T> {
        (self.f)(Some(input))
    }
    async fn load_empty(&self) -> PhaseflowResult<T> {
        (self.f)(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn tag_attaches_phase() {
        let task = phase(Phase::Load).apply("noop", |ctx: Option<i64>| Ok(ctx.unwrap_or(0)));
        assert_eq!(task.phase(), Phase::Load);
        assert_eq!(task.name(), "noop");
    }

    #[test]
    fn parse_fails_fast_on_unknown_phase() {
        assert_eq!(PhaseTag::parse("transform").unwrap().phase(), Phase::Transform);
        let err = PhaseTag::parse("Cleanup").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPhase(_)));
    }

    #[tokio::test]
    async fn tagging_does_not_change_behaviour() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let task = phase(Phase::Transform).apply("inc", move |ctx: Option<i64>| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ctx.unwrap_or(0) + 1)
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(task.invoke(Some(41)).await.unwrap(), 42);
        assert_eq!(task.invoke(None).await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
