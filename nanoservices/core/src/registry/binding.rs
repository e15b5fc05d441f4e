use std::fmt;
use std::sync::Arc;

use phaseflow_utils::PhaseflowResult;
use crate::destinations::traits::Destination;
use crate::phase::Phase;
use crate::sources::traits::Source;
use crate::transforms::traits::Transform;

/// A unit of work tagged with the phase it belongs to.
pub enum PhaseTask<T: Send + 'static> {
    Extract(Arc<dyn Source<T>>),
    Transform(Arc<dyn Transform<T>>),
    Load(Arc<dyn Destination<T>>),
}

impl<T: Send + 'static> PhaseTask<T> {
    pub fn source(source: impl Source<T> + 'static) -> Self {
        PhaseTask::Extract(Arc::new(source))
    }

    pub fn transform(transform: impl Transform<T> + 'static) -> Self {
        PhaseTask::Transform(Arc::new(transform))
    }

    pub fn destination(destination: impl Destination<T> + 'static) -> Self {
        PhaseTask::Load(Arc::new(destination))
    }

    pub fn phase(&self) -> Phase {
        match self {
            PhaseTask::Extract(_) => Phase::Extract,
            PhaseTask::Transform(_) => Phase::Transform,
            PhaseTask::Load(_) => Phase::Load,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PhaseTask::Extract(s) => s.name(),
            PhaseTask::Transform(t) => t.name(),
            PhaseTask::Load(d) => d.name(),
        }
    }

    /// Run the task against the current context.
    ///
    /// Sources never take input, so `input` is ignored for them. Transforms
    /// and destinations fall back to their `*_empty` entry point when the
    /// context is absent.
    pub async fn invoke(&self, input: Option<T>) -> PhaseflowResult<T> {
        match (self, input) {
            (PhaseTask::Extract(s), _) => s.extract().await,
            (PhaseTask::Transform(t), Some(value)) => t.transform(value).await,
            (PhaseTask::Transform(t), None) => t.transform_empty().await,
            (PhaseTask::Load(d), Some(value)) => d.load(value).await,
            (PhaseTask::Load(d), None) => d.load_empty().await,
        }
    }
}

impl<T: Send + 'static> Clone for PhaseTask<T> {
    fn clone(&self) -> Self {
        match self {
            PhaseTask::Extract(s) => PhaseTask::Extract(Arc::clone(s)),
            PhaseTask::Transform(t) => PhaseTask::Transform(Arc::clone(t)),
            PhaseTask::Load(d) => PhaseTask::Load(Arc::clone(d)),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for PhaseTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseTask")
            .field("phase", &self.phase())
            .field("name", &self.name())
            .finish()
    }
}

/// A task registered under its phase, with its position in that phase.
#[derive(Debug)]
pub struct PhaseBinding<T: Send + 'static> {
    task: PhaseTask<T>,
    position: usize,
}

impl<T: Send + 'static> PhaseBinding<T> {
    pub(crate) fn new(task: PhaseTask<T>, position: usize) -> Self {
        Self { task, position }
    }

    pub fn phase(&self) -> Phase {
        self.task.phase()
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Zero-based registration index within the phase.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn task(&self) -> &PhaseTask<T> {
        &self.task
    }
}

impl<T: Send + 'static> Clone for PhaseBinding<T> {
    fn clone(&self) -> Self {
        Self { task: self.task.clone(), position: self.position }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use phaseflow_utils::error::Error;

    struct Numbers;

    #[async_trait]
    impl Source<Vec<i64>> for Numbers {
        fn name(&self) -> &str { "numbers" }
        async fn extract(&self) -> PhaseflowResult<Vec<i64>> { Ok(vec![1, 2]) }
    }

    struct Reverse;

    #[async_trait]
    impl Transform<Vec<i64>> for Reverse {
        fn name(&self) -> &str { "reverse" }
        async fn transform(&self, mut input: Vec<i64>) -> PhaseflowResult<Vec<i64>> {
            input.reverse();
            Ok(input)
        }
    }

    #[test]
    fn variant_determines_phase() {
        let extract = PhaseTask::source(Numbers);
        let transform = PhaseTask::transform(Reverse);
        assert_eq!(extract.phase(), Phase::Extract);
        assert_eq!(extract.name(), "numbers");
        assert_eq!(transform.phase(), Phase::Transform);
    }

    #[tokio::test]
    async fn invoke_threads_input() {
        let task = PhaseTask::transform(Reverse);
        assert_eq!(task.invoke(Some(vec![1, 2, 3])).await.unwrap(), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn invoke_without_input_uses_empty_entry_point() {
        let task = PhaseTask::transform(Reverse);
        assert!(matches!(task.invoke(None).await, Err(Error::MissingInput { .. })));

        let source = PhaseTask::source(Numbers);
        assert_eq!(source.invoke(None).await.unwrap(), vec![1, 2]);
    }

    #[test]
    fn binding_exposes_position() {
        let binding = PhaseBinding::new(PhaseTask::source(Numbers), 2);
        assert_eq!(binding.position(), 2);
        assert_eq!(binding.phase(), Phase::Extract);
        assert_eq!(binding.clone().name(), "numbers");
    }
}
