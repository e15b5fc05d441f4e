use std::fmt;

use crate::execution::runner::{self, Combiner};
use crate::registry::PhaseRegistry;
use crate::report::{ExecutionReport, Summary};

/// Top-level orchestrator. Built by [`crate::builder::PhaseFlowBuilder`].
///
/// The registry is read-only once built. Every call to [`PhaseFlow::run`]
/// gets its own context and record list, so runs never share state.
pub struct PhaseFlow<T: Send + 'static> {
    name: String,
    registry: PhaseRegistry<T>,
    combiner: Option<Combiner<T>>,
}

impl<T: Send + 'static> PhaseFlow<T> {
    pub(crate) fn new(name: String, registry: PhaseRegistry<T>, combiner: Option<Combiner<T>>) -> Self {
        Self { name, registry, combiner }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &PhaseRegistry<T> {
        &self.registry
    }

    pub fn has_combiner(&self) -> bool {
        self.combiner.is_some()
    }
}

impl<T: Send + 'static> fmt::Debug for PhaseFlow<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseFlow")
            .field("name", &self.name)
            .field("tasks", &self.registry.len())
            .field("combiner", &self.combiner.is_some())
            .finish()
    }
}

impl<T> PhaseFlow<T>
where
    T: Clone + Send + Summary + 'static,
{
    /// Run Extract, Transform and Load once and report what happened.
    pub async fn run(&self) -> ExecutionReport<T> {
        runner::run_phases(&self.name, &self.registry, self.combiner.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::PhaseFlowBuilder;
    use crate::phase::Phase;
    use crate::registry::phase;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn engine_runs_repeatedly_with_fresh_state() {
        let extract_count = Arc::new(AtomicUsize::new(0));
        let counter = extract_count.clone();

        let flow = PhaseFlowBuilder::new("test")
            .task(phase(Phase::Extract).apply("count", move |_: Option<usize>| {
                Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
            }))
            .build()
            .unwrap();

        let first = flow.run().await;
        let second = flow.run().await;

        assert_eq!(first.final_context(), Some(&1));
        assert_eq!(second.final_context(), Some(&2));
        assert_ne!(first.run_id(), second.run_id());
        assert_eq!(second.records().len(), 1);
        assert_eq!(extract_count.load(Ordering::SeqCst), 2);
    }
}
