use async_trait::async_trait;
use phaseflow_utils::error::Error;
use phaseflow_utils::PhaseflowResult;

/// Work registered for the Load phase.
///
/// Every destination receives the same Transform output. Whatever the last
/// destination returns becomes the run's final context.
#[async_trait]
pub trait Destination<T: Send + 'static>: Send + Sync {
    fn name(&self) -> &str;

    /// Load data to the destination
    async fn load(&self, input: T) -> PhaseflowResult<T>;

    /// Called instead of `load` when no earlier task produced a value.
    async fn load_empty(&self) -> PhaseflowResult<T> {
        Err(Error::MissingInput { task: self.name().to_string() })
    }
}
