use async_trait::async_trait;
use phaseflow_utils::PhaseflowResult;

/// Work registered for the Extract phase.
///
/// A source takes no input. When several sources are registered each one runs
/// exactly once and their results are handed to the pipeline's combiner.
#[async_trait]
pub trait Source<T: Send + 'static>: Send + Sync {
    /// Human-readable name for logging and the execution report
    fn name(&self) -> &str;

    /// Extract data from the source
    async fn extract(&self) -> PhaseflowResult<T>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct TestSource;

    #[async_trait]
    impl Source<Value> for TestSource {
        fn name(&self) -> &str { "test_source" }
        async fn extract(&self) -> PhaseflowResult<Value> {
            Ok(json!([{"id": 1}, {"id": 2}, {"id": 3}]))
        }
    }

    #[tokio::test]
    async fn source_trait_works() {
        let src = TestSource;
        assert_eq!(src.name(), "test_source");
        let data = src.extract().await.unwrap();
        assert_eq!(data.as_array().unwrap().len(), 3);
    }
}
