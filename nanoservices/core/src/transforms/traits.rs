use async_trait::async_trait;
use phaseflow_utils::error::Error;
use phaseflow_utils::PhaseflowResult;

/// Work registered for the Transform phase: one value in, one value out.
#[async_trait]
pub trait Transform<T: Send + 'static>: Send + Sync {
    fn name(&self) -> &str;

    /// Transform the value produced by the previous task
    async fn transform(&self, input: T) -> PhaseflowResult<T>;

    /// Called instead of `transform` when no earlier task produced a value.
    async fn transform_empty(&self) -> PhaseflowResult<T> {
        Err(Error::MissingInput { task: self.name().to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    #[async_trait]
    impl Transform<Vec<i64>> for Doubler {
        fn name(&self) -> &str { "doubler" }
        async fn transform(&self, input: Vec<i64>) -> PhaseflowResult<Vec<i64>> {
            Ok(input.into_iter().map(|n| n * 2).collect())
        }
    }

    #[tokio::test]
    async fn transform_trait_works() {
        let t = Doubler;
        assert_eq!(t.name(), "doubler");
        assert_eq!(t.transform(vec![1, 2, 3]).await.unwrap(), vec![2, 4, 6]);
    }

    #[tokio::test]
    async fn transform_without_input_fails_by_default() {
        let err = Doubler.transform_empty().await.unwrap_err();
        assert!(matches!(err, Error::MissingInput { ref task } if task == "doubler"));
    }
}
