use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use phaseflow_utils::error::Error;
use phaseflow_utils::PhaseflowResult;
use crate::execution::state::RunState;
use crate::metrics;
use crate::phase::Phase;
use crate::registry::{PhaseBinding, PhaseRegistry};
use crate::report::{ExecutionReport, PhaseError, Summary};

/// Folds the results of several Extract tasks, in registration order, into
/// the single value handed to the Transform phase.
pub type Combiner<T> = Arc<dyn Fn(Vec<T>) -> PhaseflowResult<T> + Send + Sync>;

/// Task name on the record written when combining extract results fails.
pub const COMBINER_RECORD: &str = "<combiner>";

/// Run every binding in `registry` once, phase by phase, and report.
///
/// Tasks run strictly one after another. The first failure stops the run; no
/// later task is invoked and the report ends with the failing record.
pub async fn run_phases<T>(
    pipeline: &str,
    registry: &PhaseRegistry<T>,
    combiner: Option<&Combiner<T>>,
) -> ExecutionReport<T>
where
    T: Clone + Send + Summary + 'static,
{
    let mut state = RunState::new(pipeline);
    tracing::info!(run = %state.id, pipeline, tasks = registry.len(), "pipeline run started");
    metrics::inc_run(pipeline);

    for phase in Phase::ALL {
        let bindings = registry.bindings(phase);
        if bindings.is_empty() {
            tracing::debug!(run = %state.id, phase = %phase, "no tasks registered for phase");
            continue;
        }

        tracing::info!(run = %state.id, phase = %phase, tasks = bindings.len(), "running phase");
        let result = match phase {
            Phase::Extract => run_extract(&mut state, bindings, combiner).await,
            Phase::Transform => run_transform(&mut state, bindings).await,
            Phase::Load => run_load(&mut state, bindings).await,
        };

        if let Err(error) = result {
            tracing::error!(run = %state.id, pipeline, error = %error, "pipeline run failed");
            metrics::inc_failure(pipeline);
            let report = state.fail(error);
            metrics::observe_duration(pipeline, report.duration_ms() as f64);
            return report;
        }
    }

    let report = state.complete();
    metrics::observe_duration(pipeline, report.duration_ms() as f64);
    tracing::info!(
        run = %report.run_id(),
        pipeline,
        status = report.status(),
        duration_ms = report.duration_ms(),
        "pipeline run finished"
    );
    report
}

async fn run_extract<T>(
    state: &mut RunState<T>,
    bindings: &[PhaseBinding<T>],
    combiner: Option<&Combiner<T>>,
) -> Result<(), PhaseError>
where
    T: Clone + Send + Summary + 'static,
{
    let mut results = Vec::with_capacity(bindings.len());
    for binding in bindings {
        results.push(invoke(state, binding, None).await?);
    }
    if results.len() < 2 {
        state.context = results.pop();
        return Ok(());
    }

    // The merge gets its own record, positioned after the last extract.
    state.begin(Phase::Extract, results.len());
    let started_at = Utc::now();
    let start = Instant::now();
    match combine(results, combiner) {
        Ok(context) => {
            state.context = Some(context);
            Ok(())
        }
        Err(error) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let detail = match &error {
                PhaseError::Combine { source, .. } => source.to_string(),
                other => other.to_string(),
            };
            tracing::error!(run = %state.id, error = %error, "combining extract results failed");
            state.task_failed(COMBINER_RECORD, started_at, duration_ms, detail);
            Err(error)
        }
    }
}

async fn run_transform<T>(state: &mut RunState<T>, bindings: &[PhaseBinding<T>]) -> Result<(), PhaseError>
where
    T: Clone + Send + Summary + 'static,
{
    for binding in bindings {
        let input = state.context.take();
        let output = invoke(state, binding, input).await?;
        state.context = Some(output);
    }
    Ok(())
}

/// Every destination gets the same input; the last one's result is kept.
async fn run_load<T>(state: &mut RunState<T>, bindings: &[PhaseBinding<T>]) -> Result<(), PhaseError>
where
    T: Clone + Send + Summary + 'static,
{
    let mut input = state.context.take();
    let mut last = None;
    for (i, binding) in bindings.iter().enumerate() {
        let arg = if i + 1 == bindings.len() { input.take() } else { input.clone() };
        last = Some(invoke(state, binding, arg).await?);
    }
    state.context = last;
    Ok(())
}

async fn invoke<T>(
    state: &mut RunState<T>,
    binding: &PhaseBinding<T>,
    input: Option<T>,
) -> Result<T, PhaseError>
where
    T: Clone + Send + Summary + 'static,
{
    let phase = binding.phase();
    state.begin(phase, binding.position());
    tracing::debug!(run = %state.id, phase = %phase, task = binding.name(), "invoking task");

    let started_at = Utc::now();
    let start = Instant::now();
    let result = binding.task().invoke(input).await;
    let duration_ms = start.elapsed().as_millis() as u64;
    metrics::observe_task_duration(&state.pipeline, phase, duration_ms as f64);

    match result {
        Ok(value) => {
            let summary = value.summary();
            tracing::info!(
                run = %state.id,
                phase = %phase,
                task = binding.name(),
                duration_ms,
                result = %summary,
                "task completed"
            );
            state.task_succeeded(binding.name(), started_at, duration_ms, summary);
            Ok(value)
        }
        Err(source) => {
            tracing::error!(
                run = %state.id,
                phase = %phase,
                task = binding.name(),
                error = %source,
                "task failed"
            );
            state.task_failed(binding.name(), started_at, duration_ms, source.to_string());
            Err(PhaseError::Task {
                phase,
                task: binding.name().to_string(),
                position: binding.position(),
                source,
            })
        }
    }
}

fn combine<T>(results: Vec<T>, combiner: Option<&Combiner<T>>) -> Result<T, PhaseError> {
    let count = results.len();
    let Some(combiner) = combiner else {
        return Err(PhaseError::Combine {
            count,
            source: Error::task("no combiner configured for multiple extract tasks"),
        });
    };
    combiner(results).map_err(|source| PhaseError::Combine { count, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::phase;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn tracked(
        log: &Arc<Mutex<Vec<String>>>,
        p: Phase,
        name: &'static str,
        f: impl Fn(Option<Value>) -> PhaseflowResult<Value> + Send + Sync + 'static,
    ) -> crate::registry::PhaseTask<Value> {
        let log = log.clone();
        phase(p).apply(name, move |ctx| {
            log.lock().unwrap().push(name.to_string());
            f(ctx)
        })
    }

    #[tokio::test]
    async fn threads_context_through_phases() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PhaseRegistry::new();
        registry.register(tracked(&log, Phase::Load, "load", |ctx| Ok(ctx.unwrap()))).unwrap();
        registry.register(tracked(&log, Phase::Transform, "double", |ctx| {
            let n = ctx.unwrap()["n"].as_i64().unwrap();
            Ok(json!({"n": n * 2}))
        })).unwrap();
        registry.register(tracked(&log, Phase::Extract, "extract", |_| Ok(json!({"n": 1})))).unwrap();

        let report = run_phases("threading", &registry, None).await;

        assert!(report.is_success());
        assert_eq!(report.final_context(), Some(&json!({"n": 2})));
        assert_eq!(*log.lock().unwrap(), vec!["extract", "double", "load"]);
        assert_eq!(report.records().len(), 3);
    }

    #[tokio::test]
    async fn transform_failure_stops_before_load() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PhaseRegistry::new();
        registry.register(tracked(&log, Phase::Extract, "extract", |_| Ok(json!(1)))).unwrap();
        registry.register(tracked(&log, Phase::Transform, "explode", |_| Err(Error::task("bad row")))).unwrap();
        registry.register(tracked(&log, Phase::Load, "load", |ctx| Ok(ctx.unwrap()))).unwrap();

        let report = run_phases("failing", &registry, None).await;

        assert!(!report.is_success());
        assert_eq!(*log.lock().unwrap(), vec!["extract", "explode"]);
        assert_eq!(report.records_for(Phase::Load).count(), 0);
        let last = report.last_record().unwrap();
        assert_eq!(last.phase, Phase::Transform);
        assert_eq!(last.error(), Some("bad row"));
        assert!(matches!(report.error(), Some(PhaseError::Task { task, .. }) if task == "explode"));
    }

    #[tokio::test]
    async fn extract_results_are_combined_in_order() {
        let mut registry: PhaseRegistry<Vec<i64>> = PhaseRegistry::new();
        registry.register(phase(Phase::Extract).apply("a", |_| Ok(vec![1, 2]))).unwrap();
        registry.register(phase(Phase::Extract).apply("b", |_| Ok(vec![3, 4]))).unwrap();
        registry.register(phase(Phase::Transform).apply("seen", |ctx: Option<Vec<i64>>| Ok(ctx.unwrap()))).unwrap();

        let concat: Combiner<Vec<i64>> = Arc::new(|parts: Vec<Vec<i64>>| Ok(parts.concat()));
        let report = run_phases("merge", &registry, Some(&concat)).await;

        assert_eq!(report.final_context(), Some(&vec![1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn multiple_extracts_without_combiner_fail() {
        let mut registry: PhaseRegistry<Vec<i64>> = PhaseRegistry::new();
        registry.register(phase(Phase::Extract).apply("a", |_| Ok(vec![1]))).unwrap();
        registry.register(phase(Phase::Extract).apply("b", |_| Ok(vec![2]))).unwrap();

        let report = run_phases("merge", &registry, None).await;
        assert!(matches!(report.error(), Some(PhaseError::Combine { count: 2, .. })));
        assert_eq!(report.records().len(), 3);
    }

    #[tokio::test]
    async fn failing_combiner_is_the_last_record() {
        let mut registry: PhaseRegistry<Vec<i64>> = PhaseRegistry::new();
        registry.register(phase(Phase::Extract).apply("a", |_| Ok(vec![1]))).unwrap();
        registry.register(phase(Phase::Extract).apply("b", |_| Ok(vec![2]))).unwrap();
        registry.register(phase(Phase::Transform).apply("never", |ctx: Option<Vec<i64>>| Ok(ctx.unwrap()))).unwrap();

        let broken: Combiner<Vec<i64>> = Arc::new(|_: Vec<Vec<i64>>| -> PhaseflowResult<Vec<i64>> {
            Err(Error::task("merge broke"))
        });
        let report = run_phases("merge", &registry, Some(&broken)).await;

        assert_eq!(report.records().len(), 3);
        let last = report.last_record().unwrap();
        assert_eq!(last.task, COMBINER_RECORD);
        assert_eq!(last.phase, Phase::Extract);
        assert_eq!(last.position, 2);
        assert_eq!(last.error(), Some("merge broke"));
        assert_eq!(report.records_for(Phase::Transform).count(), 0);
    }

    #[tokio::test]
    async fn every_destination_gets_the_transform_output() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry: PhaseRegistry<i64> = PhaseRegistry::new();
        registry.register(phase(Phase::Extract).apply("one", |_| Ok(1))).unwrap();
        registry.register(phase(Phase::Transform).apply("plus", |ctx: Option<i64>| Ok(ctx.unwrap() + 10))).unwrap();
        for name in ["first", "second"] {
            let seen = seen.clone();
            registry.register(phase(Phase::Load).apply(name, move |ctx: Option<i64>| {
                let v = ctx.unwrap();
                seen.lock().unwrap().push(v);
                let factor = if name == "first" { 2 } else { 3 };
                Ok(v * factor)
            })).unwrap();
        }

        let report = run_phases("fan_out", &registry, None).await;
        assert_eq!(*seen.lock().unwrap(), vec![11, 11]);
        assert_eq!(report.final_context(), Some(&33));
    }

    #[tokio::test]
    async fn no_load_keeps_transform_output() {
        let mut registry: PhaseRegistry<i64> = PhaseRegistry::new();
        registry.register(phase(Phase::Extract).apply("one", |_| Ok(1))).unwrap();
        registry.register(phase(Phase::Transform).apply("triple", |ctx: Option<i64>| Ok(ctx.unwrap() * 3))).unwrap();

        let report = run_phases("no_load", &registry, None).await;
        assert!(report.is_success());
        assert_eq!(report.final_context(), Some(&3));
        assert_eq!(report.records_for(Phase::Load).count(), 0);
    }

    #[tokio::test]
    async fn empty_registry_completes_with_no_context() {
        let registry: PhaseRegistry<i64> = PhaseRegistry::new();
        let report = run_phases("empty", &registry, None).await;
        assert!(report.is_success());
        assert!(report.records().is_empty());
        assert_eq!(report.final_context(), None);
    }

    #[tokio::test]
    async fn first_task_without_extract_gets_no_input() {
        let mut registry: PhaseRegistry<i64> = PhaseRegistry::new();
        registry.register(phase(Phase::Transform).apply("start", |ctx: Option<i64>| {
            assert!(ctx.is_none());
            Ok(5)
        })).unwrap();

        let report = run_phases("no_extract", &registry, None).await;
        assert_eq!(report.final_context(), Some(&5));
    }
}
