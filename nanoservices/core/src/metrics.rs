use prometheus::{Encoder, TextEncoder, Registry, HistogramVec, CounterVec, HistogramOpts, Opts};
use once_cell::sync::Lazy;

use crate::phase::Phase;

// Global registry and metrics are initialized lazily.
static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    Registry::new_custom(Some("phaseflow".to_string()), None).unwrap_or_default()
});

static RUN_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    let hist = HistogramVec::new(
        HistogramOpts::new("run_duration_ms", "Pipeline run duration in milliseconds"),
        &["pipeline"],
    )
    .expect("valid run duration histogram");
    REGISTRY.register(Box::new(hist.clone())).ok();
    hist
});

static TASK_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    let hist = HistogramVec::new(
        HistogramOpts::new("task_duration_ms", "Task duration in milliseconds"),
        &["pipeline", "phase"],
    )
    .expect("valid task duration histogram");
    REGISTRY.register(Box::new(hist.clone())).ok();
    hist
});

static RUNS: Lazy<CounterVec> = Lazy::new(|| {
    let c = CounterVec::new(Opts::new("runs_total", "Total pipeline runs"), &["pipeline"])
        .expect("valid runs counter");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static FAILURES: Lazy<CounterVec> = Lazy::new(|| {
    let c = CounterVec::new(Opts::new("failures_total", "Total failed pipeline runs"), &["pipeline"])
        .expect("valid failures counter");
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

/// Observe a pipeline run duration in milliseconds.
pub fn observe_duration(pipeline: &str, duration_ms: f64) {
    RUN_DURATION_MS.with_label_values(&[pipeline]).observe(duration_ms);
}

/// Observe the duration of one task invocation.
pub fn observe_task_duration(pipeline: &str, phase: Phase, duration_ms: f64) {
    TASK_DURATION_MS.with_label_values(&[pipeline, phase.as_str()]).observe(duration_ms);
}

pub fn inc_run(pipeline: &str) {
    RUNS.with_label_values(&[pipeline]).inc();
}

pub fn inc_failure(pipeline: &str) {
    FAILURES.with_label_values(&[pipeline]).inc();
}

/// Current value of the run counter for `pipeline`.
pub fn runs(pipeline: &str) -> f64 {
    RUNS.with_label_values(&[pipeline]).get()
}

/// Current value of the failure counter for `pipeline`.
pub fn failures(pipeline: &str) -> f64 {
    FAILURES.with_label_values(&[pipeline]).get()
}

/// Gather metrics as text in Prometheus exposition format.
///
/// ```no_run
/// use phaseflow_core::metrics;
/// metrics::inc_run("example_pipeline");
/// println!("{}", metrics::gather_text());
/// ```
pub fn gather_text() -> String {
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are process-global, so every test uses its own pipeline label.

    #[test]
    fn counters_accumulate_per_pipeline() {
        inc_run("metrics_counter_test");
        inc_run("metrics_counter_test");
        inc_failure("metrics_counter_test");
        assert_eq!(runs("metrics_counter_test"), 2.0);
        assert_eq!(failures("metrics_counter_test"), 1.0);
        assert_eq!(runs("metrics_untouched"), 0.0);
    }

    #[test]
    fn gather_text_exposes_prefixed_families() {
        inc_run("metrics_gather_test");
        observe_duration("metrics_gather_test", 12.0);
        observe_task_duration("metrics_gather_test", Phase::Transform, 3.0);

        let text = gather_text();
        assert!(text.contains("phaseflow_runs_total"));
        assert!(text.contains("phaseflow_run_duration_ms"));
        assert!(text.contains("phase=\"Transform\""));
        assert!(text.contains("pipeline=\"metrics_gather_test\""));
    }
}
