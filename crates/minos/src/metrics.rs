//! Prometheus metrics for the test phase

use std::sync::{LazyLock, Once};

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Duration of a single attempt
pub static ATTEMPT_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        "grader_attempt_duration_seconds",
        "Wall-clock time of one program attempt",
    )
    .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);

    Histogram::with_opts(opts).expect("Failed to create histogram")
});

/// Verdict counter by type
pub static VERDICT_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let opts = Opts::new("grader_verdict_total", "Total verdicts by type");
    IntCounterVec::new(opts, &["verdict"]).expect("Failed to create counter")
});

/// Program spawns, retries included
pub static ATTEMPTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("grader_attempts_total", "Total program attempts")
        .expect("Failed to create counter")
});

/// Attempts killed at the time limit
pub static TIMEOUTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("grader_timeouts_total", "Total attempts that timed out")
        .expect("Failed to create counter")
});

/// Tests currently executing
pub static ACTIVE_TESTS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new("grader_active_tests", "Currently running test cases")
        .expect("Failed to create gauge")
});

static INIT: Once = Once::new();

/// Register all metrics with [`REGISTRY`]; later calls are no-ops
pub fn init_metrics() {
    INIT.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(ATTEMPT_DURATION.clone()),
            Box::new(VERDICT_TOTAL.clone()),
            Box::new(ATTEMPTS_TOTAL.clone()),
            Box::new(TIMEOUTS_TOTAL.clone()),
            Box::new(ACTIVE_TESTS.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Record a verdict
pub fn record_verdict(verdict: &str) {
    VERDICT_TOTAL.with_label_values(&[verdict]).inc();
}

/// Record one finished attempt
pub fn record_attempt(duration_secs: f64, timed_out: bool) {
    ATTEMPTS_TOTAL.inc();
    ATTEMPT_DURATION.observe(duration_secs);
    if timed_out {
        TIMEOUTS_TOTAL.inc();
    }
}

/// Render the registry in the Prometheus text format
pub fn gather_text() -> String {
    init_metrics();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
