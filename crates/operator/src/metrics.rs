use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref TOOLSETS_ENABLED: IntGauge = IntGauge::new(
        "sleuth_toolsets_enabled",
        "Number of toolsets that passed prerequisite checking."
    )
    .unwrap();
    pub static ref TOOLSETS_FAILED: IntGauge = IntGauge::new(
        "sleuth_toolsets_failed",
        "Number of toolsets whose prerequisite checks failed."
    )
    .unwrap();
    pub static ref PREREQ_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "sleuth_prereq_failures_total",
        "Total number of failed prerequisite checks."
    )
    .unwrap();
    pub static ref TRANSFORMS_APPLIED_TOTAL: IntCounter = IntCounter::new(
        "sleuth_transforms_applied_total",
        "Total number of successfully applied output transformers."
    )
    .unwrap();
    pub static ref TRANSFORM_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "sleuth_transform_failures_total",
        "Total number of transformer failures that fell back to raw output."
    )
    .unwrap();
}

/// Register all metrics with the operator registry. Safe to call more than
/// once; re-registration is ignored.
pub fn register_metrics() {
    let _ = REGISTRY.register(Box::new(TOOLSETS_ENABLED.clone()));
    let _ = REGISTRY.register(Box::new(TOOLSETS_FAILED.clone()));
    let _ = REGISTRY.register(Box::new(PREREQ_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TRANSFORMS_APPLIED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TRANSFORM_FAILURES_TOTAL.clone()));
}

/// Gather metrics for exposition.
pub fn gather_metrics() -> String {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}
