use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder,
    IntCounter, IntCounterVec, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref ALERTS_RECEIVED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "rca_alerts_received_total",
        "Total number of alerts received on the webhook.",
        REGISTRY
    )
    .expect("Failed to register rca_alerts_received_total");
    pub static ref ANALYSES_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "rca_analyses_total",
        "Root cause analyses run, by origin and outcome.",
        &["origin", "outcome"],
        REGISTRY
    )
    .expect("Failed to register rca_analyses_total");
    pub static ref TOOL_CALLS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "rca_tool_calls_total",
        "Agent tool invocations, by tool and outcome.",
        &["tool", "outcome"],
        REGISTRY
    )
    .expect("Failed to register rca_tool_calls_total");
}

/// Force registration so every family shows up on the first scrape.
pub fn register_metrics() {
    lazy_static::initialize(&ALERTS_RECEIVED_TOTAL);
    lazy_static::initialize(&ANALYSES_TOTAL);
    lazy_static::initialize(&TOOL_CALLS_TOTAL);
}

pub fn record_tool_call(tool: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    TOOL_CALLS_TOTAL.with_label_values(&[tool, outcome]).inc();
}

pub fn record_analysis(origin: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ANALYSES_TOTAL.with_label_values(&[origin, outcome]).inc();
}

// Function to gather metrics for exposition
pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("Failed to convert metrics to string: {}", e)))
}
