use std::time::Instant;

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

const DEFAULT_BUCKETS: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0, 10000.0, 30000.0,
    60000.0,
];

// Total number of requests
static REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "nsgate_requests_total",
        "The total number of client requests since nsgate started"
    )
    .unwrap()
});

// Counter for response status per addressed target
static STATUS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "nsgate_http_status",
        "HTTP status codes returned to clients per target kind",
        &[
            "code",   // HTTP status code
            "target", // app, apps, group or passthrough
        ]
    )
    .unwrap()
});

// Histogram for request latency
static LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "nsgate_http_latency",
        "Request latency in milliseconds per target kind",
    )
    .buckets(DEFAULT_BUCKETS.to_vec());
    register_histogram_vec!(opts, &["target"]).unwrap()
});

// Orchestrator calls by kind and outcome
static UPSTREAM_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "nsgate_orchestrator_calls_total",
        "Calls made to the orchestrator per call kind and outcome",
        &[
            "call",    // get_app, get_group, list_apps or forward
            "outcome", // ok, not_found or error
        ]
    )
    .unwrap()
});

pub fn record_request(target: &str, code: u16, started: Instant) {
    REQUESTS.inc();
    STATUS
        .with_label_values(&[code.to_string().as_str(), target])
        .inc();
    LATENCY
        .with_label_values(&[target])
        .observe(started.elapsed().as_millis() as f64);
}

pub fn record_upstream_call(call: &str, outcome: &str) {
    UPSTREAM_CALLS.with_label_values(&[call, outcome]).inc();
}

/// Every registered metric in the prometheus text format.
pub fn gather_text() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        log::error!("failed to encode metrics: {e}");
    }
    buffer
}
