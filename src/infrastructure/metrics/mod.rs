//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Snowflake IDs generated and clock skew rejections
//! - Counter store mutations by action and result
//! - Sync events processed by outcome
//! - Sync worker runs by outcome and batch size histogram

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "community_core";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Snowflake IDs handed out
pub static IDS_GENERATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("ids_generated_total", "Total number of snowflake IDs generated")
            .namespace(NAMESPACE),
    )
    .expect("Failed to create IDS_GENERATED_TOTAL metric")
});

/// ID requests refused because the clock moved backwards
pub static CLOCK_SKEW_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "clock_skew_total",
            "ID generation attempts rejected due to backwards clock",
        )
        .namespace(NAMESPACE),
    )
    .expect("Failed to create CLOCK_SKEW_TOTAL metric")
});

/// Write-path mutations - tracks action (like, unlike, join, ...) and result
pub static COUNTER_MUTATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("counter_mutations_total", "Total number of counter store mutations")
            .namespace(NAMESPACE),
        &["action", "result"], // "ok", "compensated", "failed"
    )
    .expect("Failed to create COUNTER_MUTATIONS_TOTAL metric")
});

/// Sync events handled by the worker
pub static SYNC_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sync_events_total", "Total number of sync events processed")
            .namespace(NAMESPACE),
        &["outcome"], // "applied", "failed", "deferred"
    )
    .expect("Failed to create SYNC_EVENTS_TOTAL metric")
});

/// Sync worker runs
pub static SYNC_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("sync_runs_total", "Total number of sync worker runs").namespace(NAMESPACE),
        &["outcome"], // "completed", "skipped", "aborted"
    )
    .expect("Failed to create SYNC_RUNS_TOTAL metric")
});

/// Entries read per sync run
pub static SYNC_BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    let buckets = vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 200.0, 500.0, 1000.0];
    Histogram::with_opts(
        HistogramOpts::new("sync_batch_size", "Number of log entries read per sync run")
            .namespace(NAMESPACE)
            .buckets(buckets),
    )
    .expect("Failed to create SYNC_BATCH_SIZE metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(IDS_GENERATED_TOTAL.clone()))
        .expect("Failed to register IDS_GENERATED_TOTAL");
    registry
        .register(Box::new(CLOCK_SKEW_TOTAL.clone()))
        .expect("Failed to register CLOCK_SKEW_TOTAL");
    registry
        .register(Box::new(COUNTER_MUTATIONS_TOTAL.clone()))
        .expect("Failed to register COUNTER_MUTATIONS_TOTAL");
    registry
        .register(Box::new(SYNC_EVENTS_TOTAL.clone()))
        .expect("Failed to register SYNC_EVENTS_TOTAL");
    registry
        .register(Box::new(SYNC_RUNS_TOTAL.clone()))
        .expect("Failed to register SYNC_RUNS_TOTAL");
    registry
        .register(Box::new(SYNC_BATCH_SIZE.clone()))
        .expect("Failed to register SYNC_BATCH_SIZE");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Metrics should be valid UTF-8")
}

pub fn record_id_generated() {
    IDS_GENERATED_TOTAL.inc();
}

pub fn record_clock_skew() {
    CLOCK_SKEW_TOTAL.inc();
}

/// Helper to record a write-path mutation
pub fn record_mutation(action: &str, result: &str) {
    COUNTER_MUTATIONS_TOTAL
        .with_label_values(&[action, result])
        .inc();
}

/// Helper to record per-event worker outcomes
pub fn record_sync_events(applied: usize, failed: usize, deferred: usize) {
    SYNC_EVENTS_TOTAL
        .with_label_values(&["applied"])
        .inc_by(applied as u64);
    SYNC_EVENTS_TOTAL
        .with_label_values(&["failed"])
        .inc_by(failed as u64);
    SYNC_EVENTS_TOTAL
        .with_label_values(&["deferred"])
        .inc_by(deferred as u64);
}

/// Helper to record the end of a worker run
pub fn record_sync_run(outcome: &str, batch_size: usize) {
    SYNC_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    SYNC_BATCH_SIZE.observe(batch_size as f64);
}

/// A tick that found the previous run still in flight
pub fn record_skipped_run() {
    SYNC_RUNS_TOTAL.with_label_values(&["skipped"]).inc();
}
