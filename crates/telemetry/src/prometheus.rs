//! A concrete implementation of the metrics sinks using the Prometheus crate.

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_gauge, register_gauge_vec, register_histogram,
    register_int_counter_vec, Gauge, GaugeVec, Histogram, IntCounterVec,
};

// --- Metric Statics ---
// OnceCell holds the metric collectors; they are initialized exactly once
// by the `install` function.

static COVALUE_LOADING_STATE: OnceCell<GaugeVec> = OnceCell::new();
static CONNECTED_PEERS: OnceCell<Gauge> = OnceCell::new();
static MESSAGES_RECEIVED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static MESSAGES_SENT_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static LOAD_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();
static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Helper macro to reduce boilerplate for getting a metric from OnceCell.
/// This will panic if `install()` has not been called, which is intentional
/// as it indicates a critical application setup error.
macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("Prometheus sink not initialized. Call telemetry::prometheus::install() first.")
    };
}

impl SyncMetricsSink for PrometheusSink {
    fn inc_covalue_state(&self, state: &'static str) {
        get_metric!(COVALUE_LOADING_STATE)
            .with_label_values(&[state])
            .inc();
    }
    fn dec_covalue_state(&self, state: &'static str) {
        get_metric!(COVALUE_LOADING_STATE)
            .with_label_values(&[state])
            .dec();
    }
    fn inc_messages_received(&self, action: &'static str) {
        get_metric!(MESSAGES_RECEIVED_TOTAL)
            .with_label_values(&[action])
            .inc();
    }
    fn inc_messages_sent(&self, action: &'static str) {
        get_metric!(MESSAGES_SENT_TOTAL)
            .with_label_values(&[action])
            .inc();
    }
    fn inc_connected_peers(&self) {
        get_metric!(CONNECTED_PEERS).inc();
    }
    fn dec_connected_peers(&self) {
        get_metric!(CONNECTED_PEERS).dec();
    }
    fn observe_load_duration(&self, duration_secs: f64) {
        get_metric!(LOAD_DURATION_SECONDS).observe(duration_secs);
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, kind: &'static str, variant: &'static str) {
        get_metric!(ERRORS_TOTAL)
            .with_label_values(&[kind, variant])
            .inc();
    }
}

/// Initializes all Prometheus metrics collectors and returns a static reference to the sink.
/// This function must be called only once at application startup.
///
/// The reference is to the concrete sink so that callers can hand it to
/// consumers of the individual `*MetricsSink` traits as well as the unified
/// [`MetricsSink`].
#[allow(clippy::expect_used)]
pub fn install() -> Result<&'static PrometheusSink, prometheus::Error> {
    COVALUE_LOADING_STATE
        .set(register_gauge_vec!(
            "lattice_covalue_loading_state",
            "Number of live CoValue cores per loading state.",
            &["state"]
        )?)
        .expect("static already initialized");
    CONNECTED_PEERS
        .set(register_gauge!(
            "lattice_sync_connected_peers",
            "Current number of attached peers."
        )?)
        .expect("static already initialized");
    MESSAGES_RECEIVED_TOTAL
        .set(register_int_counter_vec!(
            "lattice_sync_messages_received_total",
            "Total inbound sync messages.",
            &["action"]
        )?)
        .expect("static already initialized");
    MESSAGES_SENT_TOTAL
        .set(register_int_counter_vec!(
            "lattice_sync_messages_sent_total",
            "Total outbound sync messages.",
            &["action"]
        )?)
        .expect("static already initialized");
    LOAD_DURATION_SECONDS
        .set(register_histogram!(
            "lattice_load_duration_seconds",
            "Wall-clock duration of CoValue load attempts.",
            exponential_buckets(0.002, 2.0, 15)?
        )?)
        .expect("static already initialized");
    ERRORS_TOTAL
        .set(register_int_counter_vec!(
            "lattice_errors_total",
            "Total number of errors, categorized by type and variant.",
            &["kind", "variant"]
        )?)
        .expect("static already initialized");

    static SINK: PrometheusSink = PrometheusSink;
    Ok(&SINK)
}
