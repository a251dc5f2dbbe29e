//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns a static reference to the configured sync metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn sync_metrics() -> &'static dyn SyncMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns a static reference to the configured error metrics sink.
/// If no sink has been initialized, it returns a no-op sink.
pub fn error_metrics() -> &'static dyn ErrorMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// A sink for metrics related to the CoValue load/sync machinery.
pub trait SyncMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments the gauge for the number of CoValue cores in `state`.
    ///
    /// Together with [`SyncMetricsSink::dec_covalue_state`] this keeps the
    /// sum of the gauge across state labels equal to the number of live
    /// cores: creation increments the initial label only, and every
    /// transition pairs one decrement with one increment.
    fn inc_covalue_state(&self, state: &'static str);
    /// Decrements the gauge for the number of CoValue cores in `state`.
    fn dec_covalue_state(&self, state: &'static str);
    /// Increments a counter for inbound sync messages, labeled by action.
    fn inc_messages_received(&self, action: &'static str);
    /// Increments a counter for outbound sync messages, labeled by action.
    fn inc_messages_sent(&self, action: &'static str);
    /// Increments the gauge for the current number of attached peers.
    fn inc_connected_peers(&self);
    /// Decrements the gauge for the current number of attached peers.
    fn dec_connected_peers(&self);
    /// Observes the wall-clock duration of one load attempt.
    fn observe_load_duration(&self, duration_secs: f64);
}
impl SyncMetricsSink for NopSink {
    fn inc_covalue_state(&self, _state: &'static str) {}
    fn dec_covalue_state(&self, _state: &'static str) {}
    fn inc_messages_received(&self, _action: &'static str) {}
    fn inc_messages_sent(&self, _action: &'static str) {}
    fn inc_connected_peers(&self) {}
    fn dec_connected_peers(&self) {}
    fn observe_load_duration(&self, _duration_secs: f64) {}
}

/// A sink for recording structured error metrics.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a specific error, categorized by its kind and variant.
    fn inc_error(&self, kind: &'static str, variant: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _kind: &'static str, _variant: &'static str) {}
}

/// A unified sink that implements all domain-specific traits, providing a
/// single point of implementation for metrics backends like Prometheus.
pub trait MetricsSink: SyncMetricsSink + ErrorMetricsSink {}

// Blanket implementation to allow any type that implements all sub-traits
// to be used as a `MetricsSink`.
impl<T> MetricsSink for T where T: SyncMetricsSink + ErrorMetricsSink {}
