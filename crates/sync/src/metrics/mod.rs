use lattice_telemetry::sinks::{NopSink, SyncMetricsSink};
use once_cell::sync::OnceCell;

static NOP_SINK: NopSink = NopSink;
pub static SINK: OnceCell<&'static dyn SyncMetricsSink> = OnceCell::new();

pub fn metrics() -> &'static dyn SyncMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}
