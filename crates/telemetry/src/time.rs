use crate::sinks::SyncMetricsSink;
use std::time::Instant;

/// Observes the wall-clock duration of one load attempt on drop.
pub struct LoadTimer<'a> {
    sink: &'a dyn SyncMetricsSink,
    start: Instant,
}

impl<'a> LoadTimer<'a> {
    pub fn new(sink: &'a dyn SyncMetricsSink) -> Self {
        Self {
            sink,
            start: Instant::now(),
        }
    }
}

impl Drop for LoadTimer<'_> {
    fn drop(&mut self) {
        self.sink
            .observe_load_duration(self.start.elapsed().as_secs_f64());
    }
}
