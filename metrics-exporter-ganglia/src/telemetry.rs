/// Outcome of a single export cycle.
///
/// Every series of every registered metric has its metadata and its value sent once per cycle. Failures are counted
/// here, and logged, but never propagated back to instrumented code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushTelemetry {
    metrics_flushed: u64,
    meta_sent: u64,
    meta_failed: u64,
    values_sent: u64,
    values_failed: u64,
}

impl FlushTelemetry {
    /// Number of registered metrics visited.
    pub fn metrics_flushed(&self) -> u64 {
        self.metrics_flushed
    }

    /// Number of metadata sends that succeeded.
    pub fn meta_sent(&self) -> u64 {
        self.meta_sent
    }

    /// Number of metadata sends that failed.
    pub fn meta_failed(&self) -> u64 {
        self.meta_failed
    }

    /// Number of value sends that succeeded.
    pub fn values_sent(&self) -> u64 {
        self.values_sent
    }

    /// Number of value sends that failed.
    pub fn values_failed(&self) -> u64 {
        self.values_failed
    }

    /// Returns `true` if any send failed.
    pub fn had_failures(&self) -> bool {
        self.meta_failed > 0 || self.values_failed > 0
    }

    pub(crate) fn increment_metrics_flushed(&mut self) {
        self.metrics_flushed += 1;
    }

    pub(crate) fn track_meta_send(&mut self, succeeded: bool) {
        if succeeded {
            self.meta_sent += 1;
        } else {
            self.meta_failed += 1;
        }
    }

    pub(crate) fn track_value_send(&mut self, succeeded: bool) {
        if succeeded {
            self.values_sent += 1;
        } else {
            self.values_failed += 1;
        }
    }
}
