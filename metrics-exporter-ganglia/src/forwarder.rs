use std::{
    sync::Arc,
    thread::sleep,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::registry::State;

/// Drives export cycles on a fixed interval.
///
/// There is no way to stop a running forwarder: it exports until the process exits. Each cycle is a single call to
/// `tick`, so a stop signal would only need to be checked between ticks.
pub(crate) struct Forwarder {
    state: Arc<State>,
    tick_interval: Duration,
}

impl Forwarder {
    /// Creates a new `Forwarder`.
    pub fn new(state: Arc<State>, tick_interval: Duration) -> Self {
        Forwarder { state, tick_interval }
    }

    fn tick(&self) {
        let telemetry = self.state.flush();
        if telemetry.had_failures() {
            warn!(
                metrics_flushed = telemetry.metrics_flushed(),
                meta_failed = telemetry.meta_failed(),
                values_failed = telemetry.values_failed(),
                "Some metrics failed to export."
            );
        } else {
            debug!(
                metrics_flushed = telemetry.metrics_flushed(),
                values_sent = telemetry.values_sent(),
                "Finished export cycle."
            );
        }
    }

    /// Runs the forwarder, exporting immediately and then once per tick interval.
    pub fn run(self) {
        loop {
            let next_flush = Instant::now().checked_add(self.tick_interval);

            self.tick();

            // If the cycle took longer than the tick interval, start the next one right away. An interval too large to
            // be represented as a deadline is slept in full.
            let sleep_duration = match next_flush {
                Some(next_flush) => next_flush.checked_duration_since(Instant::now()),
                None => Some(self.tick_interval),
            };
            if let Some(sleep_duration) = sleep_duration {
                sleep(sleep_duration);
            }
        }
    }
}
