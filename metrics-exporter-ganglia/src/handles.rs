use std::{sync::Arc, time::Duration};

use quanta::{Clock, Instant};

use crate::storage::{AtomicCounter, AtomicMeter, HistogramSnapshot, HistogramStorage, TimerStorage};

const DEFAULT_TIMER_RESOLUTION: Duration = Duration::from_millis(1);

/// Export metadata of a metric.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricInfo {
    name: String,
    title: String,
    description: String,
    units: String,
    groups: Vec<String>,
}

impl MetricInfo {
    fn new(name: String) -> Self {
        MetricInfo { name, ..MetricInfo::default() }
    }

    /// Name of the metric, before any registry prefix is applied.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Longer description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Unit label.
    pub fn units(&self) -> &str {
        &self.units
    }

    /// Groups the metric belongs to.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }
}

// Shared metadata builders. A registered metric captures its metadata at registration, so changing the metadata of a
// clone afterwards only affects that clone.
macro_rules! metadata_builders {
    ($ty:ident) => {
        impl $ty {
            /// Sets the human-readable title.
            #[must_use]
            pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
                Arc::make_mut(&mut self.info).title = title.into();
                self
            }

            /// Sets the longer description.
            #[must_use]
            pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
                Arc::make_mut(&mut self.info).description = description.into();
                self
            }

            /// Sets the unit label.
            #[must_use]
            pub fn with_units<S: Into<String>>(mut self, units: S) -> Self {
                Arc::make_mut(&mut self.info).units = units.into();
                self
            }

            /// Sets the groups the metric belongs to.
            #[must_use]
            pub fn with_groups<I, S>(mut self, groups: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                Arc::make_mut(&mut self.info).groups = groups.into_iter().map(Into::into).collect();
                self
            }

            /// Returns the export metadata.
            pub fn info(&self) -> &MetricInfo {
                &self.info
            }
        }
    };
}

/// A counter that can be incremented and decremented.
///
/// Exported as its current count.
#[derive(Clone)]
pub struct Counter {
    info: Arc<MetricInfo>,
    storage: Arc<AtomicCounter>,
}

impl Counter {
    /// Creates a new `Counter` with the given name.
    pub fn new<N: Into<String>>(name: N) -> Self {
        Counter { info: Arc::new(MetricInfo::new(name.into())), storage: Arc::new(AtomicCounter::new()) }
    }

    /// Increments the counter.
    pub fn increment(&self, value: i64) {
        self.storage.increment(value);
    }

    /// Decrements the counter.
    pub fn decrement(&self, value: i64) {
        self.storage.decrement(value);
    }

    /// Returns the current count.
    pub fn count(&self) -> i64 {
        self.storage.count()
    }
}

metadata_builders!(Counter);

/// A meter that tracks the rate of events.
///
/// Exported as the mean number of events per second since creation.
#[derive(Clone)]
pub struct Meter {
    info: Arc<MetricInfo>,
    storage: Arc<AtomicMeter>,
}

impl Meter {
    /// Creates a new `Meter` with the given name.
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self::with_clock(name, Clock::new())
    }

    /// Creates a new `Meter` with the given name, measuring time with the given clock.
    pub fn with_clock<N: Into<String>>(name: N, clock: Clock) -> Self {
        Meter { info: Arc::new(MetricInfo::new(name.into())), storage: Arc::new(AtomicMeter::new(clock)) }
    }

    /// Marks the occurrence of `events` events.
    pub fn mark(&self, events: u64) {
        self.storage.mark(events);
    }

    /// Returns the total number of events marked.
    pub fn count(&self) -> u64 {
        self.storage.count()
    }

    /// Returns the mean number of events per second since creation.
    pub fn rate_mean(&self) -> f64 {
        self.storage.rate_mean()
    }
}

metadata_builders!(Meter);

/// A timer that tracks the distribution of durations.
///
/// Exported as the count, mean, and maximum of all recorded durations, expressed in units of the timer's resolution.
#[derive(Clone)]
pub struct Timer {
    info: Arc<MetricInfo>,
    resolution: Duration,
    storage: Arc<TimerStorage>,
}

impl Timer {
    /// Creates a new `Timer` with the given name.
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self::with_clock(name, Clock::new())
    }

    /// Creates a new `Timer` with the given name, measuring time with the given clock.
    pub fn with_clock<N: Into<String>>(name: N, clock: Clock) -> Self {
        Timer {
            info: Arc::new(MetricInfo::new(name.into())),
            resolution: DEFAULT_TIMER_RESOLUTION,
            storage: Arc::new(TimerStorage::new(clock)),
        }
    }

    /// Sets the resolution durations are exported in.
    ///
    /// A zero resolution is ignored. Defaults to 1 millisecond.
    #[must_use]
    pub fn with_resolution(mut self, resolution: Duration) -> Self {
        if !resolution.is_zero() {
            self.resolution = resolution;
        }
        self
    }

    /// Returns the resolution durations are exported in.
    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Records a duration.
    pub fn record(&self, duration: Duration) {
        self.storage.record(duration);
    }

    /// Runs `f`, recording how long it took.
    pub fn time<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _guard = self.start();
        f()
    }

    /// Starts timing, recording the elapsed time when the returned guard is stopped or dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard { timer: self, start: Some(self.storage.clock().now()) }
    }

    /// Returns the number of durations recorded.
    pub fn count(&self) -> u64 {
        self.storage.snapshot().count()
    }

    /// Returns the mean recorded duration, or `None` if nothing has been recorded.
    pub fn mean(&self) -> Option<Duration> {
        self.storage.snapshot().mean().map(|nanos| Duration::from_nanos(nanos.round() as u64))
    }

    /// Returns the longest recorded duration, or `None` if nothing has been recorded.
    pub fn max(&self) -> Option<Duration> {
        self.storage.snapshot().max().map(|nanos| Duration::from_nanos(nanos as u64))
    }

    /// Returns the mean number of durations recorded per second since creation.
    pub fn rate_mean(&self) -> f64 {
        self.storage.rate_mean()
    }

    /// Returns a consistent view of the recorded durations, in nanoseconds.
    pub fn snapshot(&self) -> HistogramSnapshot {
        self.storage.snapshot()
    }

    /// Returns the unit label to export with: the configured units, or one derived from the resolution.
    pub(crate) fn resolved_units(&self) -> String {
        if !self.info.units.is_empty() {
            return self.info.units.clone();
        }

        match self.resolution {
            r if r == Duration::from_nanos(1) => "nanoseconds".to_string(),
            r if r == Duration::from_micros(1) => "microseconds".to_string(),
            r if r == Duration::from_millis(1) => "milliseconds".to_string(),
            r if r == Duration::from_secs(1) => "seconds".to_string(),
            r => format!("{}ns", r.as_nanos()),
        }
    }
}

metadata_builders!(Timer);

/// Records the elapsed time into a [`Timer`] when stopped or dropped.
pub struct TimerGuard<'a> {
    timer: &'a Timer,
    start: Option<Instant>,
}

impl TimerGuard<'_> {
    /// Stops timing and records the elapsed time.
    pub fn stop(mut self) {
        self.record();
    }

    fn record(&mut self) {
        if let Some(start) = self.start.take() {
            let elapsed = self.timer.storage.clock().now().duration_since(start);
            self.timer.record(elapsed);
        }
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.record();
    }
}

/// A histogram that tracks the count, maximum, and mean of observed values.
///
/// Every value ever observed contributes: nothing is sampled, decayed, or windowed.
#[derive(Clone)]
pub struct Histogram {
    info: Arc<MetricInfo>,
    storage: Arc<HistogramStorage>,
}

impl Histogram {
    /// Creates a new `Histogram` with the given name.
    pub fn new<N: Into<String>>(name: N) -> Self {
        Histogram { info: Arc::new(MetricInfo::new(name.into())), storage: Arc::new(HistogramStorage::new()) }
    }

    /// Observes a value.
    pub fn update(&self, value: i64) {
        self.storage.update(value);
    }

    /// Returns the number of values observed.
    pub fn count(&self) -> u64 {
        self.storage.snapshot().count()
    }

    /// Returns the largest value observed.
    ///
    /// An empty histogram has no data, and returns `None`.
    pub fn max(&self) -> Option<i64> {
        self.storage.snapshot().max()
    }

    /// Returns the arithmetic mean of all values observed.
    ///
    /// An empty histogram has no data, and returns `None`.
    pub fn mean(&self) -> Option<f64> {
        self.storage.snapshot().mean()
    }

    /// Returns a consistent view of the count, sum, and maximum.
    pub fn snapshot(&self) -> HistogramSnapshot {
        self.storage.snapshot()
    }
}

metadata_builders!(Histogram);

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use quanta::Clock;

    use super::{Counter, Histogram, Timer};

    #[test]
    fn metadata_builders() {
        let counter = Counter::new("concurrent_requests")
            .with_title("Number of concurrent requests")
            .with_units("requests")
            .with_groups(["gmrtest"]);

        let info = counter.info();
        assert_eq!(info.name(), "concurrent_requests");
        assert_eq!(info.title(), "Number of concurrent requests");
        assert_eq!(info.units(), "requests");
        assert_eq!(info.groups(), ["gmrtest".to_string()]);
        assert_eq!(info.description(), "");
    }

    #[test]
    fn clones_share_values_but_not_later_metadata() {
        let histogram = Histogram::new("page_size").with_units("bytes");
        let other = histogram.clone().with_units("kilobytes");

        histogram.update(10);
        assert_eq!(other.count(), 1);
        assert_eq!(histogram.info().units(), "bytes");
        assert_eq!(other.info().units(), "kilobytes");
    }

    #[test]
    fn timer_guard_records_elapsed_time() {
        let (clock, mock) = Clock::mock();
        let timer = Timer::with_clock("response_time", clock);

        let guard = timer.start();
        mock.increment(Duration::from_millis(25));
        guard.stop();

        {
            let _guard = timer.start();
            mock.increment(Duration::from_millis(75));
        }

        let value = timer.time(|| {
            mock.increment(Duration::from_millis(50));
            42
        });
        assert_eq!(value, 42);

        assert_eq!(timer.count(), 3);
        assert_eq!(timer.max(), Some(Duration::from_millis(75)));
        assert_eq!(timer.mean(), Some(Duration::from_millis(50)));
    }

    #[test]
    fn timer_units_follow_resolution() {
        let timer = Timer::new("latency");
        assert_eq!(timer.resolved_units(), "milliseconds");

        let timer = Timer::new("latency").with_resolution(Duration::from_micros(1));
        assert_eq!(timer.resolved_units(), "microseconds");

        let timer = Timer::new("latency").with_resolution(Duration::from_millis(10));
        assert_eq!(timer.resolved_units(), "10000000ns");

        let timer = Timer::new("latency").with_units("ms");
        assert_eq!(timer.resolved_units(), "ms");

        let timer = Timer::new("latency").with_resolution(Duration::ZERO);
        assert_eq!(timer.resolution(), Duration::from_millis(1));
    }
}
