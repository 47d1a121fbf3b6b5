use std::{
    sync::atomic::{
        AtomicI64, AtomicU64,
        Ordering::{AcqRel, Acquire},
    },
    time::Duration,
};

use parking_lot::Mutex;
use quanta::{Clock, Instant};

/// A signed counter that can move in either direction.
pub(crate) struct AtomicCounter {
    current: AtomicI64,
}

impl AtomicCounter {
    /// Creates a new `AtomicCounter`.
    pub fn new() -> Self {
        Self { current: AtomicI64::new(0) }
    }

    pub fn increment(&self, value: i64) {
        self.current.fetch_add(value, AcqRel);
    }

    pub fn decrement(&self, value: i64) {
        self.current.fetch_sub(value, AcqRel);
    }

    pub fn count(&self) -> i64 {
        self.current.load(Acquire)
    }
}

/// Tracks the number of events and their mean rate since creation.
pub(crate) struct AtomicMeter {
    count: AtomicU64,
    clock: Clock,
    start: Instant,
}

impl AtomicMeter {
    /// Creates a new `AtomicMeter` measuring elapsed time with the given clock.
    pub fn new(clock: Clock) -> Self {
        let start = clock.now();
        Self { count: AtomicU64::new(0), clock, start }
    }

    pub fn mark(&self, events: u64) {
        self.count.fetch_add(events, AcqRel);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Acquire)
    }

    /// Returns the mean number of events per second since the meter was created.
    ///
    /// Returns `0.0` if no time has elapsed yet.
    pub fn rate_mean(&self) -> f64 {
        let count = self.count();
        let elapsed = self.clock.now().duration_since(self.start).as_secs_f64();
        if elapsed > 0.0 {
            count as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// A consistent point-in-time view of a histogram.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistogramSnapshot {
    count: u64,
    // Wide enough that no sequence of `i64` updates can overflow it.
    sum: i128,
    max: Option<i64>,
}

impl HistogramSnapshot {
    /// Number of values observed.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of all values observed, clamped to the bounds of `i64`.
    pub fn sum(&self) -> i64 {
        i64::try_from(self.sum).unwrap_or(if self.sum < 0 { i64::MIN } else { i64::MAX })
    }

    /// Largest value observed, or `None` if no values have been observed.
    pub fn max(&self) -> Option<i64> {
        self.max
    }

    /// Arithmetic mean of all values observed, or `None` if no values have been observed.
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum as f64 / self.count as f64)
        }
    }

    /// Returns `true` if no values have been observed.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn update(&mut self, value: i64) {
        self.count += 1;
        self.sum += i128::from(value);
        self.max = Some(self.max.map_or(value, |max| max.max(value)));
    }
}

/// Streaming count/sum/max over every value ever observed.
///
/// The three fields change together under a single lock, so readers can never see a count from one update paired with
/// a sum from another.
pub(crate) struct HistogramStorage {
    inner: Mutex<HistogramSnapshot>,
}

impl HistogramStorage {
    /// Creates a new, empty `HistogramStorage`.
    pub fn new() -> Self {
        Self { inner: Mutex::new(HistogramSnapshot::default()) }
    }

    pub fn update(&self, value: i64) {
        self.inner.lock().update(value);
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        *self.inner.lock()
    }
}

/// Durations, in nanoseconds, plus the rate at which they were recorded.
pub(crate) struct TimerStorage {
    durations: HistogramStorage,
    meter: AtomicMeter,
}

impl TimerStorage {
    /// Creates a new `TimerStorage` measuring elapsed time with the given clock.
    pub fn new(clock: Clock) -> Self {
        Self { durations: HistogramStorage::new(), meter: AtomicMeter::new(clock) }
    }

    pub fn record(&self, duration: Duration) {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.durations.update(nanos);
        self.meter.mark(1);
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        self.durations.snapshot()
    }

    pub fn rate_mean(&self) -> f64 {
        self.meter.rate_mean()
    }

    pub fn clock(&self) -> &Clock {
        &self.meter.clock
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use quanta::Clock;

    use super::{AtomicCounter, AtomicMeter, HistogramStorage, TimerStorage};

    #[test]
    fn counter_moves_both_ways() {
        let counter = AtomicCounter::new();
        assert_eq!(counter.count(), 0);

        counter.increment(5);
        counter.decrement(7);
        assert_eq!(counter.count(), -2);
    }

    #[test]
    fn meter_rate_follows_clock() {
        let (clock, mock) = Clock::mock();
        let meter = AtomicMeter::new(clock);

        // No time has passed, so there is no rate to speak of.
        meter.mark(10);
        assert_eq!(meter.rate_mean(), 0.0);

        mock.increment(Duration::from_secs(2));
        assert_eq!(meter.count(), 10);
        assert_relative_eq!(meter.rate_mean(), 5.0);

        meter.mark(30);
        mock.increment(Duration::from_secs(2));
        assert_relative_eq!(meter.rate_mean(), 10.0);
    }

    #[test]
    fn histogram_empty_has_no_data() {
        let histogram = HistogramStorage::new();
        let snapshot = histogram.snapshot();

        assert!(snapshot.is_empty());
        assert_eq!(snapshot.count(), 0);
        assert_eq!(snapshot.max(), None);
        assert_eq!(snapshot.mean(), None);
    }

    #[test]
    fn histogram_simple() {
        let histogram = HistogramStorage::new();

        histogram.update(43);
        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count(), 1);
        assert_eq!(snapshot.max(), Some(43));

        histogram.update(42);
        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count(), 2);
        assert_eq!(snapshot.max(), Some(43));
        assert_eq!(snapshot.mean(), Some(42.5));
    }

    #[test]
    fn histogram_negative_values() {
        let histogram = HistogramStorage::new();
        histogram.update(-10);
        histogram.update(-20);

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.max(), Some(-10));
        assert_eq!(snapshot.mean(), Some(-15.0));
    }

    #[test]
    fn histogram_sum_clamps_when_reported() {
        let histogram = HistogramStorage::new();
        histogram.update(i64::MAX);
        histogram.update(i64::MAX);

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count(), 2);
        assert_eq!(snapshot.sum(), i64::MAX);
        assert_eq!(snapshot.mean(), Some(i64::MAX as f64));

        histogram.update(i64::MIN);
        histogram.update(i64::MIN);
        histogram.update(i64::MIN);
        assert_eq!(histogram.snapshot().sum(), i64::MIN);
    }

    #[test]
    fn histogram_mean_survives_intermediate_overflow() {
        let histogram = HistogramStorage::new();
        histogram.update(i64::MAX);
        histogram.update(1);
        histogram.update(-i64::MAX);

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count(), 3);
        assert_eq!(snapshot.sum(), 1);
        assert_eq!(snapshot.max(), Some(i64::MAX));
        assert_relative_eq!(snapshot.mean().expect("histogram should not be empty"), 1.0 / 3.0);
    }

    #[test]
    fn histogram_concurrent_updates_are_not_lost() {
        let histogram = Arc::new(HistogramStorage::new());

        let handles = (0..8)
            .map(|t| {
                let histogram = Arc::clone(&histogram);
                thread::spawn(move || {
                    for i in 0..1000 {
                        histogram.update(t * 1000 + i);
                    }
                })
            })
            .collect::<Vec<_>>();

        // Reads while writers are active must always be internally consistent.
        for _ in 0..100 {
            let snapshot = histogram.snapshot();
            if let Some(max) = snapshot.max() {
                assert!(snapshot.count() > 0);
                assert!(max < 8000);
            }
        }

        for handle in handles {
            handle.join().expect("writer thread panicked");
        }

        let snapshot = histogram.snapshot();
        assert_eq!(snapshot.count(), 8000);
        assert_eq!(snapshot.max(), Some(7999));
        assert_eq!(snapshot.sum(), (0..8000).sum::<i64>());
    }

    #[test]
    fn timer_records_nanoseconds() {
        let (clock, mock) = Clock::mock();
        let timer = TimerStorage::new(clock);

        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(30));
        mock.increment(Duration::from_secs(1));

        let snapshot = timer.snapshot();
        assert_eq!(snapshot.count(), 2);
        assert_eq!(snapshot.max(), Some(30_000_000));
        assert_eq!(snapshot.mean(), Some(20_000_000.0));
        assert_relative_eq!(timer.rate_mean(), 2.0);
    }

    proptest! {
        #[test]
        fn histogram_count_max_mean(values in proptest::collection::vec(-1_000_000i64..1_000_000, 1..200)) {
            let histogram = HistogramStorage::new();
            for value in &values {
                histogram.update(*value);
            }

            let snapshot = histogram.snapshot();
            let expected_sum = values.iter().sum::<i64>();

            prop_assert_eq!(snapshot.count(), values.len() as u64);
            prop_assert_eq!(snapshot.max(), values.iter().copied().max());
            prop_assert_eq!(snapshot.sum(), expected_sum);

            let mean = snapshot.mean().expect("histogram should not be empty");
            let expected_mean = expected_sum as f64 / values.len() as f64;
            prop_assert!((mean - expected_mean).abs() <= f64::EPSILON * expected_mean.abs().max(1.0));
        }
    }
}
