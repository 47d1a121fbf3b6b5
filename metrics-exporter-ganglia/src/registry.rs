use std::{
    sync::{
        atomic::{
            AtomicBool,
            Ordering::{AcqRel, Acquire, Release},
        },
        Arc,
    },
    thread,
    time::Duration,
};

#[cfg(test)]
use std::sync::atomic::AtomicUsize;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::{
    forwarder::Forwarder,
    metric::{ExportSettings, Metric, RegisteredMetric},
    naming::NamingPolicy,
    sink::Sink,
    telemetry::FlushTelemetry,
    writer::MetricValueFormatter,
};

/// Registry state, shared between the registry handles and the export thread.
pub(crate) struct State {
    naming: NamingPolicy,
    settings: ExportSettings,
    sink: Arc<dyn Sink>,
    metrics: Mutex<Vec<Arc<RegisteredMetric>>>,
    background_export: bool,
    forwarder_started: AtomicBool,
    #[cfg(test)]
    forwarder_launches: AtomicUsize,
}

impl State {
    pub fn new(
        naming: NamingPolicy,
        settings: ExportSettings,
        sink: Arc<dyn Sink>,
        background_export: bool,
    ) -> Self {
        State {
            naming,
            settings,
            sink,
            metrics: Mutex::new(Vec::new()),
            background_export,
            forwarder_started: AtomicBool::new(false),
            #[cfg(test)]
            forwarder_launches: AtomicUsize::new(0),
        }
    }

    /// Returns a copy of the registered metrics.
    ///
    /// The lock is only held for the copy, never while talking to the sink.
    fn registered(&self) -> Vec<Arc<RegisteredMetric>> {
        self.metrics.lock().clone()
    }

    /// Pushes the metadata and current value of every registered metric to the sink.
    pub fn flush(&self) -> FlushTelemetry {
        let metrics = self.registered();

        let mut telemetry = FlushTelemetry::default();
        let mut formatter = MetricValueFormatter::new();
        for metric in &metrics {
            metric.write_meta(self.sink.as_ref(), &mut telemetry);
            metric.write_value(self.sink.as_ref(), &mut formatter, &mut telemetry);
            telemetry.increment_metrics_flushed();
        }

        telemetry
    }
}

/// Periodically exports registered metrics to a sink.
///
/// Registering the first metric launches a background thread which, every tick interval, pushes the metadata and the
/// current value of every registered metric to the sink. The thread runs for the rest of the life of the process.
///
/// `Registry` is cheap to clone, and all clones share the same metrics and the same export thread.
#[derive(Clone)]
pub struct Registry {
    state: Arc<State>,
}

impl Registry {
    pub(crate) fn from_state(state: State) -> Self {
        Registry { state: Arc::new(state) }
    }

    /// Registers a metric for export.
    ///
    /// The metric is given its external name, built from the registry prefix and the metric name, and its metadata is
    /// captured as it is at this point. Registering a metric more than once exports it more than once.
    ///
    /// The first registration launches the export thread, unless background export was disabled.
    pub fn register<M>(&self, metric: M)
    where
        M: Into<Metric>,
    {
        let registered =
            RegisteredMetric::new(metric.into(), &self.state.naming, self.state.settings);
        debug!(metric_name = registered.name(), "Registered metric.");

        self.state.metrics.lock().push(Arc::new(registered));

        self.ensure_forwarder();
    }

    fn ensure_forwarder(&self) {
        if !self.state.background_export {
            return;
        }

        if self.state.forwarder_started.compare_exchange(false, true, AcqRel, Acquire).is_err() {
            return;
        }

        let forwarder = Forwarder::new(Arc::clone(&self.state), self.state.settings.tick_interval);
        let result = thread::Builder::new()
            .name("metrics-exporter-ganglia-forwarder".to_string())
            .spawn(move || forwarder.run());

        match result {
            Ok(_) => {
                #[cfg(test)]
                self.state.forwarder_launches.fetch_add(1, AcqRel);
                debug!(tick_interval = ?self.state.settings.tick_interval, "Launched export thread.");
            }
            Err(e) => {
                // Release the guard so that the next registration tries again.
                error!(error = %e, "Failed to spawn export thread.");
                self.state.forwarder_started.store(false, Release);
            }
        }
    }

    /// Runs a single export cycle on the current thread.
    ///
    /// This is exactly what the export thread does on every tick. It is mostly useful when background export has been
    /// disabled, or in tests.
    pub fn flush(&self) -> FlushTelemetry {
        self.state.flush()
    }

    /// Builds a name from the given parts, using the registry prefix and separator.
    pub fn make_name(&self, parts: &[&str]) -> String {
        self.state.naming.make_name(parts)
    }

    /// Returns the prefix applied to every metric name.
    pub fn prefix(&self) -> &str {
        self.state.naming.prefix()
    }

    /// Returns the separator used to join name parts.
    pub fn name_separator(&self) -> &str {
        self.state.naming.separator()
    }

    /// Returns the time between export cycles.
    pub fn tick_interval(&self) -> Duration {
        self.state.settings.tick_interval
    }

    /// Returns the number of registered metrics.
    pub fn len(&self) -> usize {
        self.state.metrics.lock().len()
    }

    /// Returns `true` if no metrics have been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the export thread has been launched.
    pub fn is_exporting(&self) -> bool {
        self.state.forwarder_started.load(Acquire)
    }

    #[cfg(test)]
    fn forwarder_launches(&self) -> usize {
        self.state.forwarder_launches.load(Acquire)
    }

    #[cfg(test)]
    fn registered_names(&self) -> Vec<String> {
        self.state.registered().iter().map(|m| m.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{Arc, Barrier},
        thread,
        time::Duration,
    };

    use parking_lot::Mutex;

    use super::Registry;
    use crate::{
        debugging::DebuggingSink, Counter, GangliaBuilder, Histogram, MetricDescriptor, Sink,
        SinkError, ValueType,
    };

    /// A sink that calls back into its own registry while values are being pushed.
    #[derive(Default)]
    struct ReentrantSink {
        registry: Mutex<Option<Registry>>,
        lengths: Mutex<Vec<usize>>,
    }

    impl Sink for ReentrantSink {
        fn send_meta(&self, _descriptor: &MetricDescriptor) -> Result<(), SinkError> {
            Ok(())
        }

        fn send_value(&self, name: &str, _value: &str, _value_type: ValueType) -> Result<(), SinkError> {
            let registry = self.registry.lock().clone();
            if let Some(registry) = registry {
                self.lengths.lock().push(registry.len());
                if name == "app.first" {
                    registry.register(Counter::new("late"));
                }
            }
            Ok(())
        }
    }

    #[test]
    fn concurrent_registration_launches_one_forwarder() {
        const THREADS: usize = 16;

        let registry = GangliaBuilder::default()
            .with_prefix("gmrtest")
            .with_tick_interval(Duration::from_secs(3600))
            .build(DebuggingSink::new())
            .expect("registry should build");

        let barrier = Arc::new(Barrier::new(THREADS));
        let handles = (0..THREADS)
            .map(|i| {
                let registry = registry.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.register(Counter::new(format!("counter_{i}")));
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().expect("registering thread panicked");
        }

        assert!(registry.is_exporting());
        assert_eq!(registry.forwarder_launches(), 1);
        assert_eq!(registry.len(), THREADS);

        let names = registry.registered_names();
        let unique = names.iter().cloned().collect::<HashSet<_>>();
        assert_eq!(unique.len(), THREADS);
        for i in 0..THREADS {
            assert!(unique.contains(&format!("gmrtest.counter_{i}")));
        }
    }

    #[test]
    fn disabled_background_export_never_launches() {
        let registry = GangliaBuilder::default()
            .with_background_export(false)
            .build(DebuggingSink::new())
            .expect("registry should build");

        registry.register(Histogram::new("page_size"));
        registry.register(Counter::new("requests"));

        assert!(!registry.is_exporting());
        assert_eq!(registry.forwarder_launches(), 0);
        assert_eq!(registry.registered_names(), ["page_size", "requests"]);
    }

    #[test]
    fn registration_order_is_export_order() {
        let sink = DebuggingSink::new();
        let registry = GangliaBuilder::default()
            .with_prefix("app")
            .with_background_export(false)
            .build(sink.clone())
            .expect("registry should build");

        registry.register(Counter::new("zeta"));
        registry.register(Counter::new("alpha"));
        registry.register(Counter::new("mid"));

        let telemetry = registry.flush();
        assert_eq!(telemetry.metrics_flushed(), 3);

        let names = sink.values().into_iter().map(|v| v.name).collect::<Vec<_>>();
        assert_eq!(names, ["app.zeta", "app.alpha", "app.mid"]);
    }

    #[test]
    fn make_name_uses_registry_policy() {
        let registry = GangliaBuilder::default()
            .with_prefix("gmrtest")
            .with_name_separator("/")
            .with_background_export(false)
            .build(DebuggingSink::new())
            .expect("registry should build");

        assert_eq!(registry.make_name(&["", "requests"]), "gmrtest/requests");
        assert_eq!(registry.prefix(), "gmrtest");
        assert_eq!(registry.name_separator(), "/");
    }

    #[test]
    fn sink_can_use_registry_during_flush() {
        let sink = Arc::new(ReentrantSink::default());
        let registry = GangliaBuilder::default()
            .with_prefix("app")
            .with_background_export(false)
            .build(Arc::clone(&sink))
            .expect("registry should build");
        *sink.registry.lock() = Some(registry.clone());

        registry.register(Counter::new("first"));
        registry.register(Counter::new("second"));

        // The cycle works from the metrics registered when it started.
        let telemetry = registry.flush();
        assert_eq!(telemetry.metrics_flushed(), 2);
        assert_eq!(*sink.lengths.lock(), [2, 3]);
        assert_eq!(registry.len(), 3);

        let telemetry = registry.flush();
        assert_eq!(telemetry.metrics_flushed(), 3);

        // Break the registry/sink cycle.
        sink.registry.lock().take();
    }
}
