use std::time::Duration;

use tracing::error;

use crate::{
    handles::{Counter, Histogram, Meter, MetricInfo, Timer},
    naming::NamingPolicy,
    sink::{MetricDescriptor, Sink, Slope, ValueType},
    telemetry::FlushTelemetry,
    writer::{MetricValue, MetricValueFormatter},
};

const COUNT_UNITS: &str = "count";
const DEFAULT_VALUE_UNITS: &str = "value";

/// A metric that can be registered for export.
///
/// This is the closed set of exportable metrics: anything passed to [`Registry::register`][crate::Registry::register]
/// must convert into one of these variants.
#[derive(Clone)]
pub enum Metric {
    /// A counter.
    Counter(Counter),
    /// A meter.
    Meter(Meter),
    /// A timer.
    Timer(Timer),
    /// A histogram.
    Histogram(Histogram),
}

impl Metric {
    /// Returns the export metadata of the underlying metric.
    pub fn info(&self) -> &MetricInfo {
        match self {
            Metric::Counter(c) => c.info(),
            Metric::Meter(m) => m.info(),
            Metric::Timer(t) => t.info(),
            Metric::Histogram(h) => h.info(),
        }
    }

    fn value_units(&self) -> String {
        let units = self.info().units();
        if units.is_empty() {
            DEFAULT_VALUE_UNITS.to_string()
        } else {
            units.to_string()
        }
    }

    /// Returns the series this metric is exported as, in export order.
    fn series(&self) -> Vec<Series> {
        match self {
            Metric::Counter(c) => {
                vec![Series::single(c.info().units().to_string(), ValueType::Int32)]
            }
            Metric::Meter(m) => {
                vec![Series::single(m.info().units().to_string(), ValueType::Double)]
            }
            Metric::Timer(t) => {
                let units = t.resolved_units();
                vec![
                    Series::count(),
                    Series::sub("mean", units.clone(), ValueType::Double),
                    Series::sub("max", units, ValueType::Double),
                ]
            }
            Metric::Histogram(_) => {
                let units = self.value_units();
                vec![
                    Series::count(),
                    Series::sub("mean", units.clone(), ValueType::Double),
                    Series::sub("max", units, ValueType::Int32),
                ]
            }
        }
    }

    /// Reads the current values, one per series, in the same order as [`Metric::series`].
    ///
    /// Series with no data yet, such as the mean of an empty histogram, are `None`.
    fn current_values(&self) -> Vec<Option<MetricValue>> {
        match self {
            Metric::Counter(c) => vec![Some(MetricValue::Integer(c.count()))],
            Metric::Meter(m) => vec![Some(MetricValue::FloatingPoint(m.rate_mean()))],
            Metric::Timer(t) => {
                let snapshot = t.snapshot();
                let resolution = t.resolution().as_nanos() as f64;
                vec![
                    Some(MetricValue::Unsigned(snapshot.count())),
                    snapshot.mean().map(|mean| MetricValue::FloatingPoint(mean / resolution)),
                    snapshot.max().map(|max| MetricValue::FloatingPoint(max as f64 / resolution)),
                ]
            }
            Metric::Histogram(h) => {
                let snapshot = h.snapshot();
                vec![
                    Some(MetricValue::Unsigned(snapshot.count())),
                    snapshot.mean().map(MetricValue::FloatingPoint),
                    snapshot.max().map(MetricValue::Integer),
                ]
            }
        }
    }
}

macro_rules! impl_into_metric {
    ($ty:ident) => {
        impl From<$ty> for Metric {
            fn from(metric: $ty) -> Self {
                Metric::$ty(metric)
            }
        }

        impl From<&$ty> for Metric {
            fn from(metric: &$ty) -> Self {
                Metric::$ty(metric.clone())
            }
        }
    };
}

impl_into_metric!(Counter);
impl_into_metric!(Meter);
impl_into_metric!(Timer);
impl_into_metric!(Histogram);

struct Series {
    suffix: &'static str,
    units: String,
    value_type: ValueType,
}

impl Series {
    fn single(units: String, value_type: ValueType) -> Self {
        Series { suffix: "", units, value_type }
    }

    fn count() -> Self {
        Series::sub("count", COUNT_UNITS.to_string(), ValueType::Uint32)
    }

    fn sub(suffix: &'static str, units: String, value_type: ValueType) -> Self {
        Series { suffix, units, value_type }
    }
}

/// Settings applied to the metadata of every registered metric.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ExportSettings {
    pub tick_interval: Duration,
    pub lifetime: Duration,
}

/// A metric that has been given its external names.
///
/// Descriptors are computed once, at registration, so every tick sends identical metadata.
#[derive(Clone)]
pub(crate) struct RegisteredMetric {
    name: String,
    metric: Metric,
    descriptors: Vec<MetricDescriptor>,
}

impl RegisteredMetric {
    pub fn new(metric: Metric, naming: &NamingPolicy, settings: ExportSettings) -> Self {
        let info = metric.info();
        let name = naming.make_name(&[info.name()]);
        let descriptors = metric
            .series()
            .into_iter()
            .map(|series| {
                let title = if info.title().is_empty() || series.suffix.is_empty() {
                    info.title().to_string()
                } else {
                    format!("{} ({})", info.title(), series.suffix)
                };

                MetricDescriptor {
                    name: naming.make_name(&[info.name(), series.suffix]),
                    title,
                    description: info.description().to_string(),
                    units: series.units,
                    groups: info.groups().to_vec(),
                    value_type: series.value_type,
                    slope: Slope::Both,
                    tick_interval: settings.tick_interval,
                    lifetime: settings.lifetime,
                }
            })
            .collect();

        RegisteredMetric { name, metric, descriptors }
    }

    /// External name of the metric, without any series suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    #[cfg(test)]
    pub fn descriptors(&self) -> &[MetricDescriptor] {
        &self.descriptors
    }

    /// Sends the metadata of every series.
    pub fn write_meta<S>(&self, sink: &S, telemetry: &mut FlushTelemetry)
    where
        S: Sink + ?Sized,
    {
        for descriptor in &self.descriptors {
            let result = sink.send_meta(descriptor);
            if let Err(e) = &result {
                error!(metric_name = %descriptor.name, error = %e, "Failed to send metric metadata.");
            }
            telemetry.track_meta_send(result.is_ok());
        }
    }

    /// Sends the current value of every series that has data.
    ///
    /// Integer values outside the range of their declared value type are clamped to it.
    pub fn write_value<S>(
        &self,
        sink: &S,
        formatter: &mut MetricValueFormatter,
        telemetry: &mut FlushTelemetry,
    ) where
        S: Sink + ?Sized,
    {
        let values = self.metric.current_values();
        for (descriptor, value) in self.descriptors.iter().zip(values) {
            let Some(value) = value else { continue };

            let value = value.clamp_to(descriptor.value_type);
            let result =
                sink.send_value(&descriptor.name, formatter.format(value), descriptor.value_type);
            if let Err(e) = &result {
                error!(metric_name = %descriptor.name, error = %e, "Failed to send metric value.");
            }
            telemetry.track_value_send(result.is_ok());
        }
    }
}
