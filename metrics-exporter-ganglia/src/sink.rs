use std::{io, sync::Arc, time::Duration};

use thiserror::Error;
use tracing::Level;

/// Errors that could occur while pushing metadata or values to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The underlying transport failed.
    #[error("failed to transmit: {0}")]
    Io(#[from] io::Error),

    /// The sink could not encode the metadata or value into its wire format.
    #[error("failed to encode payload: {reason}")]
    Encode {
        /// Details about the encoding failure.
        reason: String,
    },

    /// The sink refused the metadata or value.
    #[error("rejected by sink: {reason}")]
    Rejected {
        /// Details about why the sink refused the payload.
        reason: String,
    },
}

/// Value type of an exported series.
///
/// Mirrors the type set understood by `gmond`. Values are always transmitted in their textual form, and the type tells
/// the collector how to interpret them.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueType {
    /// Free-form string.
    String,
    /// Signed 8-bit integer.
    Int8,
    /// Unsigned 8-bit integer.
    Uint8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    Uint16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    Uint32,
    /// Single-precision floating point.
    Float,
    /// Double-precision floating point.
    Double,
}

impl ValueType {
    /// Returns the wire spelling of this value type.
    pub const fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Int8 => "int8",
            ValueType::Uint8 => "uint8",
            ValueType::Int16 => "int16",
            ValueType::Uint16 => "uint16",
            ValueType::Int32 => "int32",
            ValueType::Uint32 => "uint32",
            ValueType::Float => "float",
            ValueType::Double => "double",
        }
    }
}

/// Direction in which a series is expected to move.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Slope {
    /// The value never changes.
    Zero,
    /// The value only ever increases.
    Positive,
    /// The value only ever decreases.
    Negative,
    /// The value may move in either direction.
    Both,
    /// No slope information.
    Unspecified,
}

impl Slope {
    /// Returns the wire spelling of this slope.
    pub const fn as_str(self) -> &'static str {
        match self {
            Slope::Zero => "zero",
            Slope::Positive => "positive",
            Slope::Negative => "negative",
            Slope::Both => "both",
            Slope::Unspecified => "unspecified",
        }
    }
}

/// Metadata describing a single exported series.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// Fully-qualified external name, including any registry prefix.
    pub name: String,

    /// Human-readable title.
    pub title: String,

    /// Longer description.
    pub description: String,

    /// Unit label.
    pub units: String,

    /// Groups, or tags, the series belongs to.
    pub groups: Vec<String>,

    /// How the value should be interpreted.
    pub value_type: ValueType,

    /// Direction the value is expected to move in.
    pub slope: Slope,

    /// Maximum expected time between two value pushes.
    pub tick_interval: Duration,

    /// How long the collector should retain the series after the last push. Zero means forever.
    pub lifetime: Duration,
}

/// A destination for metric metadata and values.
///
/// Sinks are typically wire-protocol clients that forward to a `gmond` collector. They are shared with the registry, not
/// owned by it: the registry never opens or closes a sink, it only calls the two send operations below.
///
/// Neither operation is retried. A value that fails to send is simply sent again, with whatever the current value is,
/// on the next tick.
pub trait Sink: Send + Sync {
    /// Sends the metadata for a series.
    ///
    /// This is called for every series on every tick, as sinks are not assumed to cache metadata.
    ///
    /// # Errors
    ///
    /// If the metadata could not be encoded or transmitted, an error is returned.
    fn send_meta(&self, descriptor: &MetricDescriptor) -> Result<(), SinkError>;

    /// Sends the current value of a series.
    ///
    /// # Errors
    ///
    /// If the value could not be encoded or transmitted, an error is returned.
    fn send_value(&self, name: &str, value: &str, value_type: ValueType) -> Result<(), SinkError>;
}

impl<S> Sink for Arc<S>
where
    S: Sink + ?Sized,
{
    fn send_meta(&self, descriptor: &MetricDescriptor) -> Result<(), SinkError> {
        (**self).send_meta(descriptor)
    }

    fn send_value(&self, name: &str, value: &str, value_type: ValueType) -> Result<(), SinkError> {
        (**self).send_value(name, value, value_type)
    }
}

impl<S> Sink for &S
where
    S: Sink + ?Sized,
{
    fn send_meta(&self, descriptor: &MetricDescriptor) -> Result<(), SinkError> {
        (**self).send_meta(descriptor)
    }

    fn send_value(&self, name: &str, value: &str, value_type: ValueType) -> Result<(), SinkError> {
        (**self).send_value(name, value, value_type)
    }
}

/// A sink that emits everything it is sent as `tracing` events.
///
/// Useful when no collector is available, or to see exactly what would be pushed.
#[derive(Clone, Debug)]
pub struct LoggingSink {
    level: Level,
}

impl LoggingSink {
    /// Creates a new `LoggingSink` that logs at the given level.
    pub fn new(level: Level) -> Self {
        LoggingSink { level }
    }
}

impl Default for LoggingSink {
    fn default() -> Self {
        LoggingSink::new(Level::INFO)
    }
}

// `tracing` macros need the level as a constant, so each level gets its own branch.
macro_rules! event_at {
    ($level:expr, $($args:tt)+) => {
        let level = $level;
        if level == Level::ERROR {
            tracing::event!(Level::ERROR, $($args)+);
        } else if level == Level::WARN {
            tracing::event!(Level::WARN, $($args)+);
        } else if level == Level::INFO {
            tracing::event!(Level::INFO, $($args)+);
        } else if level == Level::DEBUG {
            tracing::event!(Level::DEBUG, $($args)+);
        } else {
            tracing::event!(Level::TRACE, $($args)+);
        }
    };
}

impl Sink for LoggingSink {
    fn send_meta(&self, descriptor: &MetricDescriptor) -> Result<(), SinkError> {
        event_at!(
            self.level,
            metric_name = %descriptor.name,
            title = %descriptor.title,
            units = %descriptor.units,
            value_type = descriptor.value_type.as_str(),
            slope = descriptor.slope.as_str(),
            groups = ?descriptor.groups,
            "Metric metadata."
        );
        Ok(())
    }

    fn send_value(&self, name: &str, value: &str, value_type: ValueType) -> Result<(), SinkError> {
        event_at!(
            self.level,
            metric_name = name,
            value,
            value_type = value_type.as_str(),
            "Metric value."
        );
        Ok(())
    }
}
