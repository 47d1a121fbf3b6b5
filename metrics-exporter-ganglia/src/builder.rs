use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    metric::ExportSettings,
    naming::{NamingPolicy, DEFAULT_NAME_SEPARATOR},
    registry::{Registry, State},
    sink::Sink,
};

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(20);

/// Errors that could occur while building a registry.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The tick interval was zero.
    #[error("tick interval must be greater than zero")]
    InvalidTickInterval,
}

/// Builder for a Ganglia [`Registry`].
pub struct GangliaBuilder {
    prefix: String,
    name_separator: String,
    tick_interval: Duration,
    lifetime: Duration,
    background_export: bool,
}

impl GangliaBuilder {
    /// Creates a new `GangliaBuilder` with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the prefix prepended to every metric name.
    ///
    /// Defaults to no prefix.
    #[must_use]
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the separator used to join the parts of metric names.
    ///
    /// An empty separator is treated as the default.
    ///
    /// Defaults to `"."`.
    #[must_use]
    pub fn with_name_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.name_separator = separator.into();
        self
    }

    /// Set the interval between export cycles.
    ///
    /// This is also advertised to the collector as the maximum time between two values of a series.
    ///
    /// Defaults to 20 seconds.
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Set how long the collector keeps a series around after it was last pushed.
    ///
    /// Zero means the collector never expires the series.
    ///
    /// Defaults to zero.
    #[must_use]
    pub fn with_metric_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Set whether registering a metric launches the background export thread.
    ///
    /// When disabled, nothing is exported unless [`Registry::flush`] is called.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_background_export(mut self, background_export: bool) -> Self {
        self.background_export = background_export;
        self
    }

    /// Builds the registry, exporting to the given sink.
    ///
    /// The export thread is not launched until the first metric is registered.
    ///
    /// # Errors
    ///
    /// If the tick interval is zero, an error will be returned.
    pub fn build<S>(self, sink: S) -> Result<Registry, BuildError>
    where
        S: Sink + 'static,
    {
        if self.tick_interval.is_zero() {
            return Err(BuildError::InvalidTickInterval);
        }

        let naming = NamingPolicy::new(self.prefix, self.name_separator);
        let settings = ExportSettings { tick_interval: self.tick_interval, lifetime: self.lifetime };
        let state = State::new(naming, settings, Arc::new(sink), self.background_export);

        Ok(Registry::from_state(state))
    }
}

impl Default for GangliaBuilder {
    fn default() -> Self {
        GangliaBuilder {
            prefix: String::new(),
            name_separator: DEFAULT_NAME_SEPARATOR.to_string(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            lifetime: Duration::ZERO,
            background_export: true,
        }
    }
}
