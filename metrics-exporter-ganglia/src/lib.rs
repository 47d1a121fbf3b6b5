//! An exporter for periodically pushing in-process metrics to [Ganglia][ganglia].
//!
//! [ganglia]: http://ganglia.info/
//!
//! # Usage
//!
//! Metrics are created up front, registered with a [`Registry`], and then updated directly by application code:
//!
//! ```no_run
//! # use std::time::Duration;
//! # use metrics_exporter_ganglia::{GangliaBuilder, Histogram, LoggingSink};
//! // First, create a registry.
//! //
//! // The builder controls the prefix applied to every metric name, how name parts are joined, and how often metrics
//! // are pushed. Any `Sink` can be used as the destination: normally this is a gmetric client talking to `gmond`.
//! let registry = GangliaBuilder::default()
//!     .with_prefix("gmrtest")
//!     .with_tick_interval(Duration::from_secs(20))
//!     .build(LoggingSink::default())
//!     .expect("failed to build registry");
//!
//! // Create a metric, describe it, and register it. The first registration launches the background thread which
//! // pushes every registered metric to the sink once per tick.
//! let page_size = Histogram::new("page_size")
//!     .with_title("Page size")
//!     .with_units("bytes")
//!     .with_groups(["gmrtest"]);
//! registry.register(&page_size);
//!
//! // From then on, just update the metric.
//! page_size.update(4096);
//! ```
//!
//! # Exported series
//!
//! Counters and meters are exported as a single series named after the metric. Timers and histograms are exported as
//! several series, one per statistic, with the statistic appended to the name: `page_size.count`, `page_size.mean`,
//! and `page_size.max`.
//!
//! Every series is sent with its full metadata on every tick, as collectors are not assumed to remember it.
//!
//! # Failure handling
//!
//! Export is best-effort. A failure to push one series is logged and counted, and the cycle carries on with the rest.
//! Nothing is retried: the next tick simply pushes the then-current values. Instrumented code never observes export
//! failures.
//!
//! # Missing
//!
//! ## Shutdown
//!
//! The export thread runs until the process exits. There is no way to stop it.
//!
//! ## Quantiles
//!
//! Histograms and timers track count, mean, and maximum only.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, GangliaBuilder};

pub mod debugging;

mod forwarder;

mod handles;
pub use self::handles::{Counter, Histogram, Meter, MetricInfo, Timer, TimerGuard};

mod metric;
pub use self::metric::Metric;

mod naming;
pub use self::naming::NamingPolicy;

mod registry;
pub use self::registry::Registry;

mod sink;
pub use self::sink::{LoggingSink, MetricDescriptor, Sink, SinkError, Slope, ValueType};

mod storage;
pub use self::storage::HistogramSnapshot;

mod telemetry;
pub use self::telemetry::FlushTelemetry;

mod writer;
