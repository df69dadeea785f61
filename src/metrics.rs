//! Operation duration and connection usage metrics.

use std::fmt;
use std::time::{Duration, Instant};

use opentelemetry::metrics::{Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;

use crate::attributes::{metric_keys, pool_name};
use crate::database::DatabaseHandle;

/// Metric names following the database client semantic conventions.
pub mod metric_names {
    /// Up/down counter of connections in the state given by `state`.
    pub const DB_CLIENT_CONNECTIONS_USAGE: &str = "db.client.connections.usage";
    /// Histogram of execute durations in milliseconds.
    pub const DB_CLIENT_OPERATION_DURATION: &str = "db.client.operation.duration";
}

/// `state` value for connections handed out to a caller.
pub const STATE_USED: &str = "used";

/// Destination of the metrics emitted by wrapped operations.
pub trait MetricSink: Send + Sync + fmt::Debug {
    /// Record one execute duration, in whole milliseconds.
    fn record_duration(&self, millis: u64, attributes: &[KeyValue]);

    /// Add `delta` to the connection usage counter.
    fn add_connection_usage(&self, delta: i64, attributes: &[KeyValue]);
}

/// Metric sink backed by OpenTelemetry instruments.
#[derive(Clone)]
pub struct OtelMetrics {
    operation_duration: Histogram<u64>,
    connections_usage: UpDownCounter<i64>,
}

impl OtelMetrics {
    /// Create both instruments on `meter`.
    pub fn new(meter: &Meter) -> Self {
        let connections_usage = meter
            .i64_up_down_counter(metric_names::DB_CLIENT_CONNECTIONS_USAGE)
            .with_description(
                "The number of connections that are currently in state described by the state attribute.",
            )
            .with_unit("connection")
            .build();

        let operation_duration = meter
            .u64_histogram(metric_names::DB_CLIENT_OPERATION_DURATION)
            .with_description("The duration of the operation")
            .with_unit("ms")
            .build();

        Self {
            operation_duration,
            connections_usage,
        }
    }
}

impl fmt::Debug for OtelMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtelMetrics")
            .field("operation_duration", &metric_names::DB_CLIENT_OPERATION_DURATION)
            .field("connections_usage", &metric_names::DB_CLIENT_CONNECTIONS_USAGE)
            .finish()
    }
}

impl MetricSink for OtelMetrics {
    fn record_duration(&self, millis: u64, attributes: &[KeyValue]) {
        self.operation_duration.record(millis, attributes);
    }

    fn add_connection_usage(&self, delta: i64, attributes: &[KeyValue]) {
        self.connections_usage.add(delta, attributes);
    }
}

/// Tracks connections in use per pool.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionUsage<'a> {
    sink: &'a dyn MetricSink,
}

impl<'a> ConnectionUsage<'a> {
    pub(crate) fn new(sink: &'a dyn MetricSink) -> Self {
        Self { sink }
    }

    pub(crate) fn add_used(&self, db: &dyn DatabaseHandle, delta: i64) {
        let attributes = [
            KeyValue::new(
                metric_keys::POOL_NAME,
                pool_name(db.vendor(), db.connect_params(), db.database()),
            ),
            KeyValue::new(metric_keys::STATE, STATE_USED),
        ];
        self.sink.add_connection_usage(delta, &attributes);
    }
}

/// Records the elapsed time of an operation when dropped.
///
/// Dropping happens on every exit path, so exactly one sample is written
/// whether the operation returned, failed or unwound.
pub(crate) struct DurationGuard<'a> {
    sink: &'a dyn MetricSink,
    start: Instant,
    attributes: Vec<KeyValue>,
    slow_query_threshold: Option<Duration>,
}

impl<'a> DurationGuard<'a> {
    pub(crate) fn new(
        sink: &'a dyn MetricSink,
        start: Instant,
        attributes: Vec<KeyValue>,
        slow_query_threshold: Option<Duration>,
    ) -> Self {
        Self {
            sink,
            start,
            attributes,
            slow_query_threshold,
        }
    }
}

impl Drop for DurationGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let millis = duration_millis(elapsed);
        self.sink.record_duration(millis, &self.attributes);

        if let Some(threshold) = self.slow_query_threshold {
            if elapsed > threshold {
                tracing::warn!(
                    duration_ms = millis,
                    threshold_ms = threshold.as_millis() as u64,
                    "Slow query detected"
                );
            }
        }
    }
}

/// Milliseconds rounded to the nearest integer.
pub(crate) fn duration_millis(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * 1000.0).round().max(0.0) as u64
}
