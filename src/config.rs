//! Configuration for instrumentation behavior.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::global::BoxedTracer;
use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry::trace::{Tracer, TracerProvider};

use crate::commenter::CommenterOptions;
use crate::instrumentor::instrumentation_scope;
use crate::metrics::MetricSink;

/// Per-call behavior of the wrapped operations.
///
/// # Example
///
/// ```rust
/// use db_client_tracing::{CommenterOptions, TracingConfig};
///
/// let config = TracingConfig::default()
///     .with_commenter(true)
///     .with_commenter_options(CommenterOptions::new().with("db_framework", false));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Whether to append a SQL comment to executed statements.
    /// Default: `false`
    pub enable_commenter: bool,

    /// Which keys the SQL comment carries.
    /// Default: every key, including trace context values
    pub commenter_options: CommenterOptions,

    /// Whether `db.statement` records the statement with its comment.
    ///
    /// When `false` the span sees the statement as the caller wrote it and
    /// only the driver receives the comment.
    /// Default: `false`
    pub enable_attribute_commenter: bool,

    /// Executes slower than this are logged at WARN level.
    /// Default: `None`
    pub slow_query_threshold: Option<Duration>,
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable SQL comment injection.
    pub fn with_commenter(mut self, enabled: bool) -> Self {
        self.enable_commenter = enabled;
        self
    }

    /// Set the per-key comment options.
    pub fn with_commenter_options(mut self, options: CommenterOptions) -> Self {
        self.commenter_options = options;
        self
    }

    /// Record the commented statement in `db.statement`.
    pub fn with_attribute_commenter(mut self, enabled: bool) -> Self {
        self.enable_attribute_commenter = enabled;
        self
    }

    /// Set the threshold for slow query warnings.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    /// Configuration for local debugging: comments on, visible in spans,
    /// slow queries flagged early.
    pub fn development() -> Self {
        Self {
            enable_commenter: true,
            commenter_options: CommenterOptions::default(),
            enable_attribute_commenter: true,
            slow_query_threshold: Some(Duration::from_millis(100)),
        }
    }

    /// Configuration that leaves statements untouched.
    pub fn production() -> Self {
        Self {
            enable_commenter: false,
            commenter_options: CommenterOptions::default(),
            enable_attribute_commenter: false,
            slow_query_threshold: Some(Duration::from_secs(1)),
        }
    }
}

/// Everything [`Instrumentor::instrument`](crate::Instrumentor::instrument)
/// needs: telemetry sources plus the [`TracingConfig`].
///
/// Without explicit sources the globally registered tracer and meter
/// providers are used.
#[derive(Default)]
pub struct InstrumentOptions {
    pub(crate) tracer: Option<BoxedTracer>,
    pub(crate) meter: Option<Meter>,
    pub(crate) metric_sink: Option<Arc<dyn MetricSink>>,
    pub config: TracingConfig,
}

impl InstrumentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take spans from `provider` instead of the global provider.
    pub fn with_tracer_provider<P>(mut self, provider: &P) -> Self
    where
        P: TracerProvider,
        P::Tracer: Send + Sync + 'static,
        <P::Tracer as Tracer>::Span: Send + Sync + 'static,
    {
        let tracer = provider.tracer_with_scope(instrumentation_scope());
        self.tracer = Some(BoxedTracer::new(Box::new(tracer)));
        self
    }

    /// Use an already built tracer.
    pub fn with_tracer(mut self, tracer: BoxedTracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Create instruments from `provider` instead of the global provider.
    pub fn with_meter_provider<P>(mut self, provider: &P) -> Self
    where
        P: MeterProvider + ?Sized,
    {
        self.meter = Some(provider.meter_with_scope(instrumentation_scope()));
        self
    }

    /// Send metrics to `sink` instead of OpenTelemetry instruments.
    pub fn with_metric_sink(mut self, sink: Arc<dyn MetricSink>) -> Self {
        self.metric_sink = Some(sink);
        self
    }

    pub fn with_config(mut self, config: TracingConfig) -> Self {
        self.config = config;
        self
    }

    /// Shorthand for [`TracingConfig::with_commenter`].
    pub fn with_commenter(mut self, enabled: bool) -> Self {
        self.config.enable_commenter = enabled;
        self
    }

    /// Shorthand for [`TracingConfig::with_commenter_options`].
    pub fn with_commenter_options(mut self, options: CommenterOptions) -> Self {
        self.config.commenter_options = options;
        self
    }

    /// Shorthand for [`TracingConfig::with_attribute_commenter`].
    pub fn with_attribute_commenter(mut self, enabled: bool) -> Self {
        self.config.enable_attribute_commenter = enabled;
        self
    }
}

impl fmt::Debug for InstrumentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentOptions")
            .field("tracer", &self.tracer.is_some())
            .field("meter", &self.meter.is_some())
            .field("metric_sink", &self.metric_sink)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commenter::DB_FRAMEWORK;

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::default()
            .with_commenter(true)
            .with_attribute_commenter(true)
            .with_slow_query_threshold(Duration::from_millis(250));

        assert!(config.enable_commenter);
        assert!(config.enable_attribute_commenter);
        assert_eq!(config.slow_query_threshold, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_defaults() {
        let config = TracingConfig::default();
        assert!(!config.enable_commenter);
        assert!(!config.enable_attribute_commenter);
        assert_eq!(config.commenter_options, CommenterOptions::default());
        assert!(config.slow_query_threshold.is_none());
    }

    #[test]
    fn test_development_config() {
        let config = TracingConfig::development();
        assert!(config.enable_commenter);
        assert!(config.enable_attribute_commenter);
    }

    #[test]
    fn test_production_config() {
        let config = TracingConfig::production();
        assert!(!config.enable_commenter);
        assert!(!config.enable_attribute_commenter);
    }

    #[test]
    fn test_options_shorthands() {
        let options = InstrumentOptions::new()
            .with_commenter(true)
            .with_commenter_options(CommenterOptions::new().with(DB_FRAMEWORK, false))
            .with_attribute_commenter(true);

        assert!(options.config.enable_commenter);
        assert!(options.config.enable_attribute_commenter);
        assert!(!options.config.commenter_options.is_enabled(DB_FRAMEWORK));
        assert!(options.tracer.is_none());
    }
}
