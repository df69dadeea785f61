//! Instrumented database operations.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::{SpanContext, SpanKind, SpanRef, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, ContextGuard, KeyValue};

use crate::attributes::{attributes_from_connect_params, keys, metric_keys};
use crate::commenter::{add_sql_comment, CommenterData};
use crate::config::TracingConfig;
use crate::database::{DatabaseHandle, QueryOutput, SqlValue};
use crate::error::DriverError;
use crate::metrics::{ConnectionUsage, DurationGuard, MetricSink};
use crate::operations::DatabaseOperations;
use crate::parser::operation_name;
use crate::vendor::Vendor;

/// A CLIENT span that is current for as long as the guard lives and ends
/// when it is dropped.
struct ActiveSpan {
    cx: Context,
    _attached: ContextGuard,
}

impl ActiveSpan {
    fn start(tracer: &BoxedTracer, name: impl Into<Cow<'static, str>>) -> Self {
        let span = tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .start(tracer);
        let cx = Context::current_with_span(span);
        let attached = cx.clone().attach();
        Self {
            cx,
            _attached: attached,
        }
    }

    fn span(&self) -> SpanRef<'_> {
        self.cx.span()
    }

    fn span_context(&self) -> SpanContext {
        self.cx.span().span_context().clone()
    }

    fn record_failure(&self, err: &DriverError) {
        let span = self.span();
        span.record_error(&**err);
        span.set_status(Status::error(err.to_string()));
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        self.cx.span().end();
    }
}

/// Wraps another [`DatabaseOperations`] and emits spans and metrics around
/// each call.
///
/// Return values and errors of the inner operations are passed through
/// untouched.
pub struct TracedOperations {
    inner: Arc<dyn DatabaseOperations>,
    tracer: Arc<BoxedTracer>,
    metrics: Arc<dyn MetricSink>,
    config: Arc<TracingConfig>,
}

impl TracedOperations {
    pub fn new(
        inner: Arc<dyn DatabaseOperations>,
        tracer: Arc<BoxedTracer>,
        metrics: Arc<dyn MetricSink>,
        config: TracingConfig,
    ) -> Self {
        Self {
            inner,
            tracer,
            metrics,
            config: Arc::new(config),
        }
    }

    /// The operations being wrapped.
    pub fn inner(&self) -> &Arc<dyn DatabaseOperations> {
        &self.inner
    }

    /// Get the tracing configuration.
    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    /// Statement to send to the driver, with the comment injected if enabled.
    ///
    /// Records `db.statement` either before or after the injection depending
    /// on [`TracingConfig::enable_attribute_commenter`].
    fn prepare_statement<'q>(
        &self,
        db: &dyn DatabaseHandle,
        span: &ActiveSpan,
        recording: bool,
        sql: &'q str,
        attrs: &[KeyValue],
    ) -> Cow<'q, str> {
        if !self.config.enable_commenter {
            return Cow::Borrowed(sql);
        }

        let data = CommenterData::collect(db, &self.config.commenter_options, &span.span_context());
        let vendor = db.vendor();

        if self.config.enable_attribute_commenter {
            let commented = add_sql_comment(sql, &data);
            if recording {
                set_db_client_attributes(&span.span(), vendor, &commented, attrs);
            }
            Cow::Owned(commented)
        } else {
            if recording {
                set_db_client_attributes(&span.span(), vendor, sql, attrs);
            }
            Cow::Owned(add_sql_comment(sql, &data))
        }
    }
}

impl fmt::Debug for TracedOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedOperations")
            .field("inner", &self.inner)
            .field("metrics", &self.metrics)
            .field("config", &self.config)
            .finish()
    }
}

fn set_db_client_attributes(span: &SpanRef<'_>, vendor: Vendor, sql: &str, attrs: &[KeyValue]) {
    span.set_attribute(KeyValue::new(keys::DB_STATEMENT, sql.to_string()));
    span.set_attribute(KeyValue::new(keys::DB_SYSTEM, vendor.as_str()));
    span.set_attributes(attrs.iter().cloned());
}

impl DatabaseOperations for TracedOperations {
    fn connect(&self, db: &dyn DatabaseHandle, reuse_if_open: bool) -> Result<bool, DriverError> {
        let span = ActiveSpan::start(&self.tracer, "connect");

        if span.span().is_recording() {
            let (attrs, _) = attributes_from_connect_params(db.connect_params());
            let span_ref = span.span();
            span_ref.set_attributes(attrs);
            span_ref.set_attribute(KeyValue::new(keys::DB_SYSTEM, db.vendor().as_str()));
        }

        match self.inner.connect(db, reuse_if_open) {
            Ok(opened) => {
                ConnectionUsage::new(self.metrics.as_ref()).add_used(db, 1);
                Ok(opened)
            }
            Err(err) => {
                tracing::debug!(error = %err, driver = db.driver_name(), "Database connect failed");
                span.record_failure(&err);
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        db: &dyn DatabaseHandle,
        sql: &str,
        params: &[SqlValue],
        commit: Option<bool>,
    ) -> Result<QueryOutput, DriverError> {
        let start = Instant::now();
        let vendor = db.vendor();
        let database = db.database();
        let (mut attrs, host_found) = attributes_from_connect_params(db.connect_params());
        if let Some(name) = database {
            attrs.push(KeyValue::new(keys::DB_NAME, name.to_string()));
        }

        let span = ActiveSpan::start(&self.tracer, operation_name(vendor, database, sql));

        let mut duration_attrs = vec![
            KeyValue::new(metric_keys::DB_SYSTEM_NAME, vendor.as_str()),
            KeyValue::new(metric_keys::DB_QUERY_TEXT, sql.to_string()),
        ];
        if host_found {
            if let Some(host) = &db.connect_params().host {
                duration_attrs.push(KeyValue::new(metric_keys::DB_SERVER_ADDRESS, host.clone()));
            }
        }
        // Declared after the span so the sample is written before the span ends
        let _duration = DurationGuard::new(
            self.metrics.as_ref(),
            start,
            duration_attrs,
            self.config.slow_query_threshold,
        );

        let recording = span.span().is_recording();
        if recording {
            set_db_client_attributes(&span.span(), vendor, sql, &attrs);
        }

        let statement = self.prepare_statement(db, &span, recording, sql, &attrs);

        let result = self.inner.execute(db, &statement, params, commit);
        match &result {
            // OK is final once set, so it is only written after the call succeeds
            Ok(_) if recording => span.span().set_status(Status::Ok),
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(error = %err, driver = db.driver_name(), "Database query failed");
                span.record_failure(err);
            }
        }
        result
    }

    fn close(&self, db: &dyn DatabaseHandle) -> Result<bool, DriverError> {
        let closed = self.inner.close(db)?;
        ConnectionUsage::new(self.metrics.as_ref()).add_used(db, -1);
        Ok(closed)
    }

    fn wrapped(&self) -> Option<Arc<dyn DatabaseOperations>> {
        Some(Arc::clone(&self.inner))
    }
}
