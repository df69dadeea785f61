#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use db_client_tracing::{
    ConnectParams, Database, DatabaseHandle, DriverError, InstrumentOptions, Instrumentor,
    MetricSink, OperationTable, QueryOutput, SqlValue, Vendor,
};
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;

/// Error a fake driver fails with.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct DriverFailure(pub String);

/// Driver handle that records what it was asked to run.
#[derive(Debug)]
pub struct FakeDriver {
    driver_name: String,
    vendor: Vendor,
    database: Option<String>,
    params: ConnectParams,
    open: AtomicBool,
    executed: Mutex<Vec<String>>,
    fail_connect: Option<String>,
    fail_execute: Option<String>,
    fail_close: Option<String>,
}

impl FakeDriver {
    pub fn new(
        driver_name: &str,
        database: Option<&str>,
        params: ConnectParams,
    ) -> db_client_tracing::Result<Self> {
        Ok(Self {
            driver_name: driver_name.to_string(),
            vendor: Vendor::classify(driver_name)?,
            database: database.map(str::to_string),
            params,
            open: AtomicBool::new(false),
            executed: Mutex::new(Vec::new()),
            fail_connect: None,
            fail_execute: None,
            fail_close: None,
        })
    }

    pub fn sqlite_memory() -> Self {
        Self::new("SqliteDatabase", Some(":memory:"), ConnectParams::new()).unwrap()
    }

    pub fn failing_connect(mut self, message: &str) -> Self {
        self.fail_connect = Some(message.to_string());
        self
    }

    pub fn failing_execute(mut self, message: &str) -> Self {
        self.fail_execute = Some(message.to_string());
        self
    }

    pub fn failing_close(mut self, message: &str) -> Self {
        self.fail_close = Some(message.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl DatabaseHandle for FakeDriver {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn driver_name(&self) -> &str {
        &self.driver_name
    }

    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    fn connect_params(&self) -> &ConnectParams {
        &self.params
    }

    fn raw_connect(&self, reuse_if_open: bool) -> Result<bool, DriverError> {
        if let Some(message) = &self.fail_connect {
            return Err(Box::new(DriverFailure(message.clone())));
        }
        let was_open = self.open.swap(true, Ordering::SeqCst);
        if was_open && !reuse_if_open {
            return Err(Box::new(DriverFailure("Connection already opened.".into())));
        }
        Ok(!was_open)
    }

    fn raw_execute(
        &self,
        sql: &str,
        params: &[SqlValue],
        _commit: Option<bool>,
    ) -> Result<QueryOutput, DriverError> {
        self.executed.lock().unwrap().push(sql.to_string());
        if let Some(message) = &self.fail_execute {
            return Err(Box::new(DriverFailure(message.clone())));
        }
        Ok(QueryOutput::with_rows(vec![params.to_vec()]))
    }

    fn raw_close(&self) -> Result<bool, DriverError> {
        if let Some(message) = &self.fail_close {
            return Err(Box::new(DriverFailure(message.clone())));
        }
        Ok(self.open.swap(false, Ordering::SeqCst))
    }
}

/// Metric sink keeping every measurement.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub durations: Mutex<Vec<(u64, Vec<KeyValue>)>>,
    pub usage: Mutex<Vec<(i64, Vec<KeyValue>)>>,
}

impl RecordingSink {
    pub fn durations(&self) -> Vec<(u64, Vec<KeyValue>)> {
        self.durations.lock().unwrap().clone()
    }

    pub fn usage(&self) -> Vec<(i64, Vec<KeyValue>)> {
        self.usage.lock().unwrap().clone()
    }
}

impl MetricSink for RecordingSink {
    fn record_duration(&self, millis: u64, attributes: &[KeyValue]) {
        self.durations.lock().unwrap().push((millis, attributes.to_vec()));
    }

    fn add_connection_usage(&self, delta: i64, attributes: &[KeyValue]) {
        self.usage.lock().unwrap().push((delta, attributes.to_vec()));
    }
}

/// An isolated table with an in-memory span exporter and recording sink.
pub struct Harness {
    pub table: Arc<OperationTable>,
    pub instrumentor: Instrumentor,
    pub exporter: InMemorySpanExporter,
    pub provider: TracerProvider,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new() -> Self {
        let table = Arc::new(OperationTable::new());
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();

        Self {
            instrumentor: Instrumentor::for_table(Arc::clone(&table)),
            table,
            exporter,
            provider,
            sink: Arc::new(RecordingSink::default()),
        }
    }

    /// Options pointing at this harness' provider and sink.
    pub fn options(&self) -> InstrumentOptions {
        InstrumentOptions::new()
            .with_tracer_provider(&self.provider)
            .with_metric_sink(self.sink.clone())
    }

    pub fn instrument(&mut self) {
        let options = self.options();
        self.instrumentor.instrument(options);
    }

    pub fn database<H: DatabaseHandle>(&self, handle: H) -> Database<H> {
        Database::with_table(handle, Arc::clone(&self.table))
    }

    pub fn spans(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().unwrap()
    }
}

pub fn attribute(span: &SpanData, key: &str) -> Option<Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

pub fn string_attribute(span: &SpanData, key: &str) -> Option<String> {
    attribute(span, key).map(|value| value.as_str().into_owned())
}

pub fn metric_attribute(attributes: &[KeyValue], key: &str) -> Option<String> {
    attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}
