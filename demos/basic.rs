//! Basic example showing how to use db-client-tracing.
//!
//! Run with: cargo run --example basic

use std::sync::Mutex;

use db_client_tracing::prelude::*;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A stand-in driver that remembers the statements it was given.
struct EchoDriver {
    vendor: Vendor,
    params: ConnectParams,
    log: Mutex<Vec<String>>,
}

impl EchoDriver {
    fn open(driver_name: &str, params: ConnectParams) -> db_client_tracing::Result<Self> {
        Ok(Self {
            vendor: Vendor::classify(driver_name)?,
            params,
            log: Mutex::new(Vec::new()),
        })
    }
}

impl DatabaseHandle for EchoDriver {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn driver_name(&self) -> &str {
        "EchoPostgresqlDatabase"
    }

    fn database(&self) -> Option<&str> {
        Some("demo")
    }

    fn connect_params(&self) -> &ConnectParams {
        &self.params
    }

    fn raw_connect(&self, _reuse_if_open: bool) -> Result<bool, DriverError> {
        Ok(true)
    }

    fn raw_execute(
        &self,
        sql: &str,
        _params: &[SqlValue],
        _commit: Option<bool>,
    ) -> Result<QueryOutput, DriverError> {
        if let Ok(mut log) = self.log.lock() {
            log.push(sql.to_string());
        }
        Ok(QueryOutput::affected(1))
    }

    fn raw_close(&self) -> Result<bool, DriverError> {
        Ok(true)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,db_client_tracing=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Collect spans in memory so they can be printed below
    let exporter = InMemorySpanExporter::default();
    let provider = TracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();

    let mut instrumentor = Instrumentor::new();
    instrumentor.instrument(
        InstrumentOptions::new()
            .with_tracer_provider(&provider)
            .with_config(TracingConfig::development()),
    );

    let driver = EchoDriver::open(
        "EchoPostgresqlDatabase",
        ConnectParams::new().with_host("localhost").with_port(5432),
    )?;
    let db = Database::new(driver);

    db.connect(false)?;
    db.execute("UPDATE accounts SET active = %s", &[SqlValue::Integer(1)], None)?;
    db.close()?;

    for sql in db.handle().log.lock().map_err(|e| e.to_string())?.iter() {
        tracing::info!(sql = %sql, "Driver received statement");
    }
    for span in exporter.get_finished_spans()? {
        tracing::info!(name = %span.name, attributes = ?span.attributes, "Finished span");
    }

    instrumentor.uninstrument();
    Ok(())
}
