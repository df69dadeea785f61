//! # db-client-tracing
//!
//! OpenTelemetry instrumentation for SQL database clients.
//!
//! This crate intercepts the connect, execute and close operations of a
//! database-access layer and emits spans and metrics around them without any
//! change to calling code. Errors and return values of the driver pass through
//! untouched.
//!
//! ## Features
//!
//! - **Transparent Interception**: operations are swapped on a shared
//!   [`OperationTable`]; every [`Database`] bound to it is traced
//! - **Idempotent Install**: [`Instrumentor`] saves the original operations once
//!   and restores them on `uninstrument`
//! - **Metrics**: execute durations and connections in use
//! - **SQL Commenter**: optionally appends trace context to executed statements
//!   so database-side query logs can be joined with traces
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use db_client_tracing::prelude::*;
//!
//! let mut instrumentor = Instrumentor::new();
//! instrumentor.instrument(InstrumentOptions::new());
//!
//! let db = Database::new(driver);
//! db.connect(false)?;
//! db.execute("SELECT * FROM users", &[], None)?;
//! db.close()?;
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use db_client_tracing::{CommenterOptions, InstrumentOptions};
//!
//! let options = InstrumentOptions::new()
//!     .with_tracer_provider(&tracer_provider)
//!     .with_meter_provider(&meter_provider)
//!     .with_commenter(true)                 // append /*...*/ to statements
//!     .with_attribute_commenter(false)      // keep db.statement uncommented
//!     .with_commenter_options(CommenterOptions::new().with("db_framework", false));
//!
//! instrumentor.instrument(options);
//! ```
//!
//! ## Telemetry
//!
//! | Name | Kind | Attributes |
//! |------|------|------------|
//! | `connect` | CLIENT span | `net.host.name`, `db.user`, `net.host.port`, `db.system` |
//! | `{VERB} {db}` | CLIENT span | `db.statement`, `db.system`, `db.name`, connection attributes |
//! | `db.client.operation.duration` | histogram (ms) | `db.system.name`, `db.query.text`, `db.server.address` |
//! | `db.client.connections.usage` | up/down counter | `pool.name`, `state` |

mod attributes;
mod commenter;
mod config;
mod database;
mod error;
mod instrumentor;
mod metrics;
mod operations;
mod parser;
mod traced;
mod vendor;

pub use attributes::{attributes_from_connect_params, keys, metric_keys, pool_name, DEFAULT_PORT};
pub use commenter::{
    add_sql_comment, generate_sql_comment, parse_sql_comment, CommenterData, CommenterOptions,
    DB_DRIVER, DB_FRAMEWORK, FRAMEWORK, OPENTELEMETRY_VALUES, TRACEPARENT, TRACESTATE,
};
pub use config::{InstrumentOptions, TracingConfig};
pub use database::{ConnectParams, Database, DatabaseHandle, QueryOutput, SqlValue};
pub use error::{DriverError, Error, Result};
pub use instrumentor::{instrumentation_scope, Instrumentor, LIBRARY_NAME, LIBRARY_VERSION, SCHEMA_URL};
pub use metrics::{metric_names, MetricSink, OtelMetrics, STATE_USED};
pub use operations::{DatabaseOperations, DriverOperations, OperationTable};
pub use parser::{operation_name, operation_verb, strip_leading_comment};
pub use traced::TracedOperations;
pub use vendor::Vendor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ConnectParams, Database, DatabaseHandle, DriverError, InstrumentOptions, Instrumentor,
        QueryOutput, SqlValue, TracingConfig, Vendor,
    };
}
