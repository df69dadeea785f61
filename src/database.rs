//! The database-access surface that gets instrumented.
//!
//! A driver implements [`DatabaseHandle`] with its raw, un-instrumented
//! operations. Callers talk to a [`Database`], which routes every call through
//! the operations currently installed on an [`OperationTable`]; that table is
//! where instrumentation is swapped in and out.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DriverError;
use crate::operations::OperationTable;
use crate::vendor::Vendor;

/// Connection parameters a handle was configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    /// Driver specific options that carry no telemetry meaning.
    pub options: BTreeMap<String, String>,
}

impl ConnectParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

/// Result of executing a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub rows_affected: u64,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryOutput {
    pub fn with_rows(rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            rows_affected: 0,
            rows,
        }
    }

    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            rows: Vec::new(),
        }
    }
}

/// A driver-level database handle.
///
/// The `raw_*` methods are the original behaviour. They should only be called
/// by [`DriverOperations`](crate::DriverOperations); everything else goes
/// through [`Database`] so that installed instrumentation sees the call.
pub trait DatabaseHandle: Send + Sync {
    /// Backend family, resolved when the handle was constructed.
    fn vendor(&self) -> Vendor;

    /// Name of the driver type, e.g. `SqliteDatabase`.
    fn driver_name(&self) -> &str;

    /// Database name or path; `None` while the handle is deferred.
    fn database(&self) -> Option<&str>;

    fn connect_params(&self) -> &ConnectParams;

    /// Open a connection. Returns `true` when a new connection was opened.
    fn raw_connect(&self, reuse_if_open: bool) -> Result<bool, DriverError>;

    /// Execute a statement. `commit` of `None` keeps the driver default.
    fn raw_execute(
        &self,
        sql: &str,
        params: &[SqlValue],
        commit: Option<bool>,
    ) -> Result<QueryOutput, DriverError>;

    /// Close the connection. Returns `true` when a connection was closed.
    fn raw_close(&self) -> Result<bool, DriverError>;
}

/// Caller-facing database that dispatches through an [`OperationTable`].
///
/// # Example
///
/// ```rust,ignore
/// let db = Database::new(MyDriver::open(":memory:")?);
/// db.connect(false)?;
/// db.execute("SELECT 1", &[], None)?;
/// db.close()?;
/// ```
pub struct Database<H> {
    handle: H,
    table: Arc<OperationTable>,
}

impl<H: DatabaseHandle> Database<H> {
    /// Wrap a handle, dispatching through the process-wide table.
    pub fn new(handle: H) -> Self {
        Self::with_table(handle, OperationTable::global())
    }

    /// Wrap a handle, dispatching through the given table.
    pub fn with_table(handle: H, table: Arc<OperationTable>) -> Self {
        Self { handle, table }
    }

    pub fn connect(&self, reuse_if_open: bool) -> Result<bool, DriverError> {
        self.table.current().connect(&self.handle, reuse_if_open)
    }

    pub fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
        commit: Option<bool>,
    ) -> Result<QueryOutput, DriverError> {
        self.table
            .current()
            .execute(&self.handle, sql, params, commit)
    }

    pub fn close(&self) -> Result<bool, DriverError> {
        self.table.current().close(&self.handle)
    }

    /// Get a reference to the underlying handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Consume the wrapper and return the handle.
    pub fn into_inner(self) -> H {
        self.handle
    }
}

impl<H: DatabaseHandle> fmt::Debug for Database<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("driver", &self.handle.driver_name())
            .field("vendor", &self.handle.vendor())
            .field("database", &self.handle.database())
            .finish()
    }
}

impl<H: DatabaseHandle> AsRef<H> for Database<H> {
    fn as_ref(&self) -> &H {
        &self.handle
    }
}
