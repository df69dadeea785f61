//! Shared dispatch table for connect, execute and close.

use std::fmt;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use once_cell::sync::Lazy;

use crate::database::{DatabaseHandle, QueryOutput, SqlValue};
use crate::error::DriverError;

/// Implementation of the three lifecycle operations of a database.
///
/// Implementations must behave like the driver from the caller's point of
/// view: same return values, same errors.
pub trait DatabaseOperations: Send + Sync + fmt::Debug {
    fn connect(&self, db: &dyn DatabaseHandle, reuse_if_open: bool) -> Result<bool, DriverError>;

    fn execute(
        &self,
        db: &dyn DatabaseHandle,
        sql: &str,
        params: &[SqlValue],
        commit: Option<bool>,
    ) -> Result<QueryOutput, DriverError>;

    fn close(&self, db: &dyn DatabaseHandle) -> Result<bool, DriverError>;

    /// The operations this one delegates to, if it is a wrapper.
    fn wrapped(&self) -> Option<Arc<dyn DatabaseOperations>> {
        None
    }
}

/// Un-instrumented operations that call straight into the handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverOperations;

impl DatabaseOperations for DriverOperations {
    fn connect(&self, db: &dyn DatabaseHandle, reuse_if_open: bool) -> Result<bool, DriverError> {
        db.raw_connect(reuse_if_open)
    }

    fn execute(
        &self,
        db: &dyn DatabaseHandle,
        sql: &str,
        params: &[SqlValue],
        commit: Option<bool>,
    ) -> Result<QueryOutput, DriverError> {
        db.raw_execute(sql, params, commit)
    }

    fn close(&self, db: &dyn DatabaseHandle) -> Result<bool, DriverError> {
        db.raw_close()
    }
}

static GLOBAL_TABLE: Lazy<Arc<OperationTable>> = Lazy::new(|| Arc::new(OperationTable::new()));

/// The operations every [`Database`](crate::Database) bound to this table
/// dispatches through.
///
/// Loads are lock-free; swapping is meant to happen rarely, typically once at
/// startup through an [`Instrumentor`](crate::Instrumentor).
pub struct OperationTable {
    active: ArcSwap<Arc<dyn DatabaseOperations>>,
    saved: ArcSwapOption<Arc<dyn DatabaseOperations>>,
}

impl OperationTable {
    /// A table dispatching to [`DriverOperations`].
    pub fn new() -> Self {
        Self::with_operations(Arc::new(DriverOperations))
    }

    pub fn with_operations(operations: Arc<dyn DatabaseOperations>) -> Self {
        Self {
            active: ArcSwap::from_pointee(operations),
            saved: ArcSwapOption::empty(),
        }
    }

    /// The process-wide table used by [`Database::new`](crate::Database::new).
    pub fn global() -> Arc<OperationTable> {
        Arc::clone(&GLOBAL_TABLE)
    }

    /// Operations currently installed.
    pub fn current(&self) -> Arc<dyn DatabaseOperations> {
        let guard = self.active.load();
        Arc::clone(&**guard)
    }

    /// The operations underneath every installed wrapper.
    pub fn original(&self) -> Arc<dyn DatabaseOperations> {
        let mut operations = self.current();
        while let Some(inner) = operations.wrapped() {
            operations = inner;
        }
        operations
    }

    /// Whether instrumentation is installed, whichever controller installed it.
    pub fn is_instrumented(&self) -> bool {
        self.saved.load().is_some()
    }

    /// The un-instrumented operations, saved on first use.
    ///
    /// Returns the operations and whether they had already been saved.
    pub(crate) fn save_original(&self) -> (Arc<dyn DatabaseOperations>, bool) {
        if let Some(saved) = self.saved.load_full() {
            return (Arc::clone(&*saved), true);
        }
        let original = self.original();
        self.saved.store(Some(Arc::new(Arc::clone(&original))));
        (original, false)
    }

    /// Forget the saved operations, handing them back if there were any.
    pub(crate) fn take_saved(&self) -> Option<Arc<dyn DatabaseOperations>> {
        self.saved.swap(None).map(|saved| Arc::clone(&*saved))
    }

    /// Install `operations`, returning what was installed before.
    pub(crate) fn replace(
        &self,
        operations: Arc<dyn DatabaseOperations>,
    ) -> Arc<dyn DatabaseOperations> {
        let previous = self.active.swap(Arc::new(operations));
        Arc::clone(&*previous)
    }
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTable")
            .field("active", &self.current())
            .field("instrumented", &self.is_instrumented())
            .finish()
    }
}
