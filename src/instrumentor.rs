//! Installing and removing instrumentation on an [`OperationTable`].

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry::InstrumentationScope;

use crate::config::InstrumentOptions;
use crate::metrics::{MetricSink, OtelMetrics};
use crate::operations::OperationTable;
use crate::traced::TracedOperations;

/// Instrumentation library name.
pub const LIBRARY_NAME: &str = env!("CARGO_PKG_NAME");
/// Instrumentation library version.
pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Semantic conventions schema the emitted telemetry follows.
pub const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.11.0";

/// Scope identifying this library to tracer and meter providers.
pub fn instrumentation_scope() -> InstrumentationScope {
    InstrumentationScope::builder(LIBRARY_NAME)
        .with_version(LIBRARY_VERSION)
        .with_schema_url(SCHEMA_URL)
        .build()
}

/// Installs [`TracedOperations`] on an [`OperationTable`] and restores the
/// original operations on request.
///
/// Install once at startup, before traffic starts. Calls on a table may run
/// concurrently with each other but `instrument`/`uninstrument` are not meant
/// to race against another controller on the same table.
///
/// The saved operations live on the table, so any controller for the same
/// table sees the same state and can undo another controller's install.
///
/// # Example
///
/// ```rust,ignore
/// let mut instrumentor = Instrumentor::new();
/// instrumentor.instrument(InstrumentOptions::new().with_commenter(true));
///
/// // every Database bound to the global table is now traced
/// let db = Database::new(driver);
/// db.execute("SELECT 1", &[], None)?;
///
/// instrumentor.uninstrument();
/// ```
#[derive(Debug)]
pub struct Instrumentor {
    table: Arc<OperationTable>,
}

impl Instrumentor {
    /// Controller for the process-wide table.
    pub fn new() -> Self {
        Self::for_table(OperationTable::global())
    }

    /// Controller for a specific table.
    pub fn for_table(table: Arc<OperationTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<OperationTable> {
        &self.table
    }

    pub fn is_instrumented(&self) -> bool {
        self.table.is_instrumented()
    }

    /// Wrap the table's operations.
    ///
    /// The un-instrumented operations are saved on the table the first time.
    /// Calling this again replaces the installed wrapper with one built from
    /// `options` around the same saved operations, so wrappers never stack.
    pub fn instrument(&mut self, options: InstrumentOptions) {
        let (original, already_saved) = self.table.save_original();
        if already_saved {
            tracing::debug!("Already instrumented, rebinding with new options");
        }

        let InstrumentOptions {
            tracer,
            meter,
            metric_sink,
            config,
        } = options;

        let tracer = tracer.unwrap_or_else(|| global::tracer_with_scope(instrumentation_scope()));
        let metrics: Arc<dyn MetricSink> = match metric_sink {
            Some(sink) => sink,
            None => {
                let meter = meter.unwrap_or_else(|| global::meter_with_scope(instrumentation_scope()));
                Arc::new(OtelMetrics::new(&meter))
            }
        };

        tracing::debug!(
            enable_commenter = config.enable_commenter,
            enable_attribute_commenter = config.enable_attribute_commenter,
            "Installing database instrumentation"
        );

        let traced = TracedOperations::new(original, Arc::new(tracer), metrics, config);
        self.table.replace(Arc::new(traced));
    }

    /// Put the saved operations back. Does nothing if not instrumented.
    pub fn uninstrument(&mut self) {
        match self.table.take_saved() {
            Some(original) => {
                self.table.replace(original);
                tracing::debug!("Removed database instrumentation");
            }
            None => {
                tracing::warn!("Attempting to uninstrument while not instrumented");
            }
        }
    }
}

impl Default for Instrumentor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_identity() {
        let scope = instrumentation_scope();
        assert_eq!(scope.name(), "db-client-tracing");
        assert_eq!(scope.version(), Some(LIBRARY_VERSION));
        assert_eq!(scope.schema_url(), Some(SCHEMA_URL));
    }

    #[test]
    fn test_uninstrument_without_instrument_is_noop() {
        let table = Arc::new(OperationTable::new());
        let before = table.current();
        let mut instrumentor = Instrumentor::for_table(Arc::clone(&table));

        instrumentor.uninstrument();

        assert!(!instrumentor.is_instrumented());
        assert!(Arc::ptr_eq(&table.current(), &before));
    }

    #[test]
    fn test_instrument_twice_does_not_stack() {
        let table = Arc::new(OperationTable::new());
        let original = table.current();
        let mut instrumentor = Instrumentor::for_table(Arc::clone(&table));

        instrumentor.instrument(InstrumentOptions::new());
        instrumentor.instrument(InstrumentOptions::new().with_commenter(true));

        let installed = table.current();
        let inner = installed.wrapped().expect("traced operations installed");
        assert!(Arc::ptr_eq(&inner, &original));
        assert!(inner.wrapped().is_none());

        instrumentor.uninstrument();
        assert!(Arc::ptr_eq(&table.current(), &original));
        instrumentor.uninstrument();
        assert!(Arc::ptr_eq(&table.current(), &original));
    }

    #[test]
    fn test_second_controller_finds_true_original() {
        let table = Arc::new(OperationTable::new());
        let original = table.current();
        let mut first = Instrumentor::for_table(Arc::clone(&table));
        let mut second = Instrumentor::for_table(Arc::clone(&table));

        first.instrument(InstrumentOptions::new());
        second.instrument(InstrumentOptions::new());

        let inner = table.current().wrapped().expect("traced operations installed");
        assert!(Arc::ptr_eq(&inner, &original));

        second.uninstrument();
        assert!(Arc::ptr_eq(&table.current(), &original));
    }

    #[test]
    fn test_fresh_controller_uninstruments_table() {
        let table = Arc::new(OperationTable::new());
        let original = table.current();
        Instrumentor::for_table(Arc::clone(&table)).instrument(InstrumentOptions::new());

        let mut fresh = Instrumentor::for_table(Arc::clone(&table));
        assert!(fresh.is_instrumented());
        fresh.uninstrument();

        assert!(!fresh.is_instrumented());
        assert!(Arc::ptr_eq(&table.current(), &original));
    }

    #[test]
    fn test_controllers_share_installed_state() {
        let table = Arc::new(OperationTable::new());
        let original = table.current();
        let mut first = Instrumentor::for_table(Arc::clone(&table));
        let mut second = Instrumentor::for_table(Arc::clone(&table));

        first.instrument(InstrumentOptions::new());
        second.instrument(InstrumentOptions::new());
        first.uninstrument();

        assert!(!first.is_instrumented());
        assert!(!second.is_instrumented());
        assert!(Arc::ptr_eq(&table.current(), &original));

        second.uninstrument();
        assert!(Arc::ptr_eq(&table.current(), &original));
    }
}
