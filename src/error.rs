//! Error types.

/// Error type returned by a driver's raw operations.
///
/// Wrapped operations hand it back to the caller untouched.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by this crate itself.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The driver name does not identify sqlite, mysql or postgresql.
    #[error("unsupported database vendor: {name}")]
    UnsupportedVendor { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
