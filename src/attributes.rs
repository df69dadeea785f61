//! Telemetry attribute keys and derivation from connection parameters.

use opentelemetry::KeyValue;

use crate::database::ConnectParams;
use crate::vendor::Vendor;

/// Port reported when the connection parameters do not name one.
pub const DEFAULT_PORT: u16 = 3306;

/// Span attribute keys.
pub mod keys {
    pub const NET_HOST_NAME: &str = "net.host.name";
    pub const NET_HOST_PORT: &str = "net.host.port";
    pub const DB_USER: &str = "db.user";
    pub const DB_NAME: &str = "db.name";
    pub const DB_SYSTEM: &str = "db.system";
    pub const DB_STATEMENT: &str = "db.statement";
}

/// Metric attribute keys.
pub mod metric_keys {
    pub const DB_SYSTEM_NAME: &str = "db.system.name";
    pub const DB_QUERY_TEXT: &str = "db.query.text";
    pub const DB_SERVER_ADDRESS: &str = "db.server.address";
    pub const POOL_NAME: &str = "pool.name";
    pub const STATE: &str = "state";
}

/// Derive span attributes from connection parameters.
///
/// The port falls back to 3306 for every vendor. The flag reports whether a
/// host was configured.
pub fn attributes_from_connect_params(params: &ConnectParams) -> (Vec<KeyValue>, bool) {
    let mut attrs = Vec::with_capacity(3);

    if let Some(host) = &params.host {
        attrs.push(KeyValue::new(keys::NET_HOST_NAME, host.clone()));
    }
    if let Some(user) = &params.user {
        attrs.push(KeyValue::new(keys::DB_USER, user.clone()));
    }
    attrs.push(KeyValue::new(
        keys::NET_HOST_PORT,
        i64::from(params.port.unwrap_or(DEFAULT_PORT)),
    ));

    (attrs, params.host.is_some())
}

/// Connection string identifying the pool a handle belongs to.
///
/// `{vendor}://{host}:{port}/{db}` when a host is configured. Handles without
/// a host, such as file-backed SQLite, get `{vendor}://{db}` instead of a
/// placeholder host and the default port.
pub fn pool_name(vendor: Vendor, params: &ConnectParams, database: Option<&str>) -> String {
    let database = database.unwrap_or_default();
    match &params.host {
        Some(host) => format!(
            "{}://{}:{}/{}",
            vendor,
            host,
            params.port.unwrap_or(DEFAULT_PORT),
            database
        ),
        None => format!("{}://{}", vendor, database),
    }
}
