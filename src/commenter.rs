//! SQL comment injection.
//!
//! Appends a trailing comment such as
//! `/*db_driver='SqliteDatabase',traceparent='00-...-01'*/` to a statement so
//! query logs on the database side can be joined with traces.

use std::collections::HashMap;

use opentelemetry::trace::SpanContext;

use crate::database::DatabaseHandle;

/// Key of the driver name entry.
pub const DB_DRIVER: &str = "db_driver";
/// Key of the framework entry.
pub const DB_FRAMEWORK: &str = "db_framework";
/// Key of the W3C trace parent entry.
pub const TRACEPARENT: &str = "traceparent";
/// Key of the W3C trace state entry.
pub const TRACESTATE: &str = "tracestate";
/// Option toggling the trace context entries as a group.
pub const OPENTELEMETRY_VALUES: &str = "opentelemetry_values";

/// Framework identifier written as `db_framework`.
pub const FRAMEWORK: &str = concat!(env!("CARGO_PKG_NAME"), ":", env!("CARGO_PKG_VERSION"));

/// Per-key switches for the comment contents.
///
/// Keys are enabled unless set to `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommenterOptions {
    flags: HashMap<String, bool>,
}

impl CommenterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable a single key.
    pub fn with(mut self, key: impl Into<String>, enabled: bool) -> Self {
        self.flags.insert(key.into(), enabled);
        self
    }

    /// Enable or disable `traceparent` and `tracestate` together.
    pub fn with_opentelemetry_values(self, enabled: bool) -> Self {
        self.with(OPENTELEMETRY_VALUES, enabled)
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(true)
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for CommenterOptions {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self {
            flags: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Ordered key/value pairs for one comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommenterData {
    pairs: Vec<(String, String)>,
}

impl CommenterData {
    /// Gather comment contents for a call on `db`.
    ///
    /// Trace context values are taken from `span_context` and skipped when it
    /// is invalid.
    pub fn collect(
        db: &dyn DatabaseHandle,
        options: &CommenterOptions,
        span_context: &SpanContext,
    ) -> Self {
        let mut data = CommenterData::default();
        data.push(DB_DRIVER, db.driver_name());
        data.push(DB_FRAMEWORK, FRAMEWORK);

        if options.is_enabled(OPENTELEMETRY_VALUES) && span_context.is_valid() {
            data.push(TRACEPARENT, traceparent(span_context));
            let state = span_context.trace_state().header();
            if !state.is_empty() {
                data.push(TRACESTATE, state);
            }
        }

        data.pairs.retain(|(key, _)| options.is_enabled(key));
        data
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CommenterData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// W3C `traceparent` value for a span context.
fn traceparent(span_context: &SpanContext) -> String {
    format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    )
}

/// Percent-encode everything but unreserved characters and `/`, then double
/// every `%`.
fn quote(s: &str) -> String {
    // '%' is doubled so drivers using pyformat-style placeholders leave it alone
    urlencoding::encode(s).replace("%2F", "/").replace('%', "%%")
}

fn unquote(s: &str) -> Option<String> {
    let single = s.replace("%%", "%");
    urlencoding::decode(&single).ok().map(|v| v.into_owned())
}

/// Render the comment for `data`, including the leading space.
///
/// Returns an empty string when there is nothing to write.
pub fn generate_sql_comment(data: &CommenterData) -> String {
    if data.is_empty() {
        return String::new();
    }

    let body = data
        .pairs
        .iter()
        .map(|(key, value)| format!("{}='{}'", quote(key), quote(value)))
        .collect::<Vec<_>>()
        .join(",");

    format!(" /*{}*/", body)
}

/// Append a comment carrying `data` to `sql`.
///
/// Trailing whitespace is trimmed and a final `;` stays last.
pub fn add_sql_comment(sql: &str, data: &CommenterData) -> String {
    let comment = generate_sql_comment(data);
    if comment.is_empty() {
        return sql.to_string();
    }

    let trimmed = sql.trim_end();
    match trimmed.strip_suffix(';') {
        Some(statement) => format!("{}{};", statement, comment),
        None => format!("{}{}", trimmed, comment),
    }
}

/// Recover the pairs of a trailing comment written by [`add_sql_comment`].
pub fn parse_sql_comment(sql: &str) -> Option<CommenterData> {
    let trimmed = sql.trim_end();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
    let body = trimmed.strip_suffix("*/")?;
    let start = body.rfind("/*")?;
    let body = &body[start + 2..];

    let mut data = CommenterData::default();
    for pair in body.split(',') {
        let (key, value) = pair.split_once('=')?;
        let value = value.strip_prefix('\'')?.strip_suffix('\'')?;
        data.push(unquote(key)?, unquote(value)?);
    }
    Some(data)
}
