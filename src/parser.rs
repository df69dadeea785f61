//! Span naming from SQL text.
//!
//! The query is not parsed. Only its first word is used, after removing a
//! leading block comment such as one written by [`add_sql_comment`] on a
//! previous hop.
//!
//! [`add_sql_comment`]: crate::add_sql_comment

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::vendor::Vendor;

// Non-greedy, so only the first comment is removed
static LEADING_COMMENT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*/\*.*?\*/").unwrap());

/// Remove one leading `/* ... */` comment from a statement.
pub fn strip_leading_comment(sql: &str) -> Cow<'_, str> {
    LEADING_COMMENT_REGEX.replace(sql, "")
}

/// The first whitespace-delimited token of a statement, ignoring a leading
/// block comment.
pub fn operation_verb(sql: &str) -> Option<String> {
    strip_leading_comment(sql)
        .split_whitespace()
        .next()
        .map(str::to_string)
}

/// Build the display name of an execute span.
///
/// Format: "{VERB} {database}", "{VERB}", "{database}" or, when neither is
/// known, the vendor tag.
pub fn operation_name(vendor: Vendor, database: Option<&str>, sql: &str) -> String {
    let mut parts = Vec::with_capacity(2);

    if let Some(verb) = operation_verb(sql) {
        parts.push(verb);
    }
    if let Some(name) = database.filter(|name| !name.is_empty()) {
        parts.push(name.to_string());
    }

    if parts.is_empty() {
        return vendor.as_str().to_string();
    }
    parts.join(" ")
}
