//! Canonical vendor tags for the supported SQL backends.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// SQL backend family, used as `db.system`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Sqlite,
    MySql,
    Postgresql,
}

impl Vendor {
    /// Classify a driver or class name such as `SqliteDatabase` or
    /// `PooledPostgresqlExtDatabase`.
    ///
    /// Matching is a case-insensitive substring check in the order
    /// sqlite, mysql, postgresql; the first hit wins.
    pub fn classify(name: &str) -> Result<Self> {
        let lower = name.to_lowercase();

        if lower.contains("sqlite") {
            Ok(Vendor::Sqlite)
        } else if lower.contains("mysql") {
            Ok(Vendor::MySql)
        } else if lower.contains("postgresql") {
            Ok(Vendor::Postgresql)
        } else {
            Err(Error::UnsupportedVendor {
                name: name.to_string(),
            })
        }
    }

    /// Returns the tag as recorded in telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::Sqlite => "sqlite",
            Vendor::MySql => "mysql",
            Vendor::Postgresql => "postgresql",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vendor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Vendor::classify(s)
    }
}
