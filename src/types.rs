use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::SqlDbError;
use crate::translation::PlaceholderStyle;

/// Values that can be stored in a database row or used as query parameters.
///
/// The same enum is used by every backend so calling code never branches on driver types:
/// ```rust
/// use sql_dialects::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    /// Booleans come back from `SQLite` as 0/1 integers, so both shapes are accepted.
    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(dt);
                }
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            RowValues::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            RowValues::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Short type label used in decode error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RowValues::Int(_) => "int",
            RowValues::Float(_) => "float",
            RowValues::Text(_) => "text",
            RowValues::Bool(_) => "bool",
            RowValues::Timestamp(_) => "timestamp",
            RowValues::Null => "null",
            RowValues::JSON(_) => "json",
            RowValues::Blob(_) => "blob",
        }
    }
}

/// SQL dialects known to the template loader.
///
/// Every dialect has a template file extension and a placeholder style. Only `Pgsql` and
/// `Sqlite` have an execution backend; the others can still be used to resolve templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Mysql,
    Pgsql,
    Mssql,
    Oracle,
    Sqlite,
}

impl Dialect {
    /// File extension that marks a template as specific to this dialect.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Dialect::Mysql => "mysql",
            Dialect::Pgsql => "pgsql",
            Dialect::Mssql => "mssql",
            Dialect::Oracle => "oracle",
            Dialect::Sqlite => "sqlite",
        }
    }

    #[must_use]
    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Dialect::Mysql => PlaceholderStyle::Generic,
            Dialect::Pgsql => PlaceholderStyle::Numbered('$'),
            Dialect::Mssql => PlaceholderStyle::Numbered('@'),
            Dialect::Oracle => PlaceholderStyle::Numbered(':'),
            // sqlite binds ?, ?N, $N, :N and @N alike
            Dialect::Sqlite => PlaceholderStyle::Any,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Dialect {
    type Err = SqlDbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Dialect::Mysql),
            "pgsql" | "postgres" | "postgresql" => Ok(Dialect::Pgsql),
            "mssql" => Ok(Dialect::Mssql),
            "oracle" => Ok(Dialect::Oracle),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(SqlDbError::ConfigError(format!("unknown dialect `{other}`"))),
        }
    }
}

/// Outcome of a write.
///
/// A call path fills only what its backend reports: `exec` reports affected rows, a
/// PostgreSQL `insert_stmt` reports the generated id, and `SQLite` reports both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    rows_affected: Option<u64>,
    last_insert_id: Option<i64>,
}

impl ExecResult {
    #[must_use]
    pub fn affected(rows: u64) -> Self {
        Self {
            rows_affected: Some(rows),
            last_insert_id: None,
        }
    }

    #[must_use]
    pub fn inserted(id: i64) -> Self {
        Self {
            rows_affected: None,
            last_insert_id: Some(id),
        }
    }

    #[must_use]
    pub fn with_last_insert_id(mut self, id: i64) -> Self {
        self.last_insert_id = Some(id);
        self
    }

    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    #[must_use]
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }
}

/// A publish/subscribe message delivered by a `listen` stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: String,
    pub payload: String,
}
