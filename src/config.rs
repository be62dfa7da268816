use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::SqlClient;
use crate::error::SqlDbError;
use crate::types::Dialect;

/// Liveness check applied by `init`, the only self-imposed timeout in the crate.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection descriptor for one database.
///
/// Deserialized from the application's JSON configuration:
/// ```rust
/// use sql_dialects::prelude::*;
///
/// let conf = DbConf::from_json_str(r#"{
///     "type": "pgsql",
///     "host": "127.0.0.1",
///     "port": 5432,
///     "user": "app",
///     "pw": "secret",
///     "db": "app",
///     "tz": "UTC"
/// }"#).unwrap();
/// assert_eq!(conf.dialect, Dialect::Pgsql);
/// assert_eq!(conf.pool.max_conns, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConf {
    #[serde(rename = "type")]
    pub dialect: Dialect,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    /// Driver label, informational; the backend is chosen by `dialect`.
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, rename = "pw")]
    pub password: String,
    /// Database name, or the file path for `SQLite`.
    #[serde(rename = "db")]
    pub database: String,
    /// Session time zone.
    #[serde(default = "default_tz", rename = "tz")]
    pub timezone: String,
    #[serde(default)]
    pub pool: PoolLimits,
}

fn default_tz() -> String {
    "UTC".to_string()
}

/// Pool limits exposed to configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolLimits {
    pub max_conns: u32,
    pub min_idle: Option<u32>,
    pub max_lifetime_secs: Option<u64>,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_conns: 10,
            min_idle: Some(2),
            max_lifetime_secs: Some(180),
            acquire_timeout_secs: 30,
        }
    }
}

impl PoolLimits {
    #[must_use]
    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Apply the limits to a bb8 pool builder.
    #[cfg(any(feature = "postgres", feature = "sqlite"))]
    pub(crate) fn apply<M: bb8::ManageConnection>(&self, builder: bb8::Builder<M>) -> bb8::Builder<M> {
        builder
            .max_size(self.max_conns.max(1))
            .min_idle(self.min_idle.map(|n| n.min(self.max_conns.max(1))))
            .max_lifetime(self.max_lifetime())
            .connection_timeout(self.acquire_timeout())
    }
}

impl DbConf {
    /// Parse a descriptor from JSON text.
    ///
    /// # Errors
    /// Returns `SqlDbError::ConfigError` when the JSON is malformed or names an unknown dialect.
    pub fn from_json_str(json: &str) -> Result<Self, SqlDbError> {
        serde_json::from_str(json)
            .map_err(|e| SqlDbError::ConfigError(format!("invalid db config: {e}")))
    }

    /// Read and parse a descriptor file.
    ///
    /// # Errors
    /// Returns `SqlDbError::ConfigError` when the file is unreadable or malformed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SqlDbError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SqlDbError::ConfigError(format!("cannot read db config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub(crate) fn require(&self, field: &str, value: &str) -> Result<(), SqlDbError> {
        if value.trim().is_empty() {
            Err(SqlDbError::ConfigError(format!("{field} is required")))
        } else {
            Ok(())
        }
    }

    /// Build the (uninitialized) client for the configured dialect.
    ///
    /// # Errors
    /// Returns `SqlDbError::Unimplemented` when the dialect has no backend in this build.
    pub fn build_client(&self) -> Result<Box<dyn SqlClient>, SqlDbError> {
        match self.dialect {
            #[cfg(feature = "postgres")]
            Dialect::Pgsql => Ok(Box::new(crate::postgres::PgClient::new(self.clone()))),
            #[cfg(feature = "sqlite")]
            Dialect::Sqlite => Ok(Box::new(crate::sqlite::SqliteClient::new(self.clone()))),
            #[allow(unreachable_patterns)]
            other => Err(SqlDbError::Unimplemented(format!(
                "no {other} backend in this build"
            ))),
        }
    }
}
