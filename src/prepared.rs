use std::collections::HashMap;

use crate::client::{PreparedStatement, SqlClient};
use crate::error::SqlDbError;
use crate::registry::{Registry, StatementKey};

/// Statements compiled at startup, looked up by registry key.
///
/// Read-only once built; every handle is safe to share between concurrent callers because the
/// backends cache the compiled form per pooled connection.
#[derive(Default)]
pub struct PreparedStore {
    stmts: HashMap<StatementKey, Box<dyn PreparedStatement>>,
}

impl PreparedStore {
    /// Resolve every key in `registry`, then compile each statement on `client`.
    ///
    /// Resolution happens first: an unknown key fails the call before anything is compiled.
    ///
    /// # Errors
    /// Returns `SqlDbError::ConfigError` for an unknown key, a registry resolved for another
    /// dialect, or a statement the database refuses to compile. Treat it as fatal at startup.
    pub async fn prepare_stmts_in_db(
        client: &dyn SqlClient,
        registry: &Registry,
        keys: &[StatementKey],
    ) -> Result<Self, SqlDbError> {
        if registry.dialect() != client.dialect() {
            return Err(SqlDbError::ConfigError(format!(
                "registry was loaded for {} but the client speaks {}",
                registry.dialect(),
                client.dialect()
            )));
        }

        let mut resolved = Vec::with_capacity(keys.len());
        for key in keys {
            let sql = registry.require(key).inspect_err(|e| {
                tracing::error!(key = %key, error = %e, "prepared stmt lookup failed");
            })?;
            resolved.push((key.clone(), sql));
        }

        let mut stmts = HashMap::with_capacity(resolved.len());
        for (key, sql) in resolved {
            match client.prepare(sql).await {
                Ok(stmt) => {
                    stmts.insert(key, stmt);
                }
                Err(e) => {
                    tracing::error!(key = %key, error = %e, "prepared stmt compilation failed");
                    return Err(SqlDbError::ConfigError(format!(
                        "cannot prepare `{key}`: {e}"
                    )));
                }
            }
        }

        tracing::info!(dialect = %client.dialect(), count = stmts.len(), "prepared stmts ready");
        Ok(Self { stmts })
    }

    #[must_use]
    pub fn get(&self, key: &StatementKey) -> Option<&dyn PreparedStatement> {
        self.stmts.get(key).map(|stmt| &**stmt)
    }

    /// Look up a statement that must have been prepared.
    ///
    /// # Errors
    /// Returns `SqlDbError::ConfigError` when `key` was not part of the prepared set.
    pub fn require(&self, key: &StatementKey) -> Result<&dyn PreparedStatement, SqlDbError> {
        self.get(key).ok_or_else(|| {
            SqlDbError::ConfigError(format!("statement `{key}` was not prepared"))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    /// Close every statement and empty the store. Failures are logged and skipped.
    ///
    /// Returns how many statements failed to close.
    pub async fn close_all(&mut self) -> usize {
        let mut failures = 0;
        for (key, stmt) in self.stmts.drain() {
            if let Err(e) = stmt.close().await {
                failures += 1;
                tracing::warn!(key = %key, error = %e, "closing prepared stmt failed");
            }
        }
        failures
    }
}

impl std::fmt::Debug for PreparedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.stmts.keys().map(ToString::to_string).collect();
        keys.sort();
        f.debug_struct("PreparedStore").field("stmts", &keys).finish()
    }
}
