use async_trait::async_trait;
use bb8::Pool;

use crate::client::{DbHandle, PreparedStatement, SqlClient, Transaction};
use crate::config::{DbConf, PING_TIMEOUT};
use crate::error::SqlDbError;
use crate::types::Dialect;

use super::config::{SqliteManager, run_blocking};
use super::handle::{SqliteHandle, checkout, shared};
use super::prepared::SqlitePrepared;
use super::transaction::SqliteTx;

/// `SQLite` client owning a bb8 pool of file connections.
pub struct SqliteClient {
    conf: DbConf,
    pool: Option<Pool<SqliteManager>>,
}

impl SqliteClient {
    #[must_use]
    pub fn new(conf: DbConf) -> Self {
        Self { conf, pool: None }
    }

    /// Pool counters, `None` before `init` or after `close`.
    #[must_use]
    pub fn pool_state(&self) -> Option<bb8::State> {
        self.pool.as_ref().map(Pool::state)
    }

    fn pool(&self) -> Result<&Pool<SqliteManager>, SqlDbError> {
        self.pool.as_ref().ok_or_else(|| {
            SqlDbError::ConnectionError("sqlite client is not initialized".to_string())
        })
    }
}

async fn ping(pool: &Pool<SqliteManager>) -> Result<(), SqlDbError> {
    let conn = checkout(pool).await?;
    run_blocking(shared(&conn), |c| Ok(c.query_row("SELECT 1", [], |_| Ok(()))?)).await
}

#[async_trait]
impl SqlClient for SqliteClient {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn init(&mut self) -> Result<(), SqlDbError> {
        if self.pool.is_some() {
            return Err(SqlDbError::ConfigError(
                "sqlite client already initialized".to_string(),
            ));
        }
        let ready = async {
            let pool = SqliteManager::build_pool(&self.conf).await?;
            ping(&pool)
                .await
                .map_err(|e| SqlDbError::ConnectionError(format!("sqlite ping failed: {e}")))?;
            Ok::<_, SqlDbError>(pool)
        };
        let pool = match tokio::time::timeout(PING_TIMEOUT, ready).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SqlDbError::ConnectionError(format!(
                    "sqlite did not answer within {}s",
                    PING_TIMEOUT.as_secs()
                )));
            }
        };

        tracing::info!(
            path = %self.conf.database,
            max_conns = self.conf.pool.max_conns,
            "sqlite pool ready"
        );
        self.pool = Some(pool);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SqlDbError> {
        if self.pool.take().is_some() {
            tracing::info!(path = %self.conf.database, "sqlite pool closed");
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.pool.is_some()
    }

    fn handle(&self) -> Result<Box<dyn DbHandle>, SqlDbError> {
        Ok(Box::new(SqliteHandle::new(self.pool()?.clone())))
    }

    async fn begin_tx(&self) -> Result<Box<dyn Transaction>, SqlDbError> {
        let tx = SqliteTx::begin(self.pool()?).await?;
        Ok(Box::new(tx))
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>, SqlDbError> {
        let stmt = SqlitePrepared::new(self.pool()?.clone(), sql).await?;
        Ok(Box::new(stmt))
    }
}
