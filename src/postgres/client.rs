use async_trait::async_trait;
use bb8::Pool;

use crate::client::{DbHandle, PreparedStatement, SqlClient, Transaction};
use crate::config::{DbConf, PING_TIMEOUT};
use crate::error::SqlDbError;
use crate::types::Dialect;

use super::config::{PgManager, pg_config};
use super::handle::PgHandle;
use super::prepared::PgPrepared;
use super::transaction::PgTx;

/// PostgreSQL client owning a bb8 pool.
pub struct PgClient {
    conf: DbConf,
    pool: Option<Pool<PgManager>>,
}

impl PgClient {
    #[must_use]
    pub fn new(conf: DbConf) -> Self {
        Self { conf, pool: None }
    }

    /// Pool counters, `None` before `init` or after `close`.
    #[must_use]
    pub fn pool_state(&self) -> Option<bb8::State> {
        self.pool.as_ref().map(Pool::state)
    }

    fn pool(&self) -> Result<&Pool<PgManager>, SqlDbError> {
        self.pool.as_ref().ok_or_else(|| {
            SqlDbError::ConnectionError("postgres client is not initialized".to_string())
        })
    }
}

async fn ping(pool: &Pool<PgManager>) -> Result<(), SqlDbError> {
    let conn = pool
        .get()
        .await
        .map_err(|e| SqlDbError::ConnectionError(format!("postgres checkout error: {e}")))?;
    conn.client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| SqlDbError::ConnectionError(format!("postgres ping failed: {e}")))?;
    Ok(())
}

#[async_trait]
impl SqlClient for PgClient {
    fn dialect(&self) -> Dialect {
        Dialect::Pgsql
    }

    async fn init(&mut self) -> Result<(), SqlDbError> {
        if self.pool.is_some() {
            return Err(SqlDbError::ConfigError(
                "postgres client already initialized".to_string(),
            ));
        }
        let cfg = pg_config(&self.conf)?;
        // Building the pool opens the idle connections, so it shares the liveness window.
        let ready = async {
            let pool = PgManager::new(cfg).build_pool(&self.conf).await?;
            ping(&pool).await?;
            Ok::<_, SqlDbError>(pool)
        };
        let pool = match tokio::time::timeout(PING_TIMEOUT, ready).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SqlDbError::ConnectionError(format!(
                    "postgres did not answer within {}s",
                    PING_TIMEOUT.as_secs()
                )));
            }
        };

        tracing::info!(
            host = %self.conf.host,
            port = self.conf.port,
            db = %self.conf.database,
            max_conns = self.conf.pool.max_conns,
            "postgres pool ready"
        );
        self.pool = Some(pool);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SqlDbError> {
        if self.pool.take().is_some() {
            tracing::info!(db = %self.conf.database, "postgres pool closed");
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.pool.is_some()
    }

    fn handle(&self) -> Result<Box<dyn DbHandle>, SqlDbError> {
        Ok(Box::new(PgHandle::new(self.pool()?.clone())))
    }

    async fn begin_tx(&self) -> Result<Box<dyn Transaction>, SqlDbError> {
        let tx = PgTx::begin(self.pool()?).await?;
        Ok(Box::new(tx))
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>, SqlDbError> {
        let stmt = PgPrepared::new(self.pool()?.clone(), sql).await?;
        Ok(Box::new(stmt))
    }
}
