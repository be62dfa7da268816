use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bb8::{ManageConnection, Pool, PooledConnection};
use tokio::sync::Mutex;

use crate::config::DbConf;
use crate::error::SqlDbError;

/// How long a statement waits on a locked database file before failing with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A rusqlite connection shared between the pool and the blocking worker.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// A pooled `SQLite` connection as handed out by bb8.
pub type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

/// bb8 manager opening one rusqlite connection per pool slot.
///
/// Every connection opens the file independently, so `:memory:` gives each slot its own
/// database; use a file path when more than one connection is configured.
pub struct SqliteManager {
    path: PathBuf,
}

impl SqliteManager {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build a pool from the descriptor.
    ///
    /// # Errors
    /// Returns `SqlDbError::ConfigError` when no database path is configured, or
    /// `SqlDbError::ConnectionError` when the initial connections cannot be opened.
    pub async fn build_pool(conf: &DbConf) -> Result<Pool<SqliteManager>, SqlDbError> {
        conf.require("db", &conf.database)?;
        conf.pool
            .apply(Pool::builder())
            .build(SqliteManager::new(&conf.database))
            .await
            .map_err(|e| SqlDbError::ConnectionError(format!("sqlite pool error: {e}")))
    }
}

fn open(path: &PathBuf) -> Result<rusqlite::Connection, rusqlite::Error> {
    let conn = rusqlite::Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    Ok(conn)
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = rusqlite::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.path.clone();
        async move {
            let conn = open(&path)?;
            tracing::debug!(path = %path.display(), "sqlite connection opened");
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            let guard = conn.lock().await;
            guard.query_row("SELECT 1", [], |_| Ok(()))
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Run `func` against the connection on tokio's blocking pool.
///
/// # Errors
/// Returns whatever `func` returns, or `SqlDbError::ExecutionError` if the blocking task panicked.
pub(crate) async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, SqlDbError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlDbError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| SqlDbError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}
