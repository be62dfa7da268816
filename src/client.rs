//! The capability set every backend implements.
//!
//! A backend provides one [`SqlClient`] that owns the pool, and hands out [`DbHandle`]s,
//! [`Transaction`]s and [`PreparedStatement`]s bound to it. Which backend runs is decided once
//! at startup from [`DbConf`](crate::config::DbConf); calling code only sees the traits.
//!
//! Every async operation is cancelled by dropping its future, so a caller deadline is
//! `tokio::time::timeout(deadline, handle.query(..))`. Only `init` applies its own timeout.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SqlDbError;
use crate::notify::NotificationStream;
use crate::results::{Row, Rows};
use crate::types::{Dialect, ExecResult, RowValues};

/// Owns the connection pool for one database.
#[async_trait]
pub trait SqlClient: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Build the pool and check that the database answers.
    ///
    /// # Errors
    /// `ConfigError` for a malformed descriptor or a second call, `ConnectionError` when the
    /// host is unreachable, credentials are rejected or the liveness check times out.
    async fn init(&mut self) -> Result<(), SqlDbError>;

    /// Release the pool. Safe on a client that was never initialized, and idempotent.
    ///
    /// # Errors
    /// Reserved for backends whose shutdown can fail; the bundled backends always succeed.
    fn close(&mut self) -> Result<(), SqlDbError>;

    fn is_initialized(&self) -> bool;

    /// A handle executing against the pool.
    ///
    /// # Errors
    /// `ConnectionError` when the client is not initialized.
    fn handle(&self) -> Result<Box<dyn DbHandle>, SqlDbError>;

    /// Check out a dedicated connection and open a transaction on it.
    ///
    /// # Errors
    /// `ConnectionError` when no connection can be acquired, or the driver error from `BEGIN`.
    async fn begin_tx(&self) -> Result<Box<dyn Transaction>, SqlDbError>;

    /// Compile `sql` and return a handle reusable across concurrent callers.
    ///
    /// # Errors
    /// Returns the driver error when the statement does not compile.
    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>, SqlDbError>;
}

/// The uniform execution surface of a backend.
#[async_trait]
pub trait DbHandle: Send + Sync {
    /// Run a read and return its rows.
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<Rows, SqlDbError>;

    /// Run a read and return its first row, or [`SqlDbError::NoRows`].
    async fn query_row(&self, sql: &str, params: &[RowValues]) -> Result<Row, SqlDbError>;

    /// Run a write or DDL statement and report the affected rows.
    async fn exec(&self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlDbError>;

    /// Run several parameterless statements in one round trip.
    async fn execute_batch(&self, sql: &str) -> Result<(), SqlDbError>;

    /// Bulk-load `rows` into `table` through the backend's fastest path. All or nothing.
    async fn copy_from(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<RowValues>],
    ) -> Result<u64, SqlDbError>;

    /// Subscribe to `channel`; see [`NotificationStream`].
    async fn listen(
        &self,
        cancel: CancellationToken,
        channel: &str,
    ) -> Result<NotificationStream, SqlDbError>;

    /// Run a single-row INSERT and report the generated id.
    ///
    /// The statement must start with `INSERT`; anything else is rejected before the pool is
    /// touched.
    async fn insert_stmt(&self, sql: &str, params: &[RowValues])
    -> Result<ExecResult, SqlDbError>;
}

/// A transaction pinned to one pooled connection.
///
/// The connection goes back to the pool on the first `commit` or `rollback`; any later call
/// returns [`SqlDbError::TransactionClosed`]. Dropping an unfinished transaction rolls it back.
#[async_trait]
pub trait Transaction: Send {
    async fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Rows, SqlDbError>;

    async fn query_row(&mut self, sql: &str, params: &[RowValues]) -> Result<Row, SqlDbError>;

    async fn exec(&mut self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlDbError>;

    async fn commit(&mut self) -> Result<(), SqlDbError>;

    async fn rollback(&mut self) -> Result<(), SqlDbError>;
}

/// A statement compiled once and executed many times.
#[async_trait]
pub trait PreparedStatement: Send + Sync {
    fn sql(&self) -> &str;

    async fn query(&self, params: &[RowValues]) -> Result<Rows, SqlDbError>;

    async fn query_row(&self, params: &[RowValues]) -> Result<Row, SqlDbError>;

    async fn exec(&self, params: &[RowValues]) -> Result<ExecResult, SqlDbError>;

    /// Stop using the statement. Later calls fail with `ExecutionError`.
    ///
    /// # Errors
    /// `ExecutionError` when the statement was already closed.
    async fn close(&self) -> Result<(), SqlDbError>;
}
