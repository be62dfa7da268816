use async_trait::async_trait;
use bb8::Pool;
use tokio::runtime::Handle;

use crate::client::Transaction;
use crate::error::SqlDbError;
use crate::results::{Row, Rows};
use crate::types::{ExecResult, RowValues};

use super::config::{SqliteManager, SqlitePooledConnection, run_blocking};
use super::handle::{checkout, shared};
use super::query;

/// A `SQLite` transaction pinned to one pooled connection.
///
/// Dropping it unfinished rolls back on the blocking pool before the connection goes back to
/// the pool, so the next checkout never sees the open transaction.
pub struct SqliteTx {
    conn: Option<SqlitePooledConnection>,
}

impl SqliteTx {
    /// Check out a connection and issue `BEGIN`.
    ///
    /// # Errors
    /// Returns `SqlDbError` if acquiring the connection or starting the transaction fails.
    pub async fn begin(pool: &Pool<SqliteManager>) -> Result<Self, SqlDbError> {
        let conn = checkout(pool).await?;
        run_blocking(shared(&conn), |c| Ok(c.execute_batch("BEGIN")?)).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&SqlitePooledConnection, SqlDbError> {
        self.conn.as_ref().ok_or(SqlDbError::TransactionClosed)
    }

    async fn finish(&mut self, sql: &'static str) -> Result<(), SqlDbError> {
        let conn = self.conn.take().ok_or(SqlDbError::TransactionClosed)?;
        run_blocking(shared(&conn), move |c| {
            if let Err(e) = c.execute_batch(sql) {
                if !c.is_autocommit() {
                    if let Err(rb) = c.execute_batch("ROLLBACK") {
                        tracing::warn!(error = %rb, "sqlite rollback after failed {sql} also failed");
                    }
                }
                return Err(e.into());
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl Transaction for SqliteTx {
    async fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Rows, SqlDbError> {
        query::query_rows(shared(self.conn()?), sql, params).await
    }

    async fn query_row(&mut self, sql: &str, params: &[RowValues]) -> Result<Row, SqlDbError> {
        query::query_row(shared(self.conn()?), sql, params).await
    }

    async fn exec(&mut self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlDbError> {
        query::exec(shared(self.conn()?), sql, params).await
    }

    async fn commit(&mut self) -> Result<(), SqlDbError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), SqlDbError> {
        self.finish("ROLLBACK").await
    }
}

fn rollback_blocking(conn: &SqlitePooledConnection) {
    let guard = shared(conn);
    let guard = guard.blocking_lock();
    if !guard.is_autocommit() {
        if let Err(e) = guard.execute_batch("ROLLBACK") {
            tracing::warn!(error = %e, "sqlite drop rollback failed");
        }
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Ok(handle) = Handle::try_current() {
                // The connection moves into the task and returns to the pool once rolled back.
                handle.spawn_blocking(move || rollback_blocking(&conn));
            } else {
                rollback_blocking(&conn);
            }
        }
    }
}
