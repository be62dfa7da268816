use async_trait::async_trait;
use bb8::Pool;
use tokio::runtime::Handle;

use crate::client::Transaction;
use crate::error::SqlDbError;
use crate::results::{Row, Rows};
use crate::types::{ExecResult, RowValues};

use super::config::{PgManager, PgPooledConnection};
use super::handle::checkout;
use super::query::{execute, query_buffered, query_first};

/// A PostgreSQL transaction pinned to one pooled connection.
///
/// Rows read inside the transaction are buffered, the connection stays with the transaction.
/// Ad hoc statements are compiled per call and not cached on the connection.
pub struct PgTx {
    conn: Option<PgPooledConnection>,
}

impl PgTx {
    /// Check out a connection and issue `BEGIN`.
    ///
    /// # Errors
    /// Returns `SqlDbError` if acquiring the connection or starting the transaction fails.
    pub async fn begin(pool: &Pool<PgManager>) -> Result<Self, SqlDbError> {
        let conn = checkout(pool).await?;
        conn.client.batch_execute("BEGIN").await?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&PgPooledConnection, SqlDbError> {
        self.conn.as_ref().ok_or(SqlDbError::TransactionClosed)
    }

    async fn finish(&mut self, sql: &str) -> Result<(), SqlDbError> {
        // The connection is released whatever the outcome.
        let conn = self.conn.take().ok_or(SqlDbError::TransactionClosed)?;
        if let Err(e) = conn.client.batch_execute(sql).await {
            if let Err(rb) = conn.client.batch_execute("ROLLBACK").await {
                tracing::warn!(error = %rb, "postgres rollback after failed {sql} also failed");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl Transaction for PgTx {
    async fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Rows, SqlDbError> {
        let conn = self.conn()?;
        let stmt = conn.client.prepare(sql).await?;
        query_buffered(&conn.client, &stmt, params).await
    }

    async fn query_row(&mut self, sql: &str, params: &[RowValues]) -> Result<Row, SqlDbError> {
        let conn = self.conn()?;
        let stmt = conn.client.prepare(sql).await?;
        query_first(&conn.client, &stmt, params).await
    }

    async fn exec(&mut self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlDbError> {
        let conn = self.conn()?;
        execute(&conn.client, sql, params).await
    }

    async fn commit(&mut self) -> Result<(), SqlDbError> {
        self.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), SqlDbError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for PgTx {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            match Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = conn.client.batch_execute("ROLLBACK").await {
                            tracing::warn!(error = %e, "postgres drop rollback failed");
                        }
                    });
                }
                Err(_) => {
                    // Closing the session ends the transaction on the server.
                    let mut conn = conn;
                    conn.mark_broken();
                    tracing::warn!(
                        "postgres transaction dropped outside a runtime; connection discarded"
                    );
                }
            }
        }
    }
}
