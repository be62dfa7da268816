use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bb8::Pool;

use crate::client::PreparedStatement;
use crate::error::SqlDbError;
use crate::results::{PgRowStream, Row, Rows};
use crate::types::{ExecResult, RowValues};

use super::config::{PgManager, PgPooledConnection, RetiredStatements};
use super::handle::checkout;
use super::query::{column_names, execute_stmt, query_first, query_stream};

/// A statement compiled on each pooled connection the first time it runs there.
///
/// Closing it retires its text: every connection drops its compiled copy at its next checkout.
pub struct PgPrepared {
    pool: Pool<PgManager>,
    sql: String,
    closed: AtomicBool,
    retired: Arc<RetiredStatements>,
}

impl PgPrepared {
    /// Compile `sql` once up front so a bad statement fails here rather than at first use.
    ///
    /// # Errors
    /// Returns the driver error when the statement does not compile.
    pub async fn new(pool: Pool<PgManager>, sql: &str) -> Result<Self, SqlDbError> {
        let retired = {
            let conn = checkout(&pool).await?;
            conn.prepare_cached(sql).await?;
            conn.retired()
        };
        Ok(Self {
            pool,
            sql: sql.to_string(),
            closed: AtomicBool::new(false),
            retired,
        })
    }

    async fn checkout(&self) -> Result<PgPooledConnection, SqlDbError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlDbError::ExecutionError(
                "prepared statement is closed".to_string(),
            ));
        }
        checkout(&self.pool).await
    }
}

#[async_trait]
impl PreparedStatement for PgPrepared {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn query(&self, params: &[RowValues]) -> Result<Rows, SqlDbError> {
        let conn = self.checkout().await?;
        let stmt = conn.prepare_cached(&self.sql).await?;
        let stream = query_stream(&conn.client, &stmt, params).await?;
        Ok(Rows::streaming(
            column_names(&stmt),
            PgRowStream {
                stream: Box::pin(stream),
                conn: Some(conn),
            },
        ))
    }

    async fn query_row(&self, params: &[RowValues]) -> Result<Row, SqlDbError> {
        let conn = self.checkout().await?;
        let stmt = conn.prepare_cached(&self.sql).await?;
        query_first(&conn.client, &stmt, params).await
    }

    async fn exec(&self, params: &[RowValues]) -> Result<ExecResult, SqlDbError> {
        let conn = self.checkout().await?;
        let stmt = conn.prepare_cached(&self.sql).await?;
        execute_stmt(&conn.client, &stmt, params).await
    }

    async fn close(&self) -> Result<(), SqlDbError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(SqlDbError::ExecutionError(
                "prepared statement already closed".to_string(),
            ));
        }
        self.retired.retire(&self.sql);
        Ok(())
    }
}
