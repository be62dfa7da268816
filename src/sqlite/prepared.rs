use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bb8::Pool;

use crate::client::PreparedStatement;
use crate::error::SqlDbError;
use crate::results::{Row, Rows};
use crate::types::{ExecResult, RowValues};

use super::config::{SqliteManager, SqlitePooledConnection, run_blocking};
use super::handle::{checkout, shared};
use super::query;

/// A statement kept in each connection's rusqlite statement cache.
pub struct SqlitePrepared {
    pool: Pool<SqliteManager>,
    sql: String,
    closed: AtomicBool,
}

impl SqlitePrepared {
    /// Compile `sql` once up front so a bad statement fails here rather than at first use.
    ///
    /// # Errors
    /// Returns the driver error when the statement does not compile.
    pub async fn new(pool: Pool<SqliteManager>, sql: &str) -> Result<Self, SqlDbError> {
        {
            let conn = checkout(&pool).await?;
            let text = sql.to_string();
            run_blocking(shared(&conn), move |c| {
                c.prepare_cached(&text)?;
                Ok(())
            })
            .await?;
        }
        Ok(Self {
            pool,
            sql: sql.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    async fn checkout(&self) -> Result<SqlitePooledConnection, SqlDbError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SqlDbError::ExecutionError(
                "prepared statement is closed".to_string(),
            ));
        }
        checkout(&self.pool).await
    }
}

#[async_trait]
impl PreparedStatement for SqlitePrepared {
    fn sql(&self) -> &str {
        &self.sql
    }

    async fn query(&self, params: &[RowValues]) -> Result<Rows, SqlDbError> {
        let conn = self.checkout().await?;
        query::query_rows(shared(&conn), &self.sql, params).await
    }

    async fn query_row(&self, params: &[RowValues]) -> Result<Row, SqlDbError> {
        let conn = self.checkout().await?;
        query::query_row(shared(&conn), &self.sql, params).await
    }

    async fn exec(&self, params: &[RowValues]) -> Result<ExecResult, SqlDbError> {
        let conn = self.checkout().await?;
        query::exec(shared(&conn), &self.sql, params).await
    }

    async fn close(&self) -> Result<(), SqlDbError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(SqlDbError::ExecutionError(
                "prepared statement already closed".to_string(),
            ));
        }
        Ok(())
    }
}
