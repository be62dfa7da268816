use async_trait::async_trait;
use bb8::Pool;
use tokio_util::sync::CancellationToken;

use crate::client::DbHandle;
use crate::error::SqlDbError;
use crate::helpers::{ensure_insert, has_returning_clause};
use crate::notify::NotificationStream;
use crate::results::{PgRowStream, Row, Rows};
use crate::types::{ExecResult, RowValues};

use super::config::{PgManager, PgPooledConnection};
use super::query::{column_names, execute, extract_value, query_first, query_stream};

/// Pool-backed PostgreSQL handle. Every call checks out its own connection.
#[derive(Clone)]
pub struct PgHandle {
    pool: Pool<PgManager>,
}

impl PgHandle {
    pub(crate) fn new(pool: Pool<PgManager>) -> Self {
        Self { pool }
    }

    pub(crate) async fn checkout(&self) -> Result<PgPooledConnection, SqlDbError> {
        checkout(&self.pool).await
    }
}

pub(crate) async fn checkout(pool: &Pool<PgManager>) -> Result<PgPooledConnection, SqlDbError> {
    let conn = pool
        .get_owned()
        .await
        .map_err(|e| SqlDbError::ConnectionError(format!("postgres checkout error: {e}")))?;
    let evicted = conn.purge_retired();
    if evicted > 0 {
        tracing::debug!(evicted, "released closed postgres statements");
    }
    Ok(conn)
}

#[async_trait]
impl DbHandle for PgHandle {
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<Rows, SqlDbError> {
        let conn = self.checkout().await?;
        let stmt = conn.client.prepare(sql).await?;
        let stream = query_stream(&conn.client, &stmt, params).await?;
        Ok(Rows::streaming(
            column_names(&stmt),
            PgRowStream {
                stream: Box::pin(stream),
                conn: Some(conn),
            },
        ))
    }

    async fn query_row(&self, sql: &str, params: &[RowValues]) -> Result<Row, SqlDbError> {
        let conn = self.checkout().await?;
        let stmt = conn.client.prepare(sql).await?;
        query_first(&conn.client, &stmt, params).await
    }

    async fn exec(&self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlDbError> {
        let conn = self.checkout().await?;
        execute(&conn.client, sql, params).await
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), SqlDbError> {
        let conn = self.checkout().await?;
        conn.client.batch_execute(sql).await?;
        Ok(())
    }

    async fn copy_from(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<RowValues>],
    ) -> Result<u64, SqlDbError> {
        let conn = self.checkout().await?;
        super::copy::copy_rows(&conn.client, table, columns, rows).await
    }

    async fn listen(
        &self,
        cancel: CancellationToken,
        channel: &str,
    ) -> Result<NotificationStream, SqlDbError> {
        let conn = self.checkout().await?;
        super::listen::spawn_listener(conn, cancel, channel).await
    }

    async fn insert_stmt(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecResult, SqlDbError> {
        ensure_insert(sql)?;
        if has_returning_clause(sql) {
            return self.exec(sql, params).await;
        }

        let sql = format!("{} RETURNING id", sql.trim_end().trim_end_matches(';'));
        let conn = self.checkout().await?;
        let stmt = conn.client.prepare(&sql).await?;
        let row = conn
            .client
            .query_one(&stmt, super::Params::convert(params).as_refs())
            .await?;
        match extract_value(&row, 0)? {
            RowValues::Int(id) => Ok(ExecResult::inserted(id)),
            other => Err(SqlDbError::ExecutionError(format!(
                "insert returned a non-integer id ({})",
                other.kind()
            ))),
        }
    }
}
