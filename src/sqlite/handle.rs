use std::sync::Arc;

use async_trait::async_trait;
use bb8::Pool;
use rusqlite::params_from_iter;
use tokio_util::sync::CancellationToken;

use crate::client::DbHandle;
use crate::error::SqlDbError;
use crate::helpers::{check_row_widths, ensure_insert, quote_ident};
use crate::notify::NotificationStream;
use crate::results::{Row, Rows};
use crate::types::{ExecResult, RowValues};

use super::config::{SharedSqliteConnection, SqliteManager, SqlitePooledConnection, run_blocking};
use super::params::Params;
use super::query;

/// Pool-backed `SQLite` handle. Every call checks out its own connection.
#[derive(Clone)]
pub struct SqliteHandle {
    pool: Pool<SqliteManager>,
}

pub(crate) async fn checkout(pool: &Pool<SqliteManager>) -> Result<SqlitePooledConnection, SqlDbError> {
    pool.get_owned()
        .await
        .map_err(|e| SqlDbError::ConnectionError(format!("sqlite checkout error: {e}")))
}

pub(crate) fn shared(conn: &SqlitePooledConnection) -> SharedSqliteConnection {
    Arc::clone(&**conn)
}

impl SqliteHandle {
    pub(crate) fn new(pool: Pool<SqliteManager>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DbHandle for SqliteHandle {
    async fn query(&self, sql: &str, params: &[RowValues]) -> Result<Rows, SqlDbError> {
        let conn = checkout(&self.pool).await?;
        query::query_rows(shared(&conn), sql, params).await
    }

    async fn query_row(&self, sql: &str, params: &[RowValues]) -> Result<Row, SqlDbError> {
        let conn = checkout(&self.pool).await?;
        query::query_row(shared(&conn), sql, params).await
    }

    async fn exec(&self, sql: &str, params: &[RowValues]) -> Result<ExecResult, SqlDbError> {
        let conn = checkout(&self.pool).await?;
        query::exec(shared(&conn), sql, params).await
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), SqlDbError> {
        let conn = checkout(&self.pool).await?;
        let sql = sql.to_string();
        run_blocking(shared(&conn), move |c| Ok(c.execute_batch(&sql)?)).await
    }

    async fn copy_from(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<RowValues>],
    ) -> Result<u64, SqlDbError> {
        check_row_widths(columns.len(), rows)?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        let cols = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO {} ({cols}) VALUES ({placeholders})", quote_ident(table));
        let batch: Vec<Params> = rows.iter().map(|row| Params::convert(row)).collect();

        let conn = checkout(&self.pool).await?;
        let copied = run_blocking(shared(&conn), move |c| {
            let tx = c.transaction()?;
            let mut copied = 0u64;
            {
                let mut stmt = tx.prepare_cached(&sql)?;
                for row in &batch {
                    stmt.execute(params_from_iter(row.as_values().iter()))?;
                    copied += 1;
                }
            }
            tx.commit()?;
            Ok(copied)
        })
        .await?;
        tracing::debug!(table, rows = copied, "sqlite copy finished");
        Ok(copied)
    }

    async fn listen(
        &self,
        _cancel: CancellationToken,
        _channel: &str,
    ) -> Result<NotificationStream, SqlDbError> {
        Err(SqlDbError::Unimplemented(
            "listen is not supported by sqlite".to_string(),
        ))
    }

    async fn insert_stmt(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ExecResult, SqlDbError> {
        ensure_insert(sql)?;
        let conn = checkout(&self.pool).await?;
        let sql = sql.to_string();
        let values = Params::convert(params);
        run_blocking(shared(&conn), move |c| {
            let affected = query::execute(c, &sql, values.as_values())?;
            Ok(ExecResult::affected(affected).with_last_insert_id(c.last_insert_rowid()))
        })
        .await
    }
}
