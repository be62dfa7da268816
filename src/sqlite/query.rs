use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use crate::error::SqlDbError;
use crate::results::{Row, Rows};
use crate::types::{ExecResult, RowValues};

use super::config::{SharedSqliteConnection, run_blocking};
use super::params::Params;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns `SqlDbError::SqliteError` if the column cannot be read.
pub fn extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<RowValues, SqlDbError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

fn extract_row(row: &rusqlite::Row<'_>, width: usize) -> Result<Vec<RowValues>, SqlDbError> {
    let mut values = Vec::with_capacity(width);
    for idx in 0..width {
        values.push(extract_value(row, idx)?);
    }
    Ok(values)
}

type Selected = (Arc<Vec<String>>, Vec<Vec<RowValues>>);

/// Run a statement and read every row. The statement is cached on the connection.
pub(crate) fn select_all(conn: &Connection, sql: &str, values: &[Value]) -> Result<Selected, SqlDbError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let width = columns.len();
    let mut rows = stmt.query(params_from_iter(values.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(extract_row(row, width)?);
    }
    Ok((Arc::new(columns), out))
}

pub(crate) fn select_first(conn: &Connection, sql: &str, values: &[Value]) -> Result<Row, SqlDbError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let width = columns.len();
    let mut rows = stmt.query(params_from_iter(values.iter()))?;
    match rows.next()? {
        Some(row) => Ok(Row::new(Arc::new(columns), extract_row(row, width)?)),
        None => Err(SqlDbError::NoRows),
    }
}

/// Run a write and report the rows it changed.
///
/// Statements that produce rows (`RETURNING`) are stepped to completion and their rows
/// discarded; the count then comes from the connection.
pub(crate) fn execute(conn: &Connection, sql: &str, values: &[Value]) -> Result<u64, SqlDbError> {
    let mut stmt = conn.prepare_cached(sql)?;
    if stmt.column_count() == 0 {
        let affected = stmt.execute(params_from_iter(values.iter()))?;
        return u64::try_from(affected).map_err(|e| {
            SqlDbError::ExecutionError(format!("sqlite affected rows conversion error: {e}"))
        });
    }
    let mut rows = stmt.query(params_from_iter(values.iter()))?;
    while rows.next()?.is_some() {}
    drop(rows);
    Ok(conn.changes())
}

pub(crate) async fn query_rows(
    conn: SharedSqliteConnection,
    sql: &str,
    params: &[RowValues],
) -> Result<Rows, SqlDbError> {
    let sql = sql.to_string();
    let values = Params::convert(params);
    let (columns, rows) = run_blocking(conn, move |c| select_all(c, &sql, values.as_values())).await?;
    Ok(Rows::buffered(columns, rows))
}

pub(crate) async fn query_row(
    conn: SharedSqliteConnection,
    sql: &str,
    params: &[RowValues],
) -> Result<Row, SqlDbError> {
    let sql = sql.to_string();
    let values = Params::convert(params);
    run_blocking(conn, move |c| select_first(c, &sql, values.as_values())).await
}

pub(crate) async fn exec(
    conn: SharedSqliteConnection,
    sql: &str,
    params: &[RowValues],
) -> Result<ExecResult, SqlDbError> {
    let sql = sql.to_string();
    let values = Params::convert(params);
    let affected = run_blocking(conn, move |c| execute(c, &sql, values.as_values())).await?;
    Ok(ExecResult::affected(affected))
}
