use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::{StreamExt, pin_mut};
use serde_json::Value;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, RowStream, Statement};

use crate::error::SqlDbError;
use crate::results::{Row, Rows};
use crate::types::{ExecResult, RowValues};

use super::params::Params;

/// Extract one `RowValues` from a `tokio_postgres` row at the given index.
///
/// # Errors
/// Returns `SqlDbError::PostgresError` if the column cannot be decoded.
pub fn extract_value(row: &tokio_postgres::Row, idx: usize) -> Result<RowValues, SqlDbError> {
    let type_info = row.columns()[idx].type_();

    let value = match *type_info {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| RowValues::Int(i64::from(v))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(RowValues::Float),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| RowValues::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .and_then(|v| v.and_hms_opt(0, 0, 0))
            .map(RowValues::Timestamp),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?.map(RowValues::JSON),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob),
        // Text types and anything else that decodes as a string.
        _ => row.try_get::<_, Option<String>>(idx)?.map(RowValues::Text),
    };
    Ok(value.unwrap_or(RowValues::Null))
}

/// Extract every column of a row.
///
/// # Errors
/// Returns the first column decode error.
pub fn extract_row(row: &tokio_postgres::Row) -> Result<Vec<RowValues>, SqlDbError> {
    let mut values = Vec::with_capacity(row.len());
    for idx in 0..row.len() {
        values.push(extract_value(row, idx)?);
    }
    Ok(values)
}

pub(crate) fn column_names(stmt: &Statement) -> Arc<Vec<String>> {
    Arc::new(
        stmt.columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect(),
    )
}

/// Start streaming the rows of a compiled statement.
pub(crate) async fn query_stream(
    client: &Client,
    stmt: &Statement,
    params: &[RowValues],
) -> Result<RowStream, SqlDbError> {
    let converted = Params::convert(params);
    let stream = client
        .query_raw(stmt, converted.as_refs().iter().copied())
        .await?;
    Ok(stream)
}

/// First row of a compiled statement, or `NoRows`. Later rows are discarded.
pub(crate) async fn query_first(
    client: &Client,
    stmt: &Statement,
    params: &[RowValues],
) -> Result<Row, SqlDbError> {
    let stream = query_stream(client, stmt, params).await?;
    pin_mut!(stream);
    match stream.next().await {
        Some(Ok(row)) => Ok(Row::new(column_names(stmt), extract_row(&row)?)),
        Some(Err(e)) => Err(SqlDbError::from(e)),
        None => Err(SqlDbError::NoRows),
    }
}

/// Read every row of a compiled statement into memory.
pub(crate) async fn query_buffered(
    client: &Client,
    stmt: &Statement,
    params: &[RowValues],
) -> Result<Rows, SqlDbError> {
    let converted = Params::convert(params);
    let rows = client.query(stmt, converted.as_refs()).await?;
    let mut values = Vec::with_capacity(rows.len());
    for row in &rows {
        values.push(extract_row(row)?);
    }
    Ok(Rows::buffered(column_names(stmt), values))
}

pub(crate) async fn execute(
    client: &Client,
    sql: &str,
    params: &[RowValues],
) -> Result<ExecResult, SqlDbError> {
    let converted = Params::convert(params);
    let rows = client.execute(sql, converted.as_refs()).await?;
    Ok(ExecResult::affected(rows))
}

pub(crate) async fn execute_stmt(
    client: &Client,
    stmt: &Statement,
    params: &[RowValues],
) -> Result<ExecResult, SqlDbError> {
    let converted = Params::convert(params);
    let rows = client.execute(stmt, converted.as_refs()).await?;
    Ok(ExecResult::affected(rows))
}
