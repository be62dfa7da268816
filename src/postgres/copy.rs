use std::fmt::Write as _;

use futures_util::{SinkExt, pin_mut};
use tokio_postgres::Client;
use tokio_util::bytes::Bytes;

use crate::error::SqlDbError;
use crate::helpers::{check_row_widths, quote_ident};
use crate::types::RowValues;

/// Rows encoded per `CopyInSink::send`.
const ROWS_PER_CHUNK: usize = 1024;

fn escape_text(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
}

/// Append one field in COPY text format.
fn encode_field(out: &mut String, value: &RowValues) {
    match value {
        RowValues::Null => out.push_str("\\N"),
        RowValues::Int(i) => {
            let _ = write!(out, "{i}");
        }
        RowValues::Float(f) => {
            let _ = write!(out, "{f}");
        }
        RowValues::Bool(b) => out.push(if *b { 't' } else { 'f' }),
        RowValues::Text(s) => escape_text(out, s),
        RowValues::Timestamp(dt) => {
            let _ = write!(out, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f"));
        }
        RowValues::JSON(v) => escape_text(out, &v.to_string()),
        RowValues::Blob(bytes) => {
            // bytea hex form; the backslash itself is escaped for COPY.
            out.push_str("\\\\x");
            for b in bytes {
                let _ = write!(out, "{b:02x}");
            }
        }
    }
}

pub(crate) fn encode_row(out: &mut String, row: &[RowValues]) {
    for (i, value) in row.iter().enumerate() {
        if i > 0 {
            out.push('\t');
        }
        encode_field(out, value);
    }
    out.push('\n');
}

pub(crate) fn copy_statement(table: &str, columns: &[&str]) -> String {
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!("COPY {} ({cols}) FROM STDIN", quote_ident(table))
}

/// Stream `rows` through `COPY ... FROM STDIN`. The server applies all rows or none.
pub(crate) async fn copy_rows(
    client: &Client,
    table: &str,
    columns: &[&str],
    rows: &[Vec<RowValues>],
) -> Result<u64, SqlDbError> {
    check_row_widths(columns.len(), rows)?;
    let sink = client.copy_in(&copy_statement(table, columns)).await?;
    pin_mut!(sink);
    for chunk in rows.chunks(ROWS_PER_CHUNK) {
        let mut buf = String::new();
        for row in chunk {
            encode_row(&mut buf, row);
        }
        sink.send(Bytes::from(buf)).await?;
    }
    let copied = sink.finish().await?;
    tracing::debug!(table, rows = copied, "postgres copy finished");
    Ok(copied)
}
