use std::sync::Arc;

#[cfg(feature = "postgres")]
use std::pin::Pin;

#[cfg(feature = "postgres")]
use futures_util::StreamExt;

use crate::error::SqlDbError;
use crate::types::RowValues;

use super::row::Row;

/// A PostgreSQL row stream plus the pooled connection it was read from, if the stream owns
/// one. Dropping it returns the connection to the pool.
#[cfg(feature = "postgres")]
pub(crate) struct PgRowStream {
    pub(crate) stream: Pin<Box<tokio_postgres::RowStream>>,
    pub(crate) conn: Option<crate::postgres::PgPooledConnection>,
}

enum RowSource {
    Buffered(std::vec::IntoIter<Vec<RowValues>>),
    #[cfg(feature = "postgres")]
    Postgres(PgRowStream),
    Closed,
}

/// A sequence of rows produced by `query`.
///
/// PostgreSQL rows are streamed from the server and the pooled connection is held until the
/// sequence is exhausted, [`close`](Rows::close)d or dropped. `SQLite` rows are read on the
/// blocking worker and buffered before the sequence is returned.
pub struct Rows {
    columns: Arc<Vec<String>>,
    source: RowSource,
}

impl Rows {
    pub(crate) fn buffered(columns: Arc<Vec<String>>, rows: Vec<Vec<RowValues>>) -> Self {
        Self {
            columns,
            source: RowSource::Buffered(rows.into_iter()),
        }
    }

    #[cfg(feature = "postgres")]
    pub(crate) fn streaming(columns: Arc<Vec<String>>, stream: PgRowStream) -> Self {
        Self {
            columns,
            source: RowSource::Postgres(stream),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// True once the sequence has been drained or closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.source, RowSource::Closed)
    }

    /// Advance to the next row; `Ok(None)` once the sequence is exhausted.
    ///
    /// # Errors
    /// `ScanError` when a column cannot be decoded, the driver error when the cursor fails
    /// mid-stream. The sequence is closed afterwards either way.
    pub async fn next(&mut self) -> Result<Option<Row>, SqlDbError> {
        let next = match &mut self.source {
            RowSource::Closed => return Ok(None),
            RowSource::Buffered(rows) => Ok(rows.next()),
            #[cfg(feature = "postgres")]
            RowSource::Postgres(pg) => match pg.stream.as_mut().next().await {
                Some(Ok(row)) => crate::postgres::query::extract_row(&row)
                    .map(Some)
                    .map_err(|e| SqlDbError::ScanError(format!("decoding row: {e}"))),
                Some(Err(e)) => Err(SqlDbError::from(e)),
                None => Ok(None),
            },
        };
        match next {
            Ok(Some(values)) => Ok(Some(Row::new(Arc::clone(&self.columns), values))),
            Ok(None) => {
                self.close();
                Ok(None)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    /// Release the cursor and, for streamed rows, the pooled connection.
    pub fn close(&mut self) {
        self.source = RowSource::Closed;
    }

    /// Drain the remaining rows into memory.
    ///
    /// # Errors
    /// Returns the first error reported while advancing.
    pub async fn collect(mut self) -> Result<Vec<Row>, SqlDbError> {
        let mut out = Vec::new();
        while let Some(row) = self.next().await? {
            out.push(row);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            RowSource::Buffered(rows) => format!("Buffered({} left)", rows.len()),
            #[cfg(feature = "postgres")]
            RowSource::Postgres(_) => "Postgres".to_string(),
            RowSource::Closed => "Closed".to_string(),
        };
        f.debug_struct("Rows")
            .field("columns", &self.columns)
            .field("source", &source)
            .finish()
    }
}
