use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlDbError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PoolErrorPostgres(#[from] bb8::RunError<tokio_postgres::Error>),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    PoolErrorSqlite(#[from] bb8::RunError<rusqlite::Error>),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Template error: {path}: {source}")]
    TemplateError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// The query matched no rows. Every backend reports row absence through this variant.
    #[error("no rows in result set")]
    NoRows,

    #[error("transaction has already been committed or rolled back")]
    TransactionClosed,

    #[error("scan failed: {0}")]
    ScanError(String),

    #[error("error during iterating rows: {0}")]
    IterationError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SqlDbError {
    /// True for the shared "no rows" sentinel.
    #[must_use]
    pub fn is_no_rows(&self) -> bool {
        matches!(self, SqlDbError::NoRows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rows_is_distinct_from_execution_errors() {
        assert!(SqlDbError::NoRows.is_no_rows());
        assert!(!SqlDbError::ExecutionError("boom".into()).is_no_rows());
        assert_eq!(SqlDbError::NoRows.to_string(), "no rows in result set");
    }

    #[test]
    fn decode_errors_name_their_stage() {
        let scan = SqlDbError::ScanError("column 0".into());
        let iter = SqlDbError::IterationError("cursor reset".into());
        assert!(scan.to_string().starts_with("scan failed"));
        assert!(iter.to_string().starts_with("error during iterating rows"));
    }
}
