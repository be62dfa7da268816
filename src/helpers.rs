//! Small SQL-text helpers shared by the backends.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::error::SqlDbError;
use crate::results::Row;
use crate::types::RowValues;

static RETURNING_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bRETURNING\b").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// Check the `insert_stmt` precondition: trimmed text must start with `INSERT`.
///
/// # Errors
/// Returns `SqlDbError::ExecutionError` when the statement is anything else.
pub fn ensure_insert(sql: &str) -> Result<(), SqlDbError> {
    let head = sql.trim_start();
    let starts_with_insert = head
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("INSERT"));
    if starts_with_insert {
        Ok(())
    } else {
        Err(SqlDbError::ExecutionError(
            "insert_stmt requires a statement starting with INSERT".to_string(),
        ))
    }
}

/// True when the statement already returns something to the caller.
#[must_use]
pub fn has_returning_clause(sql: &str) -> bool {
    RETURNING_CLAUSE.is_match(sql)
}

/// Quote an identifier as a single name (`my"tbl` becomes `"my""tbl"`).
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Every bulk-load row must carry exactly one value per column.
///
/// # Errors
/// Returns `SqlDbError::ParameterError` naming the first row of the wrong width.
pub fn check_row_widths(columns: usize, rows: &[Vec<RowValues>]) -> Result<(), SqlDbError> {
    match rows.iter().position(|row| row.len() != columns) {
        Some(idx) => Err(SqlDbError::ParameterError(format!(
            "copy row {idx} has {} values for {columns} columns",
            rows[idx].len()
        ))),
        None => Ok(()),
    }
}

/// Build a row by hand, mostly for tests of code that consumes `Row`.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<RowValues>) -> Row {
    Row::new(Arc::new(column_names), values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_check_is_trimmed_and_case_insensitive() {
        assert!(ensure_insert("  insert into t values (1)").is_ok());
        assert!(ensure_insert("\n\tINSERT INTO t VALUES (1)").is_ok());
        assert!(ensure_insert("UPDATE t SET a = 1").is_err());
        assert!(ensure_insert("ins").is_err());
        assert!(ensure_insert("").is_err());
    }

    #[test]
    fn returning_clause_detection_is_word_bounded() {
        assert!(has_returning_clause("INSERT INTO t (a) VALUES ($1) returning id"));
        assert!(!has_returning_clause("INSERT INTO returning_log (a) VALUES ($1)"));
    }

    #[test]
    fn row_width_mismatch_names_the_row() {
        let rows = vec![vec![RowValues::Int(1)], vec![]];
        let err = check_row_widths(1, &rows).unwrap_err();
        assert!(err.to_string().contains("row 1"));
        assert!(check_row_widths(1, &rows[..1]).is_ok());
    }

    #[test]
    fn test_row_resolves_columns_by_name() {
        let row = create_test_row(
            vec!["id".into(), "name".into()],
            vec![RowValues::Int(3), RowValues::Text("cat".into())],
        );
        assert_eq!(row.get("name").and_then(RowValues::as_text), Some("cat"));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn quotes_embedded_double_quotes() {
        assert_eq!(quote_ident("events"), "\"events\"");
        assert_eq!(quote_ident("my\"tbl"), "\"my\"\"tbl\"");
    }
}
