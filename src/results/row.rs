use std::sync::Arc;

use crate::error::SqlDbError;
use crate::types::RowValues;

use super::scan::ScanTarget;

/// A row from a database query result.
///
/// Column names are shared by every row of the same result.
#[derive(Debug, Clone)]
pub struct Row {
    column_names: Arc<Vec<String>>,
    values: Vec<RowValues>,
}

impl Row {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        Self {
            column_names,
            values,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    /// Decode the row into `targets`, one per column, in column order.
    ///
    /// # Errors
    /// Returns `SqlDbError::ScanError` when the number of targets differs from the number of
    /// columns or a column value cannot be stored in its target.
    pub fn scan(&self, targets: Vec<&mut dyn ScanTarget>) -> Result<(), SqlDbError> {
        if targets.len() != self.values.len() {
            return Err(SqlDbError::ScanError(format!(
                "expected {} destination arguments, got {}",
                self.values.len(),
                targets.len()
            )));
        }
        for (idx, (target, value)) in targets.into_iter().zip(&self.values).enumerate() {
            target.scan_value(value).map_err(|msg| {
                let column = self.column_names.get(idx).map_or("?", String::as_str);
                SqlDbError::ScanError(format!("column {idx} (`{column}`): {msg}"))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            Arc::new(vec!["id".into(), "name".into()]),
            vec![RowValues::Int(7), RowValues::Text("ada".into())],
        )
    }

    #[test]
    fn looks_up_by_name_and_index() {
        let row = sample();
        assert_eq!(row.get("name").and_then(RowValues::as_text), Some("ada"));
        assert_eq!(row.get_by_index(0), Some(&RowValues::Int(7)));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn scans_into_typed_targets() {
        let row = sample();
        let mut id = 0i64;
        let mut name = String::new();
        row.scan(vec![&mut id, &mut name]).unwrap();
        assert_eq!((id, name.as_str()), (7, "ada"));
    }

    #[test]
    fn target_count_mismatch_is_a_scan_error() {
        let row = sample();
        let mut id = 0i64;
        let err = row.scan(vec![&mut id]).unwrap_err();
        assert!(matches!(err, SqlDbError::ScanError(_)));
    }

    #[test]
    fn type_mismatch_names_the_column() {
        let row = sample();
        let mut a = 0i64;
        let mut b = 0i64;
        let err = row.scan(vec![&mut a, &mut b]).unwrap_err();
        assert!(err.to_string().contains("`name`"));
    }
}
