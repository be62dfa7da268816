//! Map rows onto caller-defined record types.
//!
//! A field extractor hands back, for a fresh `T::default()`, the write targets of its fields
//! in column order:
//! ```rust,no_run
//! use sql_dialects::prelude::*;
//!
//! #[derive(Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//!     email: Option<String>,
//! }
//!
//! # async fn run(handle: &dyn DbHandle) -> Result<(), SqlDbError> {
//! let users: Vec<User> = query_all_items(
//!     handle,
//!     "SELECT id, name, email FROM users",
//!     &[],
//!     |u: &mut User| vec![&mut u.id, &mut u.name, &mut u.email],
//! )
//! .await?;
//! # let _ = users;
//! # Ok(())
//! # }
//! ```

use crate::client::DbHandle;
use crate::error::SqlDbError;
use crate::results::{Rows, ScanTarget, Scannable};
use crate::types::RowValues;

/// Drain `rows` into items built by `extractor`.
///
/// # Errors
/// `SqlDbError::ScanError` when a row does not fit the targets (wrong column count or type)
/// or a column cannot be decoded, `SqlDbError::IterationError` when the cursor fails while
/// advancing. No items are returned in either case.
pub async fn rows_to_items<T, F>(mut rows: Rows, mut extractor: F) -> Result<Vec<T>, SqlDbError>
where
    T: Default,
    F: for<'a> FnMut(&'a mut T) -> Vec<&'a mut dyn ScanTarget>,
{
    let mut items = Vec::new();
    loop {
        let row = match rows.next().await {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e @ SqlDbError::ScanError(_)) => return Err(e),
            Err(e) => return Err(SqlDbError::IterationError(e.to_string())),
        };
        let mut item = T::default();
        row.scan(extractor(&mut item))?;
        items.push(item);
    }
    Ok(items)
}

/// Run `sql` on `handle` and map every row with `extractor`.
///
/// # Errors
/// Returns the query error, or the mapping errors of [`rows_to_items`].
pub async fn query_all_items<T, F>(
    handle: &dyn DbHandle,
    sql: &str,
    params: &[RowValues],
    extractor: F,
) -> Result<Vec<T>, SqlDbError>
where
    T: Default,
    F: for<'a> FnMut(&'a mut T) -> Vec<&'a mut dyn ScanTarget>,
{
    let rows = handle.query(sql, params).await?;
    rows_to_items(rows, extractor).await
}

/// [`rows_to_items`] for types implementing [`Scannable`].
///
/// # Errors
/// See [`rows_to_items`].
pub async fn rows_to_records<T: Scannable>(rows: Rows) -> Result<Vec<T>, SqlDbError> {
    rows_to_items(rows, T::scan_targets).await
}

/// [`query_all_items`] for types implementing [`Scannable`].
///
/// # Errors
/// See [`query_all_items`].
pub async fn query_all_records<T: Scannable>(
    handle: &dyn DbHandle,
    sql: &str,
    params: &[RowValues],
) -> Result<Vec<T>, SqlDbError> {
    query_all_items(handle, sql, params, T::scan_targets).await
}
