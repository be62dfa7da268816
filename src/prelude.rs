//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::client::{DbHandle, PreparedStatement, SqlClient, Transaction};
pub use crate::config::{DbConf, PoolLimits};
pub use crate::error::SqlDbError;
pub use crate::helpers::create_test_row;
pub use crate::lifecycle::{NamedClient, ReleaseReport, close_client, release_all};
pub use crate::mapper::{query_all_items, query_all_records, rows_to_items, rows_to_records};
pub use crate::notify::NotificationStream;
pub use crate::prepared::PreparedStore;
pub use crate::registry::{
    DirBundle, Registry, StatementKey, StaticBundle, TemplateBundle, TemplateLoader,
    TemplateSource,
};
pub use crate::results::{Row, Rows, ScanTarget, Scannable};
pub use crate::translation::{PlaceholderStyle, convert_placeholders};
pub use crate::types::{Dialect, ExecResult, Notification, RowValues};

pub use tokio_util::sync::CancellationToken;

#[cfg(feature = "postgres")]
pub use crate::postgres::PgClient;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteClient;
