#![forbid(unsafe_code)]

//! Dialect-neutral SQL templates executed through one async API.
//!
//! Statements live in template bundles as `<name>.sql` files written with `?` placeholders,
//! optionally overridden per dialect by `<name>.<dialect>` files. The [`registry`] resolves
//! them for the configured dialect, [`prepared::PreparedStore`] compiles the ones the
//! application needs at startup, and every backend executes through the same
//! [`client::DbHandle`] surface.
//!
//! ```rust,no_run
//! use sql_dialects::prelude::*;
//!
//! # async fn run() -> Result<(), SqlDbError> {
//! let conf = DbConf::from_json_file("db.json")?;
//! let registry = TemplateLoader::new(conf.dialect)
//!     .load(vec![TemplateSource::dir("users", "sql/users")])?;
//!
//! let mut client = conf.build_client()?;
//! client.init().await?;
//!
//! let key = StatementKey::new("users", "findall");
//! let store = PreparedStore::prepare_stmts_in_db(client.as_ref(), &registry, &[key.clone()]).await?;
//! let rows = store.require(&key)?.query(&[]).await?.collect().await?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod helpers;
pub mod lifecycle;
pub mod mapper;
pub mod notify;
pub mod prelude;
pub mod prepared;
pub mod registry;
pub mod results;
pub mod translation;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use client::{DbHandle, PreparedStatement, SqlClient, Transaction};
pub use config::{DbConf, PoolLimits};
pub use error::SqlDbError;
pub use types::{Dialect, ExecResult, Notification, RowValues};
