// SQLite backend over rusqlite and bb8.
//
// rusqlite is blocking, so every call runs on the blocking pool against a connection behind a
// tokio mutex. Rows are materialized there before being handed back.

pub mod config;
pub mod params;
pub(crate) mod query;

mod client;
mod handle;
mod prepared;
mod transaction;

pub use client::SqliteClient;
pub use config::{SharedSqliteConnection, SqliteManager, SqlitePooledConnection};
pub use handle::SqliteHandle;
pub use params::Params;
pub use prepared::SqlitePrepared;
pub use transaction::SqliteTx;
