// PostgreSQL backend over tokio-postgres and bb8.
//
// - config: descriptor validation, the bb8 manager and the pooled connection wrapper
// - params: RowValues -> ToSql
// - query: row extraction and the shared statement helpers
// - client / handle / transaction / prepared: the capability traits
// - listen / copy: LISTEN streams and COPY FROM STDIN

pub mod config;
pub mod params;
pub(crate) mod query;

mod client;
mod copy;
mod handle;
mod listen;
mod prepared;
mod transaction;

pub use client::PgClient;
pub use config::{PgConn, PgManager, PgPooledConnection};
pub use handle::PgHandle;
pub use params::Params;
pub use prepared::PgPrepared;
pub use transaction::PgTx;
