mod row;
mod rows;
mod scan;

pub use row::Row;
pub use rows::Rows;
pub use scan::{ScanTarget, Scannable};

#[cfg(feature = "postgres")]
pub(crate) use rows::PgRowStream;
