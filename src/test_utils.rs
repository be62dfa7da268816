//! Embedded PostgreSQL for the live integration tests.

use postgresql_embedded::PostgreSQL;

use crate::config::{DbConf, PoolLimits};
use crate::types::Dialect;

/// A running embedded `PostgreSQL` instance and a descriptor pointing at its test database.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub conf: DbConf,
}

/// Download (bundled), start and provision an embedded `PostgreSQL` with database `db_name`.
///
/// # Errors
/// Returns an error if the server cannot be set up or started, or the database cannot be
/// created.
pub async fn setup_postgres_embedded(
    db_name: &str,
    pool: PoolLimits,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    let mut postgresql = PostgreSQL::default();
    postgresql.setup().await?;
    postgresql.start().await?;
    postgresql.create_database(db_name).await?;

    let settings = postgresql.settings();
    let conf = DbConf {
        dialect: Dialect::Pgsql,
        host: settings.host.clone(),
        port: settings.port,
        driver: "postgres".to_string(),
        user: settings.username.clone(),
        password: settings.password.clone(),
        database: db_name.to_string(),
        timezone: "UTC".to_string(),
        pool,
    };
    tracing::info!(port = conf.port, db = db_name, "embedded postgres started");
    Ok(EmbeddedPostgres { postgresql, conf })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub async fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    if let Err(e) = postgresql.stop().await {
        tracing::warn!(error = %e, "embedded postgres stop failed");
    }
}
