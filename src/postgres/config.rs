use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bb8::{ManageConnection, Pool, PooledConnection};
use futures_util::StreamExt;
use lru::LruCache;
use tokio::sync::mpsc;
use tokio_postgres::{AsyncMessage, Client, NoTls, Statement};

use crate::config::DbConf;
use crate::error::SqlDbError;
use crate::types::Notification;

/// Notifications buffered per connection. Outside `listen` the excess is dropped; inside it
/// the driver task waits for room.
const NOTIFICATION_BUFFER: usize = 64;

/// A pooled PostgreSQL connection as handed out by bb8.
pub type PgPooledConnection = PooledConnection<'static, PgManager>;

/// Build the driver configuration from a descriptor.
///
/// # Errors
/// Returns `SqlDbError::ConfigError` if a required field is missing.
pub fn pg_config(conf: &DbConf) -> Result<tokio_postgres::Config, SqlDbError> {
    conf.require("host", &conf.host)?;
    conf.require("user", &conf.user)?;
    conf.require("db", &conf.database)?;
    if conf.port == 0 {
        return Err(SqlDbError::ConfigError("port is required".to_string()));
    }

    let mut cfg = tokio_postgres::Config::new();
    cfg.host(&conf.host)
        .port(conf.port)
        .user(&conf.user)
        .dbname(&conf.database)
        .application_name("sql-dialects");
    if !conf.password.is_empty() {
        cfg.password(&conf.password);
    }
    if !conf.timezone.is_empty() {
        cfg.options(format!("-c TimeZone={}", conf.timezone));
    }
    Ok(cfg)
}

/// Compiled statements kept per connection; the least recently used one is closed first.
const STATEMENT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64) {
    Some(cap) => cap,
    None => unreachable!(),
};

/// SQL texts whose prepared handles were closed, with the generation they were closed at.
///
/// Shared by every connection of one pool. A statement compiled before its text was retired
/// is evicted, and released on the server, the next time its connection is checked out.
#[derive(Debug, Default)]
pub(crate) struct RetiredStatements {
    generation: AtomicU64,
    closed: Mutex<HashMap<String, u64>>,
}

impl RetiredStatements {
    fn current(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn retire(&self, sql: &str) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(sql.to_string(), generation);
    }

    fn is_stale(&self, sql: &str, compiled_at: u64) -> bool {
        self.closed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sql)
            .is_some_and(|closed_at| *closed_at > compiled_at)
    }
}

struct CachedStatement {
    stmt: Statement,
    compiled_at: u64,
}

/// A live client plus what the pool keeps per connection: the notifications the server sent
/// it and the statements compiled on it.
pub struct PgConn {
    pub(crate) client: Client,
    pub(crate) notifications: mpsc::Receiver<Notification>,
    listening: Arc<AtomicBool>,
    broken: bool,
    statements: Mutex<LruCache<String, CachedStatement>>,
    retired: Arc<RetiredStatements>,
}

impl PgConn {
    /// Compile `sql` on this connection, reusing an earlier compilation of the same text.
    ///
    /// # Errors
    /// Returns the driver error when the statement does not compile.
    pub async fn prepare_cached(&self, sql: &str) -> Result<Statement, SqlDbError> {
        let cached = self
            .statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sql)
            .map(|c| c.stmt.clone());
        if let Some(stmt) = cached {
            return Ok(stmt);
        }
        let compiled_at = self.retired.current();
        let stmt = self.client.prepare(sql).await?;
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(
                sql.to_string(),
                CachedStatement {
                    stmt: stmt.clone(),
                    compiled_at,
                },
            );
        Ok(stmt)
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn retired(&self) -> Arc<RetiredStatements> {
        Arc::clone(&self.retired)
    }

    /// Drop cached statements whose prepared handle has been closed since they were compiled.
    pub(crate) fn purge_retired(&self) -> usize {
        let mut cache = self
            .statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let stale: Vec<String> = cache
            .iter()
            .filter(|(sql, c)| self.retired.is_stale(sql, c.compiled_at))
            .map(|(sql, _)| sql.clone())
            .collect();
        for sql in &stale {
            cache.pop(sql);
        }
        stale.len()
    }

    /// While set, the driver task waits for the holder to take each notification.
    pub(crate) fn set_listening(&self, on: bool) {
        self.listening.store(on, Ordering::Release);
    }

    /// Keep the pool from handing this connection out again.
    pub(crate) fn mark_broken(&mut self) {
        self.broken = true;
    }

    /// Discard notifications left over from an earlier `LISTEN`.
    pub(crate) fn drain_notifications(&mut self) -> usize {
        let mut dropped = 0;
        while self.notifications.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

/// bb8 manager for PostgreSQL connections.
pub struct PgManager {
    pub(crate) config: tokio_postgres::Config,
    retired: Arc<RetiredStatements>,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self {
            config,
            retired: Arc::default(),
        }
    }

    /// Build a pool from this manager with the descriptor's limits.
    ///
    /// # Errors
    /// Returns `SqlDbError::ConnectionError` if the initial idle connections cannot be opened.
    pub async fn build_pool(self, conf: &DbConf) -> Result<Pool<PgManager>, SqlDbError> {
        conf.pool
            .apply(Pool::builder())
            .build(self)
            .await
            .map_err(|e| SqlDbError::ConnectionError(format!("postgres pool error: {e}")))
    }
}

impl ManageConnection for PgManager {
    type Connection = PgConn;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        let retired = Arc::clone(&self.retired);
        async move {
            tracing::debug!(
                hosts = ?cfg.get_hosts(),
                db = ?cfg.get_dbname(),
                user = ?cfg.get_user(),
                "postgres connect start"
            );
            let (client, mut connection) = cfg.connect(NoTls).await?;
            let (tx, rx) = mpsc::channel(NOTIFICATION_BUFFER);
            let listening = Arc::new(AtomicBool::new(false));
            let driver_listening = Arc::clone(&listening);

            // Drives the socket; notifications are routed to whoever holds this connection.
            tokio::spawn(async move {
                let mut messages =
                    futures_util::stream::poll_fn(move |cx| connection.poll_message(cx));
                while let Some(message) = messages.next().await {
                    match message {
                        Ok(AsyncMessage::Notification(n)) => {
                            let note = Notification {
                                channel: n.channel().to_string(),
                                payload: n.payload().to_string(),
                            };
                            if driver_listening.load(Ordering::Acquire) {
                                // Waiting here stops reading the socket until the listener catches up.
                                if tx.send(note).await.is_err() {
                                    tracing::debug!("postgres notification receiver gone");
                                }
                            } else if let Err(e) = tx.try_send(note) {
                                tracing::warn!(error = %e, "postgres notification outside listen dropped");
                            }
                        }
                        Ok(AsyncMessage::Notice(notice)) => {
                            tracing::debug!(notice = %notice, "postgres notice");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "postgres connection error");
                            break;
                        }
                    }
                }
            });

            Ok(PgConn {
                client,
                notifications: rx,
                listening,
                broken: false,
                statements: Mutex::new(LruCache::new(STATEMENT_CACHE_CAPACITY)),
                retired,
            })
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.client.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.broken || conn.client.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf(json: &str) -> DbConf {
        DbConf::from_json_str(json).unwrap()
    }

    #[test]
    fn missing_host_is_a_config_error() {
        let err = pg_config(&conf(r#"{"type":"pgsql","port":5432,"user":"u","db":"d"}"#))
            .unwrap_err();
        assert!(matches!(err, SqlDbError::ConfigError(ref m) if m.contains("host")));
    }

    #[test]
    fn missing_port_is_a_config_error() {
        let err =
            pg_config(&conf(r#"{"type":"pgsql","host":"h","user":"u","db":"d"}"#)).unwrap_err();
        assert!(matches!(err, SqlDbError::ConfigError(ref m) if m.contains("port")));
    }

    #[test]
    fn retirement_only_covers_earlier_compilations() {
        let retired = RetiredStatements::default();
        let before = retired.current();
        assert!(!retired.is_stale("SELECT 1", before));

        retired.retire("SELECT 1");
        assert!(retired.is_stale("SELECT 1", before));
        assert!(!retired.is_stale("SELECT 1", retired.current()));
        assert!(!retired.is_stale("SELECT 2", before));
    }

    #[test]
    fn session_timezone_goes_into_options() {
        let cfg = pg_config(&conf(
            r#"{"type":"pgsql","host":"h","port":5433,"user":"u","pw":"p","db":"d","tz":"Europe/Paris"}"#,
        ))
        .unwrap();
        assert_eq!(cfg.get_ports(), &[5433]);
        assert_eq!(cfg.get_dbname(), Some("d"));
        assert_eq!(cfg.get_options(), Some("-c TimeZone=Europe/Paris"));
        assert_eq!(cfg.get_password(), Some(&b"p"[..]));
    }
}
