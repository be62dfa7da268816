//! Orderly shutdown of clients and the statements prepared on them.

use crate::client::SqlClient;
use crate::prepared::PreparedStore;

/// A client registered for shutdown under a display name.
pub struct NamedClient {
    pub name: String,
    pub client: Box<dyn SqlClient>,
}

impl NamedClient {
    pub fn new(name: impl Into<String>, client: Box<dyn SqlClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

/// What `release_all` could not release cleanly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseReport {
    pub statement_failures: usize,
    pub client_failures: usize,
}

impl ReleaseReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.statement_failures == 0 && self.client_failures == 0
    }
}

/// Close one client, logging the outcome. Returns false when closing failed.
pub fn close_client(name: &str, client: &mut dyn SqlClient) -> bool {
    match client.close() {
        Ok(()) => {
            tracing::info!(client = name, dialect = %client.dialect(), "client closed");
            true
        }
        Err(e) => {
            tracing::error!(client = name, error = %e, "closing client failed");
            false
        }
    }
}

/// Close every prepared store, then every client. Nothing aborts the sweep.
pub async fn release_all(
    stores: &mut [PreparedStore],
    clients: &mut [NamedClient],
) -> ReleaseReport {
    let mut report = ReleaseReport::default();
    for store in stores.iter_mut() {
        report.statement_failures += store.close_all().await;
    }
    for named in clients.iter_mut() {
        if !close_client(&named.name, named.client.as_mut()) {
            report.client_failures += 1;
        }
    }
    if report.is_clean() {
        tracing::info!(clients = clients.len(), "all database resources released");
    } else {
        tracing::warn!(
            statement_failures = report.statement_failures,
            client_failures = report.client_failures,
            "database resources released with failures"
        );
    }
    report
}
