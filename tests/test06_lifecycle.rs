#![cfg(feature = "sqlite")]

use async_trait::async_trait;
use sql_dialects::prelude::*;

static QUERIES: &[(&str, &str)] = &[
    ("count.sql", "SELECT count(*) AS n FROM sqlite_master"),
    ("one.sql", "SELECT ? AS v"),
];

/// A client whose shutdown always fails.
struct StuckClient;

#[async_trait]
impl SqlClient for StuckClient {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    async fn init(&mut self) -> Result<(), SqlDbError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), SqlDbError> {
        Err(SqlDbError::ConnectionError("server went away".into()))
    }

    fn is_initialized(&self) -> bool {
        true
    }

    fn handle(&self) -> Result<Box<dyn DbHandle>, SqlDbError> {
        Err(SqlDbError::Unimplemented("stuck".into()))
    }

    async fn begin_tx(&self) -> Result<Box<dyn Transaction>, SqlDbError> {
        Err(SqlDbError::Unimplemented("stuck".into()))
    }

    async fn prepare(&self, _sql: &str) -> Result<Box<dyn PreparedStatement>, SqlDbError> {
        Err(SqlDbError::Unimplemented("stuck".into()))
    }
}

async fn sqlite(dir: &tempfile::TempDir, file: &str) -> Result<Box<dyn SqlClient>, SqlDbError> {
    let conf = DbConf::from_json_str(&format!(
        r#"{{"type":"sqlite","db":"{}"}}"#,
        dir.path().join(file).display()
    ))?;
    let mut client = conf.build_client()?;
    client.init().await?;
    Ok(client)
}

fn keys() -> [StatementKey; 2] {
    [StatementKey::new("q", "count"), StatementKey::new("q", "one")]
}

#[tokio::test]
async fn releases_statements_then_clients() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let registry = TemplateLoader::new(Dialect::Sqlite)
        .load(vec![TemplateSource::new("q", StaticBundle::new("queries", QUERIES))])?;

    let main = sqlite(&dir, "main.db").await?;
    let reports = sqlite(&dir, "reports.db").await?;
    let main_stmts = PreparedStore::prepare_stmts_in_db(main.as_ref(), &registry, &keys()).await?;
    let report_stmts =
        PreparedStore::prepare_stmts_in_db(reports.as_ref(), &registry, &keys()).await?;

    let one = main_stmts.require(&keys()[1])?;
    let row = one.query_row(&[RowValues::Int(5)]).await?;
    assert_eq!(row.get("v"), Some(&RowValues::Int(5)));

    let mut stores = vec![main_stmts, report_stmts];
    let mut clients = vec![NamedClient::new("main", main), NamedClient::new("reports", reports)];
    let report = release_all(&mut stores, &mut clients).await;

    assert!(report.is_clean(), "{report:?}");
    assert!(stores.iter().all(PreparedStore::is_empty));
    assert!(clients.iter().all(|c| !c.client.is_initialized()));

    // A second sweep finds nothing left to fail on.
    assert!(release_all(&mut stores, &mut clients).await.is_clean());
    Ok(())
}

#[tokio::test]
async fn failures_are_counted_and_do_not_stop_the_sweep() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let healthy = sqlite(&dir, "healthy.db").await?;

    let mut clients = vec![
        NamedClient::new("stuck", Box::new(StuckClient)),
        NamedClient::new("healthy", healthy),
    ];
    let report = release_all(&mut [], &mut clients).await;

    assert_eq!(
        report,
        ReleaseReport {
            statement_failures: 0,
            client_failures: 1,
        }
    );
    assert!(!report.is_clean());
    assert!(!clients[1].client.is_initialized());
    Ok(())
}

#[tokio::test]
async fn close_client_reports_success() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let mut client = sqlite(&dir, "single.db").await?;
    assert!(close_client("single", client.as_mut()));
    assert!(close_client("single", client.as_mut()));
    assert!(!close_client("stuck", &mut StuckClient));
    Ok(())
}
