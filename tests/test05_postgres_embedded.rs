#![cfg(feature = "test-utils")]

use std::time::Duration;

use chrono::NaiveDate;
use sql_dialects::prelude::*;
use sql_dialects::test_utils::{setup_postgres_embedded, stop_postgres_embedded};
use tokio::runtime::Runtime;

const SCHEMA: &str = "
    CREATE TABLE users (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL, score INTEGER);
    CREATE TABLE events (id BIGINT PRIMARY KEY, kind TEXT, payload BYTEA, at TIMESTAMP);
";

fn limits() -> PoolLimits {
    PoolLimits {
        max_conns: 4,
        min_idle: None,
        ..PoolLimits::default()
    }
}

#[test]
fn postgres_backend_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    let pg = rt.block_on(setup_postgres_embedded("dialects_test", limits()))?;
    let outcome = exercise(&rt, &pg.conf);
    rt.block_on(stop_postgres_embedded(pg));
    outcome
}

fn exercise(rt: &Runtime, conf: &DbConf) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = PgClient::new(conf.clone());
    rt.block_on(async {
        client.init().await?;
        assert!(matches!(client.init().await, Err(SqlDbError::ConfigError(_))));
        Ok::<(), SqlDbError>(())
    })?;

    rt.block_on(async {
        let db = client.handle()?;
        db.execute_batch(SCHEMA).await?;

        // insert_stmt appends RETURNING id and reports the generated key.
        let first = db
            .insert_stmt(
                "INSERT INTO users (name, score) VALUES ($1, $2);",
                &[RowValues::Text("alice".into()), RowValues::Int(7)],
            )
            .await?;
        assert_eq!(first.last_insert_id(), Some(1));
        let second = db
            .insert_stmt(
                "INSERT INTO users (name, score) VALUES ($1, $2)",
                &[RowValues::Text("bob".into()), RowValues::Null],
            )
            .await?;
        assert_eq!(second.last_insert_id(), Some(2));

        let row = db
            .query_row("SELECT id, name, score FROM users WHERE name = $1", &[RowValues::Text("alice".into())])
            .await?;
        assert_eq!(row.get("id"), Some(&RowValues::Int(1)));
        assert_eq!(row.get("score"), Some(&RowValues::Int(7)));

        let err = db
            .query_row("SELECT id FROM users WHERE id = $1", &[RowValues::Int(42)])
            .await
            .unwrap_err();
        assert!(err.is_no_rows(), "unexpected error: {err}");

        let updated = db
            .exec("UPDATE users SET score = $1 WHERE score IS NULL", &[RowValues::Int(1)])
            .await?;
        assert_eq!(updated.rows_affected(), Some(1));

        let names: Vec<Row> = db
            .query("SELECT name FROM users ORDER BY id", &[])
            .await?
            .collect()
            .await?;
        assert_eq!(names.len(), 2);
        assert_eq!(names[1].get("name").and_then(RowValues::as_text), Some("bob"));

        // Transactions: commit, double commit, rollback.
        let mut tx = client.begin_tx().await?;
        tx.exec("INSERT INTO users (name) VALUES ($1)", &[RowValues::Text("carol".into())])
            .await?;
        let inside = tx.query_row("SELECT count(*) AS n FROM users", &[]).await?;
        assert_eq!(inside.get("n"), Some(&RowValues::Int(3)));
        tx.commit().await?;
        assert!(matches!(tx.commit().await, Err(SqlDbError::TransactionClosed)));

        let mut tx = client.begin_tx().await?;
        tx.exec("DELETE FROM users", &[]).await?;
        tx.rollback().await?;
        let count = db.query_row("SELECT count(*) AS n FROM users", &[]).await?;
        assert_eq!(count.get("n"), Some(&RowValues::Int(3)));

        // Prepared statements are shared and closable.
        let by_id = client.prepare("SELECT name FROM users WHERE id = $1").await?;
        let row = by_id.query_row(&[RowValues::Int(3)]).await?;
        assert_eq!(row.get("name").and_then(RowValues::as_text), Some("carol"));
        by_id.close().await?;
        assert!(by_id.exec(&[RowValues::Int(3)]).await.is_err());

        // COPY with NULLs, escapes, bytea and timestamps.
        let at = NaiveDate::from_ymd_opt(2024, 5, 6)
            .and_then(|d| d.and_hms_opt(7, 8, 9))
            .ok_or("bad date")?;
        let rows: Vec<Vec<RowValues>> = (1..=2500)
            .map(|i| {
                vec![
                    RowValues::Int(i),
                    if i % 2 == 0 {
                        RowValues::Text(format!("tab\there\\{i}"))
                    } else {
                        RowValues::Null
                    },
                    RowValues::Blob(vec![0, 1, 0xfe]),
                    RowValues::Timestamp(at),
                ]
            })
            .collect();
        let copied = db.copy_from("events", &["id", "kind", "payload", "at"], &rows).await?;
        assert_eq!(copied, 2500);
        let ev = db
            .query_row("SELECT kind, payload, at FROM events WHERE id = $1", &[RowValues::Int(2)])
            .await?;
        assert_eq!(ev.get("kind").and_then(RowValues::as_text), Some("tab\there\\2"));
        assert_eq!(ev.get("payload"), Some(&RowValues::Blob(vec![0, 1, 0xfe])));
        assert_eq!(ev.get("at").and_then(RowValues::as_timestamp), Some(at));
        let nulls = db
            .query_row("SELECT count(*) AS n FROM events WHERE kind IS NULL", &[])
            .await?;
        assert_eq!(nulls.get("n"), Some(&RowValues::Int(1250)));

        // LISTEN: receive, cancel, and get the connection back.
        let cancel = CancellationToken::new();
        let mut stream = db.listen(cancel.clone(), "jobs").await?;
        db.exec("SELECT pg_notify('jobs', 'first')", &[]).await?;
        let note = tokio::time::timeout(Duration::from_secs(5), stream.recv())
            .await?
            .ok_or("stream ended early")?;
        assert_eq!(note.channel, "jobs");
        assert_eq!(note.payload, "first");

        cancel.cancel();
        let end = tokio::time::timeout(Duration::from_secs(5), stream.recv()).await?;
        assert!(end.is_none());
        let state = client.pool_state().ok_or("pool missing")?;
        assert_eq!(state.idle_connections, state.connections);

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    rt.block_on(returning_and_decoding(&client))?;
    rt.block_on(listen_backlog(&client))?;
    abandoned_transaction(rt, &client)?;
    rt.block_on(statement_cache(conf))?;

    client.close()?;
    client.close()?;
    assert!(!client.is_initialized());
    assert!(client.handle().is_err());
    Ok(())
}

async fn returning_and_decoding(client: &PgClient) -> Result<(), Box<dyn std::error::Error>> {
    let db = client.handle()?;

    // A statement that already returns the key is used as written.
    let res = db
        .insert_stmt(
            "INSERT INTO users (name) VALUES ($1) RETURNING id",
            &[RowValues::Text("dave".into())],
        )
        .await?;
    assert_eq!(res.rows_affected(), Some(1));

    // A column the driver cannot decode is a scan failure, not an iteration failure.
    let err = query_all_items(
        db.as_ref(),
        "SELECT point(1, 2) AS p",
        &[],
        |p: &mut String| vec![p as &mut dyn ScanTarget],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SqlDbError::ScanError(_)), "unexpected error: {err}");
    Ok(())
}

async fn listen_backlog(client: &PgClient) -> Result<(), Box<dyn std::error::Error>> {
    let db = client.handle()?;
    let cancel = CancellationToken::new();
    let mut stream = db.listen(cancel.clone(), "jobs").await?;

    // More notifications than the per-connection buffer holds, all sent before reading.
    db.exec("SELECT pg_notify('jobs', g::text) FROM generate_series(1, 100) g", &[])
        .await?;
    for expected in 1..=100 {
        let note = tokio::time::timeout(Duration::from_secs(5), stream.recv())
            .await?
            .ok_or("stream ended early")?;
        assert_eq!(note.payload, expected.to_string());
    }

    cancel.cancel();
    let end = tokio::time::timeout(Duration::from_secs(5), stream.recv()).await?;
    assert!(end.is_none());
    let state = client.pool_state().ok_or("pool missing")?;
    assert_eq!(state.idle_connections, state.connections);
    Ok(())
}

fn abandoned_transaction(rt: &Runtime, client: &PgClient) -> Result<(), Box<dyn std::error::Error>> {
    let tx = rt.block_on(async {
        let mut tx = client.begin_tx().await?;
        tx.exec("INSERT INTO users (name) VALUES ($1)", &[RowValues::Text("orphan".into())])
            .await?;
        Ok::<_, SqlDbError>(tx)
    })?;
    let before = client.pool_state().ok_or("pool missing")?.connections;

    // No runtime here: the connection cannot be rolled back, so it must not be reused.
    drop(tx);
    let after = client.pool_state().ok_or("pool missing")?.connections;
    assert_eq!(after + 1, before);

    rt.block_on(async {
        let db = client.handle()?;
        let mut open = i64::MAX;
        for _ in 0..50 {
            let row = db
                .query_row(
                    "SELECT count(*) AS n FROM pg_stat_activity \
                     WHERE datname = current_database() AND state LIKE 'idle in transaction%'",
                    &[],
                )
                .await?;
            open = row.get("n").and_then(RowValues::as_int).copied().unwrap_or(i64::MAX);
            if open == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(open, 0);
        let orphans = db
            .query_row("SELECT count(*) AS n FROM users WHERE name = $1", &[RowValues::Text("orphan".into())])
            .await?;
        assert_eq!(orphans.get("n"), Some(&RowValues::Int(0)));
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

async fn statement_cache(conf: &DbConf) -> Result<(), Box<dyn std::error::Error>> {
    let mut single = conf.clone();
    single.pool = PoolLimits {
        max_conns: 1,
        ..limits()
    };
    let mut client = PgClient::new(single);
    client.init().await?;
    let db = client.handle()?;

    // Closing a prepared statement releases it on the server.
    let sql = "SELECT name FROM users WHERE id = $1";
    let by_id = client.prepare(sql).await?;
    by_id.query_row(&[RowValues::Int(1)]).await?;
    assert_eq!(compiled(db.as_ref(), sql).await?, Some(1));
    by_id.close().await?;
    assert_eq!(compiled(db.as_ref(), sql).await?, Some(0));

    // The per-connection cache is bounded.
    let mut kept = Vec::new();
    for i in 0..70 {
        kept.push(client.prepare(&format!("SELECT {i}::int AS cached")).await?);
    }
    let row = db
        .query_row(
            "SELECT count(*) AS n FROM pg_prepared_statements WHERE statement LIKE '%::int AS cached'",
            &[],
        )
        .await?;
    let live = row.get("n").and_then(RowValues::as_int).copied().ok_or("count missing")?;
    assert!(live <= 64, "{live} statements still compiled");
    assert_eq!(kept.len(), 70);

    client.close()?;
    Ok(())
}

async fn compiled(db: &dyn DbHandle, sql: &str) -> Result<Option<i64>, SqlDbError> {
    let row = db
        .query_row(
            "SELECT count(*) AS n FROM pg_prepared_statements WHERE statement = $1",
            &[RowValues::Text(sql.to_string())],
        )
        .await?;
    Ok(row.get("n").and_then(RowValues::as_int).copied())
}
