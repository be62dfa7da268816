use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::SqlDbError;
use crate::helpers::quote_ident;
use crate::notify::NotificationStream;
use crate::types::Notification;

use super::config::{PgConn, PgPooledConnection};

/// Issue `LISTEN` on a dedicated connection and hand it to a background task.
pub(crate) async fn spawn_listener(
    mut conn: PgPooledConnection,
    cancel: CancellationToken,
    channel: &str,
) -> Result<NotificationStream, SqlDbError> {
    let stale = conn.drain_notifications();
    if stale > 0 {
        tracing::debug!(stale, "dropped stale postgres notifications");
    }
    conn.set_listening(true);
    if let Err(e) = conn
        .client
        .batch_execute(&format!("LISTEN {}", quote_ident(channel)))
        .await
    {
        conn.set_listening(false);
        return Err(e.into());
    }

    let (tx, stream) = NotificationStream::channel();
    tracing::info!(channel, "postgres listen started");
    tokio::spawn(listen_loop(conn, tx, cancel, channel.to_string()));
    Ok(stream)
}

async fn listen_loop(
    mut conn: PgPooledConnection,
    tx: mpsc::Sender<Notification>,
    cancel: CancellationToken,
    channel: String,
) {
    let reason = loop {
        let note = tokio::select! {
            () = cancel.cancelled() => break "cancelled",
            () = tx.closed() => break "consumer dropped",
            note = conn.notifications.recv() => match note {
                Some(note) => note,
                None => {
                    tracing::warn!(channel = %channel, "postgres listen connection lost");
                    break "connection lost";
                }
            },
        };
        tokio::select! {
            () = cancel.cancelled() => break "cancelled",
            sent = tx.send(note) => {
                if sent.is_err() {
                    break "consumer dropped";
                }
            }
        }
    };

    if let Err(e) = unlisten(&mut conn).await {
        tracing::warn!(channel = %channel, error = %e, "postgres unlisten failed");
    }
    conn.set_listening(false);
    conn.drain_notifications();
    // Back in the pool before the consumer observes the end of the stream.
    drop(conn);
    tracing::info!(channel = %channel, reason, "postgres listen stopped");
    drop(tx);
}

/// `UNLISTEN *`, taking the notifications still in flight so the driver task can reach the
/// reply.
async fn unlisten(conn: &mut PgPooledConnection) -> Result<(), tokio_postgres::Error> {
    let PgConn {
        client,
        notifications,
        ..
    } = &mut **conn;
    let done = client.batch_execute("UNLISTEN *");
    tokio::pin!(done);
    loop {
        tokio::select! {
            biased;
            result = &mut done => return result,
            Some(_) = notifications.recv() => {}
        }
    }
}
