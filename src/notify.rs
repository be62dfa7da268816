use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::Stream;
use tokio::sync::mpsc;

use crate::types::Notification;

/// Notifications from an active `listen`.
///
/// A background task owns the listening connection and hands each notification over a
/// single-slot channel, so it waits for the consumer instead of buffering. The stream ends
/// (yields `None`) after the listen's cancellation token fires, the backend fails, or the
/// connection drops; by then the task has already returned its connection to the pool.
/// Dropping the stream stops the task as well.
#[derive(Debug)]
pub struct NotificationStream {
    rx: mpsc::Receiver<Notification>,
}

impl NotificationStream {
    /// Capacity of the handoff channel between the listen task and the consumer.
    pub const HANDOFF_CAPACITY: usize = 1;

    #[cfg(feature = "postgres")]
    pub(crate) fn channel() -> (mpsc::Sender<Notification>, Self) {
        let (tx, rx) = mpsc::channel(Self::HANDOFF_CAPACITY);
        (tx, Self { rx })
    }

    /// Wait for the next notification; `None` once the stream has terminated.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }
}

impl Stream for NotificationStream {
    type Item = Notification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
