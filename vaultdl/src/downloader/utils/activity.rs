//! Output activity tracking for the stall watchdog.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::Notify;

/// `AsyncRead` adapter that signals `activity` whenever bytes are read.
///
/// Uses `Notify::notify_one`, so a signal raised while nobody is waiting is
/// kept as a permit and observed by the next waiter.
pub struct ActivityReader<R> {
    inner: R,
    activity: Arc<Notify>,
}

impl<R> ActivityReader<R> {
    pub fn new(inner: R, activity: Arc<Notify>) -> Self {
        Self { inner, activity }
    }
}

impl<R> AsyncRead for ActivityReader<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if matches!(poll, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            this.activity.notify_one();
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_signals_on_bytes() {
        let activity = Arc::new(Notify::new());
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut reader = ActivityReader::new(rx, activity.clone());

        tx.write_all(b"hi").await.unwrap();
        let mut buf = [0u8; 8];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(n, 2);

        tokio::time::timeout(Duration::from_secs(1), activity.notified())
            .await
            .expect("activity permit should be stored");
    }

    #[tokio::test]
    async fn test_eof_does_not_signal() {
        let activity = Arc::new(Notify::new());
        let (tx, rx) = tokio::io::duplex(64);
        drop(tx);
        let mut reader = ActivityReader::new(rx, activity.clone());

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);

        let waited = tokio::time::timeout(Duration::from_millis(50), activity.notified()).await;
        assert!(waited.is_err());
    }
}
