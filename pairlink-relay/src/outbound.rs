//! Per-connection outbound delivery.
//!
//! State transitions never write to a socket directly: each connection
//! owns a bounded queue drained by a dedicated writer task, so one stalled
//! peer cannot hold up the relay lock. A packet that finds the queue full
//! is dropped (drop-newest) and counted by the caller.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Sending half of a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: mpsc::Sender<String>,
}

/// Why an enqueue failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is full; the packet is dropped.
    Full,
    /// The writer task is gone (connection closing).
    Closed,
}

impl OutboundSender {
    /// Queue one wire line (without trailing newline) for delivery.
    ///
    /// Never blocks: callers hold the relay lock while enqueueing.
    pub fn enqueue(&self, line: String) -> Result<(), EnqueueError> {
        self.tx.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

pub(crate) fn channel(depth: usize) -> (OutboundSender, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (OutboundSender { tx }, rx)
}

/// Spawn the writer task for one connection.
///
/// The task drains the queue until every sender is dropped, then shuts the
/// write half down. A failed write abandons the connection's remaining
/// output with no retry; other connections are unaffected.
pub fn spawn_writer<W>(write: W, depth: usize) -> OutboundSender
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (sender, mut rx) = channel(depth);
    let mut write = write;
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = write_line(&mut write, &line).await {
                tracing::debug!("outbound write failed, abandoning connection output: {e}");
                break;
            }
        }
        let _ = write.shutdown().await;
    });
    sender
}

async fn write_line<W: AsyncWrite + Unpin>(write: &mut W, line: &str) -> std::io::Result<()> {
    write.write_all(line.as_bytes()).await?;
    write.write_all(b"\n").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn writer_delivers_queued_lines() {
        let (client, server) = tokio::io::duplex(4096);
        let sender = spawn_writer(server, 8);

        sender.enqueue("first".to_string()).unwrap();
        sender.enqueue("second".to_string()).unwrap();
        drop(sender);

        let mut out = String::new();
        let mut client = client;
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "first\nsecond\n");
    }

    #[tokio::test]
    async fn full_queue_drops_newest() {
        let (sender, _rx) = channel(1);
        sender.enqueue("kept".to_string()).unwrap();
        assert_eq!(sender.enqueue("dropped".to_string()), Err(EnqueueError::Full));
    }

    #[tokio::test]
    async fn closed_queue_reports_closed() {
        let (sender, rx) = channel(1);
        drop(rx);
        assert_eq!(sender.enqueue("late".to_string()), Err(EnqueueError::Closed));
    }
}
