//! Byte channels from the capture pipeline
//!
//! The capture pipeline writes encoded images into one named pipe per
//! device and tier. This side only relies on three properties: bytes arrive
//! in order, a read shorter than the pipe page size ends an image, and the
//! writer may go away and come back (the pipeline gets restarted).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::sync::mpsc;

/// Pipe page size: reads of exactly this size continue the current image
pub const DEFAULT_CHUNK_SIZE: usize = 65536;

/// Delay before reopening a pipe after its writer went away
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Events produced by a frame channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Bytes read in one go (at most the chunk size)
    Data(Bytes),
    /// The writer closed its end; the channel reopens on its own
    Closed,
}

/// A source of ordered byte chunks
pub trait FrameChannel {
    /// Start producing events into a bounded channel
    ///
    /// Production stops once the receiver is dropped.
    fn open(self) -> mpsc::Receiver<ChannelEvent>;
}

/// Named pipe (FIFO) reader
///
/// The pipe is created when missing. Each read returns at most one chunk,
/// so the chunk boundaries seen by the assembler are the writer's flushes.
#[derive(Debug, Clone)]
pub struct FifoChannel {
    path: PathBuf,
    chunk_size: usize,
    reconnect_interval: Duration,
    capacity: usize,
}

impl FifoChannel {
    /// Create a reader for the pipe at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            capacity: 64,
        }
    }

    /// Set the read size
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the reopen delay
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the event channel capacity
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_loop(self, tx: mpsc::Sender<ChannelEvent>) {
        let mut buf = vec![0u8; self.chunk_size];

        while !tx.is_closed() {
            if let Err(e) = ensure_fifo(&self.path).await {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to create fifo");
                tokio::time::sleep(self.reconnect_interval).await;
                continue;
            }

            let mut receiver = match pipe::OpenOptions::new().open_receiver(&self.path) {
                Ok(receiver) => receiver,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to open pipe");
                    tokio::time::sleep(self.reconnect_interval).await;
                    continue;
                }
            };

            tracing::info!(path = %self.path.display(), "Pipe opened");

            loop {
                let read = tokio::select! {
                    read = receiver.read(&mut buf) => read,
                    _ = tx.closed() => return,
                };

                match read {
                    Ok(0) => {
                        tracing::info!(path = %self.path.display(), "Pipe closed");
                        if tx.send(ChannelEvent::Closed).await.is_err() {
                            return;
                        }
                        break;
                    }
                    Ok(n) => {
                        let chunk = Bytes::copy_from_slice(&buf[..n]);
                        if tx.send(ChannelEvent::Data(chunk)).await.is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::warn!(path = %self.path.display(), error = %e, "Pipe read failed");
                        if tx.send(ChannelEvent::Closed).await.is_err() {
                            return;
                        }
                        break;
                    }
                }
            }

            tracing::debug!(
                path = %self.path.display(),
                delay_ms = self.reconnect_interval.as_millis() as u64,
                "Reopening pipe"
            );
            tokio::time::sleep(self.reconnect_interval).await;
        }
    }
}

impl FrameChannel for FifoChannel {
    fn open(self) -> mpsc::Receiver<ChannelEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        tokio::spawn(self.read_loop(tx));
        rx
    }
}

/// Create the FIFO if nothing exists at `path` yet
async fn ensure_fifo(path: &Path) -> std::io::Result<()> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }

    let status = tokio::process::Command::new("mkfifo")
        .arg(path)
        .status()
        .await?;
    if !status.success() {
        return Err(std::io::Error::new(
            ErrorKind::Other,
            format!("mkfifo exited with {status}"),
        ));
    }

    tracing::info!(path = %path.display(), "Fifo created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    async fn wait_for(path: &Path) {
        for _ in 0..400 {
            if path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{} never appeared", path.display());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_fifo_reads_and_reports_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe-theta-low");

        let mut rx = FifoChannel::new(&path)
            .chunk_size(1024)
            .reconnect_interval(Duration::from_millis(10))
            .open();
        wait_for(&path).await;

        // Opening for write waits for the reader
        let writer_path = path.clone();
        tokio::task::spawn_blocking(move || {
            let mut pipe = std::fs::OpenOptions::new()
                .write(true)
                .open(writer_path)
                .unwrap();
            pipe.write_all(&[0xAB; 3000]).unwrap();
        })
        .await
        .unwrap();

        let mut total = 0;
        loop {
            match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
                Ok(Some(ChannelEvent::Data(chunk))) => {
                    assert!(chunk.len() <= 1024);
                    total += chunk.len();
                }
                Ok(Some(ChannelEvent::Closed)) => break,
                other => panic!("unexpected: {other:?}"),
            }
        }
        assert_eq!(total, 3000);
    }

    #[tokio::test]
    async fn test_ensure_fifo_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regular");
        std::fs::write(&path, b"x").unwrap();

        ensure_fifo(&path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"x");
    }
}
