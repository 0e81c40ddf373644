//! Dedicated writer task for outbound frames.
//!
//! The session never writes to the socket itself. It hands encoded frames
//! to this task over an mpsc channel, so a slow peer cannot stall the read
//! side, and frames that queue up are batched into single syscalls.
//!
//! # Architecture
//!
//! ```text
//! Session task ─► mpsc::UnboundedSender<Bytes> ─► Writer Task ─► Socket
//! ```
//!
//! Frames leave in exactly the order they were queued. Dropping every
//! [`WriterHandle`] lets the task flush what is queued, shut down the write
//! half and exit.

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{FramelinkError, Result};

/// Frames coalesced into one vectored write at most.
const MAX_BATCH_SIZE: usize = 64;

/// Handle for queueing frames on the writer task.
#[derive(Clone, Debug)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<Bytes>,
    /// Frames queued but not yet written.
    pending: Arc<AtomicUsize>,
}

impl WriterHandle {
    /// Queue a complete frame (prefix included).
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` if the writer task has exited.
    pub fn send(&self, frame: Bytes) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(frame).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            FramelinkError::ConnectionClosed
        })
    }

    /// Frames queued but not yet on the socket.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

/// Spawn the writer task and return a handle for queueing frames.
///
/// The `JoinHandle` completes with `Ok(())` after a clean shutdown, or
/// with the first write error.
pub fn spawn_writer_task<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle {
        tx,
        pending: pending.clone(),
    };

    let task = tokio::spawn(writer_loop(rx, writer, pending));

    (handle, task)
}

/// Drain the channel into the socket until every sender is gone.
async fn writer_loop<W>(
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    mut writer: W,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    while let Some(first) = rx.recv().await {
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        write_batch(&mut writer, &batch).await?;
        batch.clear();

        pending.fetch_sub(batch_size, Ordering::Release);
        tracing::trace!(frames = batch_size, "Wrote batch");
    }

    // Channel closed: everything queued has been written.
    writer.shutdown().await?;
    Ok(())
}

/// Write every frame of the batch, resuming after partial writes.
async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(Bytes::len).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);

        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(FramelinkError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }

        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data left after `skip_bytes` were written.
fn build_remaining_slices(batch: &[Bytes], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for frame in batch {
        let end = offset + frame.len();

        if skip_bytes < end && !frame.is_empty() {
            let start_in_frame = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&frame[start_in_frame..]));
        }
        offset = end;
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client);

        handle.send(Bytes::from_static(b"\x00\x00\x00\x02{}")).unwrap();

        let mut buf = [0u8; 6];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"\x00\x00\x00\x02{}");
    }

    #[tokio::test]
    async fn test_frames_written_in_order() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client);

        for i in 0..10u8 {
            handle.send(Bytes::from(vec![0, 0, 0, 1, b'0' + i])).unwrap();
        }

        let mut buf = vec![0u8; 50];
        server.read_exact(&mut buf).await.unwrap();

        for (i, chunk) in buf.chunks(5).enumerate() {
            assert_eq!(chunk[4], b'0' + i as u8);
        }
    }

    #[tokio::test]
    async fn test_pending_count_drains() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client);

        handle.send(Bytes::from_static(b"\x00\x00\x00\x01x")).unwrap();

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_on_channel_close_flushes_queue() {
        let (client, mut server) = duplex(4096);
        let (handle, task) = spawn_writer_task(client);

        handle.send(Bytes::from_static(b"\x00\x00\x00\x01a")).unwrap();
        handle.send(Bytes::from_static(b"\x00\x00\x00\x01b")).unwrap();
        drop(handle);

        task.await.unwrap().unwrap();

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"\x00\x00\x00\x01a\x00\x00\x00\x01b");
    }

    #[tokio::test]
    async fn test_send_after_task_exit_fails() {
        let (client, server) = duplex(16);
        drop(server);
        let (handle, task) = spawn_writer_task(client);

        // First write hits the closed pipe and ends the task
        handle.send(Bytes::from_static(b"\x00\x00\x00\x01a")).unwrap();
        assert!(task.await.unwrap().is_err());

        let result = handle.send(Bytes::from_static(b"\x00\x00\x00\x01b"));
        assert!(matches!(result, Err(FramelinkError::ConnectionClosed)));
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = vec![Bytes::from_static(b"abcd"), Bytes::from_static(b"ef")];
        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 2);
    }

    #[test]
    fn test_build_remaining_slices_partial_first_frame() {
        let batch = vec![Bytes::from_static(b"abcd"), Bytes::from_static(b"ef")];
        let slices = build_remaining_slices(&batch, 3);
        assert_eq!(slices.len(), 2);
        assert_eq!(&*slices[0], b"d");
        assert_eq!(&*slices[1], b"ef");
    }

    #[test]
    fn test_build_remaining_slices_skip_first_frame() {
        let batch = vec![Bytes::from_static(b"abcd"), Bytes::from_static(b"ef")];
        let slices = build_remaining_slices(&batch, 5);
        assert_eq!(slices.len(), 1);
        assert_eq!(&*slices[0], b"f");
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<_> = (0..5).map(|_| Bytes::from_static(b"\x00\x00\x00\x03abc")).collect();

        write_batch(&mut buf, &batch).await.unwrap();

        assert_eq!(buf.into_inner().len(), 5 * 7);
    }
}
