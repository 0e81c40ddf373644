//! Connection session: socket lifecycle, reassembly and correlation.
//!
//! A session owns one stream. It runs as a single task that
//! - reads the socket and feeds every chunk through the [`FrameCodec`],
//! - completes the oldest [`PendingRequestQueue`] slot per decoded frame,
//! - accepts send commands from [`ClientHandle`]s and passes the frames to
//!   the writer task,
//! - fails every pending request when the connection ends.
//!
//! The reassembly buffer and the queue are touched only by this task, so
//! neither needs a lock.
//!
//! # States
//!
//! ```text
//! Disconnected ─► Connecting ─► Connected ─► Closing ─► Closed
//!                     │             │                    ▲
//!                     ▼             └── error / peer EOF ┘
//!               Disconnected
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use crate::client::ClientHandle;
use crate::codec::FrameCodec;
use crate::config::SessionConfig;
use crate::error::{FramelinkError, Result};
use crate::pending::{Completion, PendingRequestQueue};
use crate::transport::connect_tcp;
use crate::writer::{spawn_writer_task, WriterHandle};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Commands sent from handles to the session task.
pub(crate) enum SessionCommand {
    /// Queue a completion slot, then write the frame.
    Send { frame: Bytes, completion: Completion },
    /// Flush and close.
    Close,
}

/// Counters maintained by the session task.
#[derive(Debug, Default)]
pub struct SessionStats {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    decode_errors: AtomicU64,
    correlation_errors: AtomicU64,
    pending: AtomicUsize,
}

impl SessionStats {
    /// Frames handed to the writer.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Complete frames extracted from the stream.
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Frames whose payload was not valid JSON.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Frames that arrived with no request waiting.
    pub fn correlation_errors(&self) -> u64 {
        self.correlation_errors.load(Ordering::Relaxed)
    }

    /// Requests accepted by `send` and not yet completed.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Count one more request unless `limit` are already pending.
    pub(crate) fn try_reserve(&self, limit: usize) -> bool {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok()
    }

    /// Return `count` reservations whose slots have completed.
    pub(crate) fn release(&self, count: usize) {
        self.pending.fetch_sub(count, Ordering::AcqRel);
    }
}

/// How the read loop ended.
enum Exit {
    /// `close()` was requested, or every handle was dropped.
    Requested,
    /// The peer closed its side.
    PeerClosed,
    /// Socket, writer or framing failure.
    Failed(FramelinkError),
}

/// One connection and the state it owns.
///
/// Build it with [`ConnectionSession::new`] over any split stream and drive
/// it with [`run`](Self::run), or use [`spawn`](Self::spawn) /
/// [`connect`](Self::connect) which do both.
pub struct ConnectionSession<R, W> {
    reader: R,
    /// Moved into the writer task when the session starts running.
    writer: Option<W>,
    codec: FrameCodec,
    queue: PendingRequestQueue,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    state: watch::Sender<ConnectionState>,
    stats: Arc<SessionStats>,
    config: SessionConfig,
}

/// Session over the two halves of a TCP stream.
pub type TcpSession = ConnectionSession<OwnedReadHalf, OwnedWriteHalf>;

impl TcpSession {
    /// Connect over TCP and spawn the session task.
    ///
    /// # Errors
    ///
    /// `Connection` or `ConnectTimeout` if the connection cannot be opened.
    pub async fn connect(host: &str, port: u16, config: SessionConfig) -> Result<ClientHandle> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        state.send_replace(ConnectionState::Connecting);
        tracing::debug!(host, port, "Connecting");

        let stream = match connect_tcp(host, port, config.connect_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                state.send_replace(ConnectionState::Disconnected);
                tracing::error!(host, port, error = %e, "Connect failed");
                return Err(e);
            }
        };

        tracing::debug!(host, port, "Connected");
        let (reader, writer) = stream.into_split();
        Ok(Self::with_state(reader, writer, config, state).spawn())
    }
}

impl<R, W> ConnectionSession<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a session over an already connected stream.
    ///
    /// The session starts in `Connected`. Sends made before [`run`](Self::run)
    /// starts are queued and processed in order.
    pub fn new(reader: R, writer: W, config: SessionConfig) -> (Self, ClientHandle) {
        let (state, _) = watch::channel(ConnectionState::Connected);
        let Built { inner, handle } = Self::with_state(reader, writer, config, state);
        (inner, handle)
    }

    /// Create a session and spawn it on the current runtime.
    pub fn spawn(reader: R, writer: W, config: SessionConfig) -> ClientHandle {
        let (session, handle) = Self::new(reader, writer, config);
        tokio::spawn(session.run());
        handle
    }

    fn with_state(
        reader: R,
        writer: W,
        config: SessionConfig,
        state: watch::Sender<ConnectionState>,
    ) -> Built<R, W> {
        state.send_replace(ConnectionState::Connected);

        let (command_tx, commands) = mpsc::unbounded_channel();
        let stats = Arc::new(SessionStats::default());
        let handle = ClientHandle::new(command_tx, state.subscribe(), stats.clone(), &config);

        Built {
            inner: Self {
                reader,
                writer: Some(writer),
                codec: FrameCodec::new(config.max_payload_size),
                queue: PendingRequestQueue::new(),
                commands,
                state,
                stats,
                config,
            },
            handle,
        }
    }

    /// Run the session until the connection ends.
    pub async fn run(mut self) {
        let Some(socket_writer) = self.writer.take() else {
            return;
        };
        let (writer, mut writer_task) = spawn_writer_task(socket_writer);
        let mut writer = Some(writer);
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];

        let exit = loop {
            tokio::select! {
                read = self.reader.read(&mut buf) => match read {
                    Ok(0) => break Exit::PeerClosed,
                    Ok(n) => {
                        if let Err(e) = self.on_data(&buf[..n]) {
                            break Exit::Failed(e);
                        }
                    }
                    Err(e) => break Exit::Failed(FramelinkError::Io(e)),
                },

                command = self.commands.recv() => match command {
                    Some(SessionCommand::Send { frame, completion }) => {
                        if let Some(writer) = &writer {
                            self.on_send(writer, frame, completion);
                        }
                    }
                    Some(SessionCommand::Close) | None => break Exit::Requested,
                },

                result = &mut writer_task => {
                    let err = match result {
                        Ok(Err(e)) => e,
                        Ok(Ok(())) => FramelinkError::ConnectionClosed,
                        Err(e) => FramelinkError::connection(format!("writer task failed: {}", e)),
                    };
                    break Exit::Failed(err);
                }
            }
        };

        match exit {
            Exit::Requested => {
                self.state.send_replace(ConnectionState::Closing);
                tracing::debug!(
                    pending = self.queue.len(),
                    unwritten = writer.as_ref().map_or(0, WriterHandle::pending_count),
                    "Closing"
                );

                // Dropping the last handle lets the writer flush and shut down.
                writer.take();
                match timeout(self.config.close_timeout, &mut writer_task).await {
                    Ok(Ok(Ok(()))) => {}
                    Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Flush on close failed"),
                    Ok(Err(e)) => tracing::warn!(error = %e, "Writer task failed"),
                    Err(_) => {
                        tracing::warn!(timeout = ?self.config.close_timeout, "Flush on close timed out");
                        writer_task.abort();
                    }
                }
                self.finish(|| FramelinkError::ConnectionClosed);
            }
            Exit::PeerClosed => {
                tracing::debug!(pending = self.queue.len(), "Connection closed by peer");
                if !self.codec.is_empty() {
                    tracing::warn!(
                        buffered = self.codec.buffered_len(),
                        "Peer closed in the middle of a frame"
                    );
                }
                writer.take();
                self.finish(|| FramelinkError::ConnectionClosed);
            }
            Exit::Failed(e) => {
                tracing::error!(error = %e, pending = self.queue.len(), "Connection failed");
                writer.take();
                writer_task.abort();
                let message = e.to_string();
                self.finish(|| FramelinkError::Connection(message.clone()));
            }
        }
    }

    /// Feed one chunk and correlate every frame it completes.
    ///
    /// Only framing violations are returned; decode and correlation
    /// failures stay local to the frame.
    fn on_data(&mut self, data: &[u8]) -> Result<()> {
        let stats = &self.stats;
        let queue = &mut self.queue;

        for frame in self.codec.feed(data)? {
            stats.frames_received.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(len = frame.payload_len(), "Received frame");

            let correlated = match FrameCodec::decode::<Value>(&frame) {
                Ok(value) => queue.resolve_oldest(value),
                Err(e) => {
                    stats.decode_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(len = frame.payload_len(), error = %e, "Failed to decode frame");
                    queue.reject_oldest(e)
                }
            };

            match correlated {
                Ok(()) => stats.release(1),
                Err(e) => {
                    stats.correlation_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(len = frame.payload_len(), error = %e, "Received unsolicited frame");
                }
            }
        }
        Ok(())
    }

    /// Queue the slot, then the frame. The slot must exist before the
    /// request can reach the peer.
    fn on_send(&mut self, writer: &WriterHandle, frame: Bytes, completion: Completion) {
        if *self.state.borrow() != ConnectionState::Connected {
            let _ = completion.send(Err(FramelinkError::NotConnected));
            self.stats.release(1);
            return;
        }

        self.queue.push(completion);
        // A failed hand-off means the writer exited; its join result ends
        // the loop and drains this slot with the rest.
        if writer.send(frame).is_ok() {
            self.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Fail everything still waiting, then publish `Closed`.
    fn finish<F>(&mut self, reason: F)
    where
        F: FnMut() -> FramelinkError,
    {
        let drained = self.queue.drain_all(reason);
        if drained > 0 {
            tracing::debug!(count = drained, "Failed pending requests on shutdown");
        }
        self.stats.release(drained);

        // Commands that raced with the shutdown never reached the queue.
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            if let SessionCommand::Send { completion, .. } = command {
                let _ = completion.send(Err(FramelinkError::NotConnected));
                self.stats.release(1);
            }
        }

        self.state.send_replace(ConnectionState::Closed);
        tracing::debug!("Session closed");
    }
}

impl<S> ConnectionSession<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Create a session over a single bidirectional stream.
    pub fn from_stream(stream: S, config: SessionConfig) -> (Self, ClientHandle) {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer, config)
    }
}

/// Session plus its first handle, before either is handed out.
struct Built<R, W> {
    inner: ConnectionSession<R, W>,
    handle: ClientHandle,
}

impl<R, W> Built<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn spawn(self) -> ClientHandle {
        tokio::spawn(self.inner.run());
        self.handle
    }
}
