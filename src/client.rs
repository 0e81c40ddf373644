//! Client builder and handle.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring and opening
//! a connection. The [`ClientHandle`] is the cloneable surface callers use
//! to send requests and close the connection.
//!
//! # Example
//!
//! ```ignore
//! use framelink::{Client, Request};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .connect_timeout(std::time::Duration::from_secs(3))
//!         .connect("127.0.0.1", 8080)
//!         .await?;
//!
//!     // Pipelined: both requests are on the wire before either answer.
//!     let first = client.send(&Request::get("/search").body(json!({ "query": "mr" })))?;
//!     let second = client.send(&Request::get("/search").body(json!({ "query": "rust" })))?;
//!
//!     println!("{}", first.await?);
//!     println!("{}", second.await?);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::codec::encode_message;
use crate::config::SessionConfig;
use crate::error::{FramelinkError, Result};
use crate::pending::PendingRequest;
use crate::session::{ConnectionState, SessionCommand, SessionStats, TcpSession};

/// Entry point for building clients.
pub struct Client;

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

/// Builder for configuring and opening a connection.
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: SessionConfig,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the largest payload accepted in either direction.
    ///
    /// Default: 1 GB
    pub fn max_payload_size(mut self, limit: u32) -> Self {
        self.config.max_payload_size = limit;
        self
    }

    /// Set the socket read buffer size.
    ///
    /// Default: 64KB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Set the connect timeout.
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set how long `close()` waits for queued frames to be written.
    ///
    /// Default: 5 seconds
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.config.close_timeout = timeout;
        self
    }

    /// Set how many requests may await a response at once.
    ///
    /// Default: 1024
    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.config.max_in_flight = limit;
        self
    }

    /// Get the configuration built so far.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a TCP connection and start the session.
    pub async fn connect(self, host: &str, port: u16) -> Result<ClientHandle> {
        TcpSession::connect(host, port, self.config).await
    }
}

/// Connect to `host:port` with the default configuration.
pub async fn connect(host: &str, port: u16) -> Result<ClientHandle> {
    ClientBuilder::new().connect(host, port).await
}

/// Handle to a running session.
///
/// Cheap to clone; every clone talks to the same connection. The session
/// closes itself once the last handle is dropped.
#[derive(Clone, Debug)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<ConnectionState>,
    stats: Arc<SessionStats>,
    max_payload_size: u32,
    max_in_flight: usize,
}

impl ClientHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<SessionCommand>,
        state: watch::Receiver<ConnectionState>,
        stats: Arc<SessionStats>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            commands,
            state,
            stats,
            max_payload_size: config.max_payload_size,
            max_in_flight: config.max_in_flight,
        }
    }

    /// Send a request and return its pending response.
    ///
    /// Does not wait: the returned [`PendingRequest`] resolves when the
    /// matching response arrives or the connection ends. Requests are
    /// answered in the order they were sent.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the session is not in `Connected`
    /// - `Encode` / `PayloadTooLarge` if the message cannot be framed
    /// - `TooManyInFlight` if `max_in_flight` requests await a response
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<PendingRequest> {
        if self.state() != ConnectionState::Connected {
            return Err(FramelinkError::NotConnected);
        }

        let frame = encode_message(message, self.max_payload_size)?;
        self.send_frame(frame)
    }

    fn send_frame(&self, frame: Bytes) -> Result<PendingRequest> {
        if !self.stats.try_reserve(self.max_in_flight) {
            return Err(FramelinkError::TooManyInFlight(self.max_in_flight));
        }

        let (completion, pending) = PendingRequest::channel();
        if self
            .commands
            .send(SessionCommand::Send { frame, completion })
            .is_err()
        {
            self.stats.release(1);
            return Err(FramelinkError::NotConnected);
        }
        Ok(pending)
    }

    /// Send a request, wait for the response and decode it as `R`.
    pub async fn request<T, R>(&self, message: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let value = self.send(message)?.await?;
        match <R as Deserialize>::deserialize(&value) {
            Ok(typed) => Ok(typed),
            Err(source) => Err(FramelinkError::ResponseType { value, source }),
        }
    }

    /// Send a request and wait at most `deadline` for its response.
    ///
    /// On timeout the request's slot stays queued as a void slot: its
    /// response is discarded when it arrives, so later requests still get
    /// their own responses.
    pub async fn send_timeout<T: Serialize + ?Sized>(
        &self,
        message: &T,
        deadline: Duration,
    ) -> Result<serde_json::Value> {
        let pending = self.send(message)?;
        tokio::time::timeout(deadline, pending)
            .await
            .map_err(|_| FramelinkError::RequestTimeout(deadline))?
    }

    /// Close the connection and wait until the session has shut down.
    ///
    /// Frames already sent are flushed; every request still waiting for a
    /// response fails with `ConnectionClosed`. Calling it again is a no-op.
    pub async fn close(&self) {
        // Fails only if the session task is already gone.
        let _ = self.commands.send(SessionCommand::Close);
        self.closed().await;
    }

    /// Wait until the session reaches `Closed`.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// True while requests can be sent.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Requests accepted by `send` and not yet completed.
    pub fn pending_count(&self) -> usize {
        self.stats.pending()
    }

    /// Session counters.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT};
    use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

    #[test]
    fn test_builder_default() {
        let builder = Client::builder();
        assert_eq!(builder.config().max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
        assert_eq!(builder.config().connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(builder.config().close_timeout, DEFAULT_CLOSE_TIMEOUT);
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Client::builder()
            .max_payload_size(1024)
            .read_buffer_size(512)
            .connect_timeout(Duration::from_secs(1))
            .close_timeout(Duration::from_millis(250))
            .max_in_flight(16);

        assert_eq!(builder.config().max_payload_size, 1024);
        assert_eq!(builder.config().read_buffer_size, 512);
        assert_eq!(builder.config().connect_timeout, Duration::from_secs(1));
        assert_eq!(builder.config().close_timeout, Duration::from_millis(250));
        assert_eq!(builder.config().max_in_flight, 16);
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = connect("127.0.0.1", port).await.unwrap_err();
        assert!(err.is_connection());
    }
}
