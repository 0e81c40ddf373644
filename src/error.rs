//! Error types for framelink.

use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

/// Main error type for all framelink operations.
#[derive(Debug, Error)]
pub enum FramelinkError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The message could not be serialized to a JSON payload.
    #[error("Encoding error: {0}")]
    Encode(#[source] serde_json::Error),

    /// The encoded payload does not fit the length prefix or the configured limit.
    #[error("Payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// A complete frame carried a payload that is not valid JSON.
    #[error("Decode error ({} bytes): {source}", raw.len())]
    Decode {
        /// The raw payload as received.
        raw: Bytes,
        #[source]
        source: serde_json::Error,
    },

    /// A well-formed response did not match the type the caller asked for.
    #[error("Response does not match the requested type: {source}")]
    ResponseType {
        /// The decoded response.
        value: serde_json::Value,
        #[source]
        source: serde_json::Error,
    },

    /// `send` refused because the in-flight limit is reached.
    #[error("Too many requests in flight (limit {0})")]
    TooManyInFlight(usize),

    /// A response frame arrived with no request waiting for it.
    #[error("Correlation error: received a frame with no pending request")]
    Correlation,

    /// Stream-fatal protocol violation (e.g. oversized length prefix).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Low-level connection failure (refused, reset, resolution failure).
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connection closed before the request completed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// `send` attempted while the session is not connected.
    #[error("Not connected")]
    NotConnected,

    /// Connect did not complete in time.
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Caller-side request deadline elapsed.
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),
}

impl FramelinkError {
    /// Create a connection error from anything displayable.
    pub fn connection(message: impl std::fmt::Display) -> Self {
        Self::Connection(message.to_string())
    }

    /// True for failures raised while turning a message into wire bytes.
    pub fn is_encoding(&self) -> bool {
        matches!(self, Self::Encode(_) | Self::PayloadTooLarge { .. })
    }

    /// True for failures that end the connection for every caller.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Protocol(_)
                | Self::Connection(_)
                | Self::ConnectionClosed
                | Self::ConnectTimeout(_)
        )
    }
}

/// Result type alias using FramelinkError.
pub type Result<T> = std::result::Result<T, FramelinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(FramelinkError::PayloadTooLarge { size: 10, max: 5 }.is_encoding());
        assert!(!FramelinkError::PayloadTooLarge { size: 10, max: 5 }.is_connection());
        assert!(FramelinkError::ConnectionClosed.is_connection());
        assert!(FramelinkError::connection("reset").is_connection());
        assert!(!FramelinkError::NotConnected.is_connection());
        assert!(!FramelinkError::Correlation.is_encoding());
        assert!(!FramelinkError::TooManyInFlight(8).is_connection());
    }

    #[test]
    fn test_decode_error_display_includes_size() {
        let source = serde_json::from_slice::<serde_json::Value>(b"{oops").unwrap_err();
        let err = FramelinkError::Decode {
            raw: Bytes::from_static(b"{oops"),
            source,
        };
        assert!(err.to_string().starts_with("Decode error (5 bytes)"));
    }
}
