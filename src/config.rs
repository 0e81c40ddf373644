//! Session configuration.

use std::time::Duration;

use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Default socket read buffer size (64KB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time `close()` waits for queued frames to reach the socket.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on requests sent but not yet answered.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

/// Configuration for one connection session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Largest payload accepted in either direction.
    pub max_payload_size: u32,
    /// Size of the buffer handed to each socket read.
    pub read_buffer_size: usize,
    /// How long `connect` may take before failing.
    pub connect_timeout: Duration,
    /// How long `close` waits for the writer to flush.
    pub close_timeout: Duration,
    /// Requests that may await a response at once; `send` fails beyond it.
    pub max_in_flight: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}
