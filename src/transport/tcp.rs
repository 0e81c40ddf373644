//! TCP connection setup.
//!
//! # Example
//!
//! ```ignore
//! use framelink::transport::connect_tcp;
//! use std::time::Duration;
//!
//! let stream = connect_tcp("127.0.0.1", 8080, Duration::from_secs(5)).await?;
//! ```

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{FramelinkError, Result};

/// Open a TCP connection to `host:port` within `connect_timeout`.
///
/// Nagle's algorithm is disabled: frames are small and latency-bound.
///
/// # Errors
///
/// - `Connection` if resolution or the connect itself fails
/// - `ConnectTimeout` if it does not complete in time
pub async fn connect_tcp(host: &str, port: u16, connect_timeout: Duration) -> Result<TcpStream> {
    let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
        .await
        .map_err(|_| FramelinkError::ConnectTimeout(connect_timeout))?
        .map_err(|e| FramelinkError::connection(format!("{}:{}: {}", host, port, e)))?;

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
    }

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect_tcp("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = connect_tcp("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FramelinkError::Connection(_)));
    }
}
