//! # framelink
//!
//! Asynchronous client for services that speak length-prefixed JSON over TCP.
//!
//! Every message is a frame: a 4-byte big-endian payload length followed by
//! that many bytes of UTF-8 JSON. Requests carry no identifier; the server
//! answers them in the order it received them, and the client matches the
//! n-th response to the n-th request.
//!
//! ## Architecture
//!
//! - **Framing** ([`protocol`]): length prefix codec and a reassembly buffer
//!   that rebuilds frames from arbitrary socket chunks
//! - **Correlation** ([`pending`]): FIFO queue of single-assignment slots
//! - **Session** ([`session`]): one task per connection owning the buffer,
//!   the queue and the lifecycle state; a separate writer task batches
//!   outbound frames
//!
//! ## Example
//!
//! ```ignore
//! use framelink::{Client, Request};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> framelink::Result<()> {
//!     let client = Client::builder().connect("127.0.0.1", 8080).await?;
//!
//!     let files = client.send(&Request::get("/files"))?;
//!     let search = client.send(&Request::get("/search").body(json!({ "query": "mr" })))?;
//!
//!     println!("{}", files.await?);
//!     println!("{}", search.await?);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod pending;
pub mod protocol;
pub mod session;
pub mod transport;

mod client;
mod writer;

pub use client::{connect, Client, ClientBuilder, ClientHandle};
pub use codec::FrameCodec;
pub use config::SessionConfig;
pub use error::{FramelinkError, Result};
pub use message::{Request, Response, ResponseStatus};
pub use pending::{PendingRequest, PendingRequestQueue};
pub use session::{ConnectionSession, ConnectionState, SessionStats, TcpSession};
