//! Transport module - socket setup.
//!
//! Sessions run over any `AsyncRead + AsyncWrite` stream; this module only
//! opens the TCP connection used by [`connect`](crate::connect).

mod tcp;

pub use tcp::connect_tcp;
