//! Frame struct and frame building.
//!
//! A frame is the payload of one length-prefixed message. The prefix is
//! implied by the payload length and is not stored.
//!
//! # Example
//!
//! ```
//! use framelink::protocol::Frame;
//! use bytes::Bytes;
//!
//! let frame = Frame::new(Bytes::from_static(br#"{"ok":true}"#));
//! assert_eq!(frame.payload_len(), 11);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{encode_length_prefix, LENGTH_PREFIX_SIZE};
use crate::error::Result;

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from payload bytes.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// Build a complete frame as a single contiguous buffer.
///
/// # Example
///
/// ```
/// use framelink::protocol::build_frame;
///
/// let bytes = build_frame(b"hello", u32::MAX).unwrap();
/// assert_eq!(&bytes[..], b"\x00\x00\x00\x05hello");
/// ```
///
/// # Errors
///
/// Returns `PayloadTooLarge` if the payload exceeds `max_payload_size`.
pub fn build_frame(payload: &[u8], max_payload_size: u32) -> Result<Bytes> {
    let prefix = encode_length_prefix(payload.len(), max_payload_size)?;
    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_slice(&prefix);
    buf.put_slice(payload);
    Ok(buf.freeze())
}
