//! Message <-> wire bytes, with stream reassembly.
//!
//! `FrameCodec` joins the JSON payload codec with the frame buffer. It does
//! no I/O: the session feeds it whatever the socket returned and gets back
//! every frame that became complete.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::JsonCodec;
use crate::error::Result;
use crate::protocol::{build_frame, Frame, FrameBuffer, DEFAULT_BUFFER_CAPACITY};

/// Encoder for outbound messages and reassembler for inbound bytes.
#[derive(Debug)]
pub struct FrameCodec {
    buffer: FrameBuffer,
    max_payload_size: u32,
}

impl FrameCodec {
    /// Create a codec with the given payload limit (applies both ways).
    pub fn new(max_payload_size: u32) -> Self {
        Self {
            buffer: FrameBuffer::with_capacity_and_max_payload(
                DEFAULT_BUFFER_CAPACITY,
                max_payload_size,
            ),
            max_payload_size,
        }
    }

    /// Serialize `message` and prefix it with its big-endian length.
    ///
    /// # Errors
    ///
    /// `Encode` if serialization fails, `PayloadTooLarge` if the payload does
    /// not fit the prefix or the configured limit.
    pub fn encode<T: Serialize + ?Sized>(&self, message: &T) -> Result<Bytes> {
        encode_message(message, self.max_payload_size)
    }

    /// Append `data` and return every frame completed by it, in order.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.push(data)
    }

    /// Decode a frame's payload. Failure leaves the codec usable.
    pub fn decode<T: DeserializeOwned>(frame: &Frame) -> Result<T> {
        JsonCodec::decode(&frame.payload)
    }

    /// Bytes received that do not yet form a complete frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// True when no partial frame is held.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop any partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Encode a message into a complete frame without a codec instance.
pub fn encode_message<T: Serialize + ?Sized>(message: &T, max_payload_size: u32) -> Result<Bytes> {
    let payload = JsonCodec::encode(message)?;
    build_frame(&payload, max_payload_size)
}
