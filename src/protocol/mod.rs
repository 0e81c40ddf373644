//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the stream framing:
//! - 4-byte big-endian length prefix encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with payload accessors

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::{FrameBuffer, DEFAULT_BUFFER_CAPACITY};
pub use wire_format::{
    decode_length_prefix, encode_length_prefix, validate_length, ABSOLUTE_MAX_PAYLOAD_SIZE,
    DEFAULT_MAX_PAYLOAD_SIZE, LENGTH_PREFIX_SIZE,
};
