//! Wire format encoding and decoding.
//!
//! Every message is a length-prefixed frame:
//! ```text
//! ┌──────────────┬──────────────────────────┐
//! │ Length       │ Payload                  │
//! │ 4 bytes      │ `length` bytes           │
//! │ uint32 BE    │ UTF-8 JSON               │
//! └──────────────┴──────────────────────────┘
//! ```
//!
//! No magic number, no version field, no checksum.

use crate::error::{FramelinkError, Result};

/// Length prefix size in bytes (fixed, exactly 4).
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload size (1 GB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_073_741_824;

/// Absolute maximum payload size (largest value the prefix can carry).
pub const ABSOLUTE_MAX_PAYLOAD_SIZE: u32 = u32::MAX;

/// Encode a payload length as a big-endian prefix.
///
/// # Example
///
/// ```
/// use framelink::protocol::encode_length_prefix;
///
/// let prefix = encode_length_prefix(10, u32::MAX).unwrap();
/// assert_eq!(prefix, [0, 0, 0, 10]);
/// ```
///
/// # Errors
///
/// Returns `PayloadTooLarge` if `len` does not fit in a `u32` or exceeds
/// `max_payload_size`.
pub fn encode_length_prefix(len: usize, max_payload_size: u32) -> Result<[u8; LENGTH_PREFIX_SIZE]> {
    let length = u32::try_from(len).map_err(|_| FramelinkError::PayloadTooLarge {
        size: len,
        max: ABSOLUTE_MAX_PAYLOAD_SIZE as usize,
    })?;

    if length > max_payload_size {
        return Err(FramelinkError::PayloadTooLarge {
            size: len,
            max: max_payload_size as usize,
        });
    }

    Ok(length.to_be_bytes())
}

/// Decode a big-endian length prefix.
///
/// Returns `None` if the buffer is too short.
#[inline]
pub fn decode_length_prefix(buf: &[u8]) -> Option<u32> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = buf.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix))
}

/// Check a declared inbound length against the configured maximum.
pub fn validate_length(length: u32, max_payload_size: u32) -> Result<()> {
    if length > max_payload_size {
        return Err(FramelinkError::Protocol(format!(
            "Payload size {} exceeds maximum {}",
            length, max_payload_size
        )));
    }
    Ok(())
}
