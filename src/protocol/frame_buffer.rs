//! Stream reassembly.
//!
//! TCP delivers bytes, not messages. A read may end inside a length prefix,
//! carry a fraction of a payload, or hold several frames at once; all of
//! these are ordinary input here. Bytes accumulate in one `BytesMut` and
//! complete payloads are split off without copying.
//!
//! Parsing alternates between two states:
//! - `WaitingForPrefix`: fewer than 4 unparsed bytes
//! - `WaitingForPayload`: length known, payload incomplete
//!
//! # Example
//!
//! ```
//! use framelink::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! assert!(buffer.push(b"\x00\x00\x00\x02{").unwrap().is_empty());
//! let frames = buffer.push(b"}").unwrap();
//! assert_eq!(frames[0].payload(), b"{}");
//! ```

use bytes::{Buf, BytesMut};

use super::wire_format::{
    decode_length_prefix, validate_length, DEFAULT_MAX_PAYLOAD_SIZE, LENGTH_PREFIX_SIZE,
};
use super::Frame;
use crate::error::Result;

/// Initial capacity of the reassembly buffer (64KB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForPrefix,
    WaitingForPayload { length: u32 },
}

/// Reassembles length-prefixed frames from arbitrary chunks.
///
/// Not thread-safe; a session owns exactly one.
#[derive(Debug)]
pub struct FrameBuffer {
    pending: BytesMut,
    state: State,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// 64KB initial capacity, 1 GiB payload limit.
    pub fn new() -> Self {
        Self::with_capacity_and_max_payload(DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self::with_capacity_and_max_payload(DEFAULT_BUFFER_CAPACITY, max_payload_size)
    }

    pub fn with_capacity_and_max_payload(capacity: usize, max_payload_size: u32) -> Self {
        Self {
            pending: BytesMut::with_capacity(capacity),
            state: State::WaitingForPrefix,
            max_payload_size,
        }
    }

    /// Append a chunk and return every frame it completes, oldest first.
    ///
    /// An incomplete tail stays buffered for the next call.
    ///
    /// # Errors
    ///
    /// `Protocol` when a declared length exceeds the payload limit. Frame
    /// boundaries are lost at that point; the stream must be abandoned.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>> {
        self.pending.extend_from_slice(chunk);

        let mut complete = Vec::new();
        while let Some(frame) = self.next_frame()? {
            complete.push(frame);
        }
        Ok(complete)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let State::WaitingForPrefix = self.state {
            let Some(length) = decode_length_prefix(&self.pending) else {
                return Ok(None);
            };
            // Checked before any payload byte is buffered.
            validate_length(length, self.max_payload_size)?;

            self.pending.advance(LENGTH_PREFIX_SIZE);
            self.state = State::WaitingForPayload { length };
        }

        let State::WaitingForPayload { length } = self.state else {
            return Ok(None);
        };
        let length = length as usize;

        // The buffer grows with received bytes only, never with the declared length.
        if self.pending.len() < length {
            return Ok(None);
        }

        self.state = State::WaitingForPrefix;
        Ok(Some(Frame::new(self.pending.split_to(length).freeze())))
    }

    /// Bytes held that are not yet part of an emitted frame.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is buffered and no frame is half-read.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && matches!(self.state, State::WaitingForPrefix)
    }

    /// Discard buffered bytes and start over at a frame boundary.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.state = State::WaitingForPrefix;
    }

    #[cfg(test)]
    fn awaiting_payload(&self) -> bool {
        matches!(self.state, State::WaitingForPayload { .. })
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_frame;

    fn wire(payload: &[u8]) -> Vec<u8> {
        build_frame(payload, u32::MAX).unwrap().to_vec()
    }

    #[test]
    fn test_whole_frame_in_one_chunk() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&wire(br#"{"status":0}"#)).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), br#"{"status":0}"#);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_coalesced_frames_keep_order() {
        let mut buffer = FrameBuffer::new();
        let chunk: Vec<u8> = ["\"rA\"", "\"rB\"", "\"rC\""]
            .iter()
            .flat_map(|p| wire(p.as_bytes()))
            .collect();

        let frames = buffer.push(&chunk).unwrap();
        let payloads: Vec<&[u8]> = frames.iter().map(Frame::payload).collect();

        assert_eq!(payloads, vec![&b"\"rA\""[..], &b"\"rB\""[..], &b"\"rC\""[..]]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_prefix_split_across_chunks() {
        let mut buffer = FrameBuffer::new();
        let bytes = wire(b"[]");

        assert!(buffer.push(&bytes[..3]).unwrap().is_empty());
        assert!(!buffer.awaiting_payload());

        let frames = buffer.push(&bytes[3..]).unwrap();
        assert_eq!(frames[0].payload(), b"[]");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_payload_split_across_chunks() {
        let mut buffer = FrameBuffer::new();
        let body = br#"{"files":["notes.txt","todo.md","report.pdf"]}"#;
        let bytes = wire(body);
        let cut = LENGTH_PREFIX_SIZE + 7;

        assert!(buffer.push(&bytes[..cut]).unwrap().is_empty());
        assert!(buffer.awaiting_payload());

        let frames = buffer.push(&bytes[cut..]).unwrap();
        assert_eq!(frames[0].payload(), body);
    }

    #[test]
    fn test_declared_ten_supplied_four() {
        let mut buffer = FrameBuffer::new();

        assert!(buffer.push(&[0, 0, 0, 10, b'{', b'"', b'a', b'"']).unwrap().is_empty());
        assert_eq!(buffer.len(), 4);

        assert!(buffer.push(b":[1,").unwrap().is_empty());
        assert_eq!(buffer.len(), 8);

        let frames = buffer.push(b"2]").unwrap();
        assert_eq!(frames[0].payload(), br#"{"a":[1,2]"#);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_every_two_way_split() {
        let bytes = wire(br#"{"meta":{"path":"/search"}}"#);

        for split in 0..=bytes.len() {
            let mut buffer = FrameBuffer::new();
            let mut frames = buffer.push(&bytes[..split]).unwrap();
            frames.extend(buffer.push(&bytes[split..]).unwrap());

            assert_eq!(frames.len(), 1, "split at {}", split);
            assert_eq!(frames[0].payload(), &bytes[LENGTH_PREFIX_SIZE..]);
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn test_every_three_way_split() {
        let bytes = wire(b"[1,2,3]");

        for a in 0..=bytes.len() {
            for b in a..=bytes.len() {
                let mut buffer = FrameBuffer::new();
                let mut frames = buffer.push(&bytes[..a]).unwrap();
                frames.extend(buffer.push(&bytes[a..b]).unwrap());
                frames.extend(buffer.push(&bytes[b..]).unwrap());

                assert_eq!(frames.len(), 1, "splits at {} and {}", a, b);
                assert_eq!(frames[0].payload(), b"[1,2,3]");
            }
        }
    }

    #[test]
    fn test_zero_length_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&[0, 0, 0, 0]).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload_len(), 0);
    }

    #[test]
    fn test_megabyte_payload() {
        let mut buffer = FrameBuffer::new();
        let body = vec![b'x'; 1 << 20];
        let frames = buffer.push(&wire(&body)).unwrap();

        assert_eq!(frames[0].payload_len(), 1 << 20);
    }

    #[test]
    fn test_large_declared_length_does_not_preallocate() {
        let mut buffer = FrameBuffer::new();
        let mut chunk = (512u32 << 20).to_be_bytes().to_vec();
        chunk.push(b'[');

        assert!(buffer.push(&chunk).unwrap().is_empty());
        assert!(buffer.awaiting_payload());
        assert_eq!(buffer.len(), 1);
        assert!(buffer.pending.capacity() <= DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn test_oversized_prefix_is_rejected() {
        let mut buffer = FrameBuffer::with_max_payload(100);

        let err = buffer.push(&1000u32.to_be_bytes()).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_clear_returns_to_frame_boundary() {
        let mut buffer = FrameBuffer::new();
        buffer.push(&wire(b"\"partial\"")[..6]).unwrap();
        assert!(buffer.awaiting_payload());

        buffer.clear();
        assert!(buffer.is_empty());

        let frames = buffer.push(&wire(b"true")).unwrap();
        assert_eq!(frames[0].payload(), b"true");
    }

    #[test]
    fn test_complete_frame_followed_by_partial() {
        let mut buffer = FrameBuffer::new();
        let first = wire(b"1");
        let second = wire(b"22");

        let mut chunk = first.clone();
        chunk.extend_from_slice(&second[..2]);

        let frames = buffer.push(&chunk).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(buffer.len(), 2);

        let frames = buffer.push(&second[2..]).unwrap();
        assert_eq!(frames[0].payload(), b"22");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frames: Vec<Frame> = wire(b"null")
            .iter()
            .flat_map(|byte| buffer.push(std::slice::from_ref(byte)).unwrap())
            .collect();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"null");
    }
}
