//! Codec module - payload serialization and stream framing.
//!
//! - [`JsonCodec`] - JSON payloads using `serde_json`
//! - [`FrameCodec`] - length-prefixed frames over a byte stream
//!
//! # Design
//!
//! `JsonCodec` is a marker struct with static methods rather than a trait
//! object. `FrameCodec` holds only the reassembly buffer and does no I/O.
//!
//! # Example
//!
//! ```
//! use framelink::codec::FrameCodec;
//! use serde_json::{json, Value};
//!
//! let mut codec = FrameCodec::new(u32::MAX);
//! let wire = codec.encode(&json!({ "query": "mr" })).unwrap();
//!
//! let frames = codec.feed(&wire).unwrap();
//! let value: Value = FrameCodec::decode(&frames[0]).unwrap();
//! assert_eq!(value["query"], "mr");
//! ```

mod frame_codec;
mod json;

pub use frame_codec::{encode_message, FrameCodec};
pub use json::JsonCodec;
