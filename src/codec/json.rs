//! JSON payload codec using `serde_json`.
//!
//! Payloads travel as UTF-8 JSON. Decoding validates UTF-8 as part of
//! parsing, so a payload with invalid bytes is a decode error like any
//! other malformed JSON.
//!
//! # Example
//!
//! ```
//! use framelink::codec::JsonCodec;
//! use bytes::Bytes;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Message {
//!     id: u32,
//!     content: String,
//! }
//!
//! let msg = Message { id: 42, content: "hello".to_string() };
//! let encoded = Bytes::from(JsonCodec::encode(&msg).unwrap());
//! let decoded: Message = JsonCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, msg);
//! ```

use bytes::Bytes;

use crate::error::{FramelinkError, Result};

/// JSON codec for structured payloads.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `Encode` if the value cannot be serialized (e.g. a map with
    /// non-string keys).
    #[inline]
    pub fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(FramelinkError::Encode)
    }

    /// Decode JSON bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns `Decode` carrying the raw bytes if they are not valid JSON
    /// for type `T`.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &Bytes) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|source| FramelinkError::Decode {
            raw: bytes.clone(),
            source,
        })
    }
}
