//! Payload codecs
//!
//! The cache treats payloads as opaque; each query supplies the codec that
//! turns its payload type into bytes and back.

use serde::{Serialize, de::DeserializeOwned};

use crate::error::CacheError;

/// Serializer/deserializer pair for a cached payload type.
///
/// Implementations must be pure: encoding the same value twice yields the
/// same bytes, since content hashes are computed over the encoded form.
pub trait Codec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Vec<u8>, CacheError>;

    fn decode(&self, bytes: &[u8]) -> Result<T, CacheError>;
}

/// JSON codec for any serde type
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        serde_json::to_vec(value).map_err(|e| CacheError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CacheError> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Decode(e.to_string()))
    }
}
