//! Cache entry model and its stored representation

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::codec::Codec;
use crate::error::CacheError;

/// A cached payload for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    /// Caller-chosen key, without the store namespace prefix
    pub key: String,

    /// Payload; for error entries this is the last-known-good payload, if any
    pub data: Option<T>,

    /// Capture time in milliseconds since the Unix epoch
    pub timestamp: i64,

    /// The entry records a failed fetch rather than a successful result
    pub is_error: bool,

    /// SHA-256 of the encoded payload; only set on successful entries
    pub data_hash: Option<String>,
}

impl<T> CacheEntry<T> {
    /// Milliseconds elapsed since the entry was captured
    pub fn age_millis(&self, now: i64) -> i64 {
        now - self.timestamp
    }
}

/// Hex-encoded SHA-256 of an encoded payload
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Envelope persisted for each entry.
///
/// The payload is already encoded by the query's codec and carried as
/// base64 so the envelope itself is always plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    pub timestamp: i64,

    #[serde(default)]
    pub is_error: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
}

impl StoredEntry {
    /// Successful entry from an already-encoded payload
    pub fn success(key: &str, payload: &[u8], hash: String, timestamp: i64) -> Self {
        Self {
            key: key.to_string(),
            data: Some(general_purpose::STANDARD.encode(payload)),
            timestamp,
            is_error: false,
            data_hash: Some(hash),
        }
    }

    /// Failure placeholder, optionally retaining an encoded last-known-good payload
    #[cfg(test)]
    pub fn failure(key: &str, retained: Option<&[u8]>, timestamp: i64) -> Self {
        Self {
            key: key.to_string(),
            data: retained.map(|bytes| general_purpose::STANDARD.encode(bytes)),
            timestamp,
            is_error: true,
            data_hash: None,
        }
    }

    /// Encode a typed entry with the given codec
    pub fn encode<T>(entry: &CacheEntry<T>, codec: &dyn Codec<T>) -> Result<Self, CacheError> {
        let data = match &entry.data {
            Some(value) => Some(general_purpose::STANDARD.encode(codec.encode(value)?)),
            None => None,
        };
        Ok(Self {
            key: entry.key.clone(),
            data,
            timestamp: entry.timestamp,
            is_error: entry.is_error,
            data_hash: entry.data_hash.clone(),
        })
    }

    /// Decode into a typed entry
    pub fn decode<T>(self, codec: &dyn Codec<T>) -> Result<CacheEntry<T>, CacheError> {
        let data = match self.data {
            Some(encoded) => {
                let bytes = general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| CacheError::Decode(e.to_string()))?;
                Some(codec.decode(&bytes)?)
            }
            None => None,
        };
        Ok(CacheEntry {
            key: self.key,
            data,
            timestamp: self.timestamp,
            is_error: self.is_error,
            data_hash: self.data_hash,
        })
    }

    /// Entry metadata without the payload, enough for staleness checks
    pub fn header(&self) -> CacheEntry<()> {
        CacheEntry {
            key: self.key.clone(),
            data: None,
            timestamp: self.timestamp,
            is_error: self.is_error,
            data_hash: self.data_hash.clone(),
        }
    }

    /// Copy of this entry captured at a new time
    pub fn touched(&self, timestamp: i64) -> Self {
        Self {
            timestamp,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::codec::JsonCodec;

    #[test]
    fn test_content_hash_is_stable_and_content_sensitive() {
        let a = content_hash(br#"{"id":1}"#);
        let b = content_hash(br#"{"id":1}"#);
        let c = content_hash(br#"{"id":2}"#);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_error_entry_keeps_last_good_payload() {
        let entry = CacheEntry {
            key: "batches_page_1_20".to_string(),
            data: Some(vec!["b-1".to_string()]),
            timestamp: 1_000,
            is_error: true,
            data_hash: None,
        };

        let stored = StoredEntry::encode(&entry, &JsonCodec).unwrap();
        assert!(stored.is_error);
        assert!(stored.data_hash.is_none());

        let decoded = stored.decode::<Vec<String>>(&JsonCodec).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_stored_entry_uses_camel_case_fields() {
        let stored = StoredEntry::success("k", b"[]", content_hash(b"[]"), 42);
        let json = serde_json::to_string(&stored).unwrap();

        assert!(json.contains("\"isError\":false"));
        assert!(json.contains("\"dataHash\""));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let stored = StoredEntry {
            key: "k".to_string(),
            data: Some("%%%".to_string()),
            timestamp: 0,
            is_error: false,
            data_hash: None,
        };
        let result = stored.decode::<String>(&JsonCodec);
        assert!(result.is_err());
    }

    #[test]
    fn test_touched_only_changes_timestamp() {
        let stored = StoredEntry::success("k", b"1", content_hash(b"1"), 10);
        let touched = stored.touched(99);

        assert_eq!(touched.timestamp, 99);
        assert_eq!(touched.data, stored.data);
        assert_eq!(touched.data_hash, stored.data_hash);
    }
}
