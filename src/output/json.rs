//! JSON output formatting

use chrono::Utc;
use serde::Serialize;

use crate::client::PageMeta;

/// Wrapper for JSON output with metadata
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    /// The actual data
    pub data: T,

    /// Metadata about the response
    pub meta: Metadata,
}

/// Metadata included in JSON output
#[derive(Debug, Default, Serialize)]
pub struct Metadata {
    /// Timestamp of the response
    pub timestamp: String,

    /// CLI version
    pub version: String,

    /// Cache key the data was stored under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,

    /// Pagination as reported by the API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageMeta>,

    /// Most recent fetch failure, when the data shown is last-known-good
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> JsonOutput<T> {
    /// Create a new JSON output with metadata
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: Metadata {
                timestamp: Utc::now().to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Metadata::default()
            },
        }
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.meta.cache_key = Some(key.into());
        self
    }

    pub fn with_pagination(mut self, pagination: Option<PageMeta>) -> Self {
        self.meta.pagination = pagination;
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.meta.error = error;
        self
    }
}

impl<T: Serialize> JsonOutput<T> {
    /// Pretty-printed JSON
    pub fn render(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Format data as pretty-printed JSON
pub fn format_json<T: Serialize + ?Sized>(data: &T) -> Result<String, serde_json::Error> {
    JsonOutput::new(data).render()
}
