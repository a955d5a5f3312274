//! Error types for stockcache

use std::time::Duration;
use thiserror::Error;

use crate::cache::retry::legacy;

/// Result type alias for stockcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

/// API-related errors
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Authentication failed. Run `stockcache init` to set an API token.")]
    Unauthorized,

    #[error("Access denied. Your role does not grant access to this resource.")]
    Forbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded. Retry after {0:?}")]
    RateLimit(Duration),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error: {message}")]
    ServerError { message: String, transient: bool },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether a retry of the same request may succeed.
    ///
    /// Server errors are transient when the API flagged them so; untagged
    /// server messages fall back to the legacy message heuristic.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::RateLimit(_) => true,
            ApiError::ServerError { message, transient } => {
                *transient || legacy::is_transient_message(message)
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to API".to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found. Run `stockcache init` to set up.")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("API URL not configured. Run `stockcache init` or pass --api-url.")]
    MissingApiUrl,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Persistent store errors.
///
/// These never reach a query consumer: the store adapter logs and swallows
/// them, degrading to a cache miss or a dropped write.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("Entry of {size} bytes exceeds the {limit} byte record limit")]
    EntryTooLarge { size: usize, limit: usize },

    #[error("Failed to encode cache payload: {0}")]
    Encode(String),

    #[error("Failed to decode cache payload: {0}")]
    Decode(String),

    #[error("Cache store lock poisoned")]
    Poisoned,
}

/// Retry classification attached to a producer failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// May succeed if retried (database hiccups, network drops, rate limits)
    Transient,
    /// Retrying will not help (not found, forbidden, invalid input)
    Permanent,
}

/// Failure reported by a query producer.
///
/// Producers tag their errors explicitly; [`FetchError::untagged`] is the
/// compatibility path for raw messages that carry no classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Permanent,
            message: message.into(),
        }
    }

    /// Classify a bare error message with the legacy pattern list.
    pub fn untagged(message: impl Into<String>) -> Self {
        let message = message.into();
        if legacy::is_transient_message(&message) {
            Self::transient(message)
        } else {
            Self::permanent(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FetchErrorKind::Transient
    }
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            // The API did not flag it; only the message is left to go on
            ApiError::ServerError {
                transient: false, ..
            } => FetchError::untagged(err.to_string()),
            err if err.is_transient() => FetchError::transient(err.to_string()),
            err => FetchError::permanent(err.to_string()),
        }
    }
}
