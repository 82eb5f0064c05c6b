//! Error types for the post-list cache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the post-list cache subsystem
///
/// Every variant carries owned, cloneable data so that a single failed load
/// can be delivered to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Cache Key Errors
    // =========================================================================
    /// Malformed page cache key
    #[error("Invalid cache key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    // =========================================================================
    // Load Path Errors
    // =========================================================================
    /// Persistent store call failed
    #[error("Persistent store error: {0}")]
    Store(String),

    /// Shared cache read failed
    #[error("Shared cache error: {0}")]
    SharedStore(String),

    /// Shared cache transactional write failed
    #[error("Shared cache write failed for key {key}: {reason}")]
    SharedWrite { key: String, reason: String },

    /// The single-flight load task died before producing a value
    #[error("Cache load aborted: {0}")]
    LoadAborted(String),

    // =========================================================================
    // Service Errors
    // =========================================================================
    /// Caller supplied an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build an `InvalidKey` error
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True for failures that indicate a broken caller contract rather than
    /// an unavailable dependency.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::InvalidKey { .. } | Error::InvalidArgument(_) | Error::Config(_)
        )
    }
}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::SharedStore(err.to_string())
    }
}
