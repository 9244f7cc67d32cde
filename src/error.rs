//! Error types for the memory core

use thiserror::Error;

/// Result type alias for memory core operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Main error type for the memory core
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Provider degraded: {0}")]
    ProviderDegraded(String),

    #[error("Crypto failure: {0}")]
    CryptoFailure(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    /// Whether a background task should retry this error (§5 retry discipline)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MemoryError::StorageUnavailable(_) | MemoryError::Http(_) | MemoryError::ProviderDegraded(_)
        )
    }

    /// Stable kind code for callers that need to branch on error class (§7)
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryError::NotFound(_) => "not_found",
            MemoryError::AccessDenied(_) => "access_denied",
            MemoryError::StorageUnavailable(_) => "storage_unavailable",
            MemoryError::ProviderDegraded(_) => "provider_degraded",
            MemoryError::CryptoFailure(_) => "crypto_failure",
            MemoryError::InvalidArgument(_) => "invalid_argument",
            MemoryError::Conflict(_) => "conflict",
            MemoryError::Serialization(_) => "internal",
            MemoryError::Http(_) => "storage_unavailable",
            MemoryError::Config(_) => "internal",
            MemoryError::Internal(_) => "internal",
        }
    }
}
