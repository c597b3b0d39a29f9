//! Error types for Memvault

use thiserror::Error;

/// Main error type for Memvault operations
#[derive(Error, Debug)]
pub enum MemvaultError {
    /// Malformed request (wrong embedding dimension, non-positive limit,
    /// out-of-range threshold). Rejected before any mutation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown record id on a direct lookup
    #[error("Memory '{0}' not found")]
    NotFound(String),

    /// Ciphertext failed authentication or stored bytes are undecodable.
    /// Operational incident, distinct from NotFound.
    #[error("Vault corrupt: {0}")]
    VaultCorrupt(String),

    /// A write could not be confirmed durable. Nothing was committed, so
    /// retrying the whole call is safe.
    #[error("Durability failure: {0}")]
    Durability(String),

    /// Encryption key loading or handling errors
    #[error("Key error: {0}")]
    Key(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// API/server errors
    #[error("API error: {0}")]
    Api(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Unexpected failures. Always logged with context at the point of
    /// origin, never silently swallowed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MemvaultError {
    /// Whether retrying the same request unchanged may succeed.
    ///
    /// Only durability failures qualify: the failed store left no partial
    /// state behind. Validation errors need a fixed request and vault
    /// corruption needs operator intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Durability(_))
    }
}

/// Result type alias for Memvault operations
pub type Result<T> = std::result::Result<T, MemvaultError>;
