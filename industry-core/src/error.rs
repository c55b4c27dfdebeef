//! Error types for Industry operations

use thiserror::Error;

/// Cache store errors.
///
/// Every variant is fatal for the call that produced it. The store never
/// retries on its own.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Failed to open cache store at {path}: {reason}")]
    EnvOpen { path: String, reason: String },

    #[error("Schema creation failed: {reason}")]
    SchemaCreation { reason: String },

    #[error("Transaction failed: {reason}")]
    Transaction { reason: String },

    #[error("Failed to serialize cached item: {reason}")]
    Serialization { reason: String },

    #[error("Failed to deserialize cached item: {reason}")]
    Deserialization { reason: String },

    #[error("I/O error: {reason}")]
    Io { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io {
            reason: e.to_string(),
        }
    }
}

/// Configuration errors. Raised at construction time and never recovered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid cache strategy: {value}")]
    InvalidStrategy { value: String },

    #[error("Invalid lazy_load_until value: {value}")]
    InvalidLazyLoadUntil { value: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Errors raised on the generation side of a fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("Generation failed: {reason}")]
    Failed { reason: String },

    #[error("Invalid generator response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Top-up gave up after {rounds} rounds: needed {needed} items, received {received}")]
    TopUpExhausted {
        needed: usize,
        received: usize,
        rounds: u32,
    },
}

/// Master error type for all Industry errors.
#[derive(Debug, Clone, Error)]
pub enum IndustryError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),
}

/// Result type alias for Industry operations.
pub type IndustryResult<T> = Result<T, IndustryError>;

// =============================================================================
// TESTS
// =============================================================================
