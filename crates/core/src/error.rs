//! Error types for the CosmoCat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for CosmoCat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Engine errors ---
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Initialization failed earlier; the engine stays down for the process lifetime.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Weights or tokenizer missing, unreadable or corrupt.
    #[error("Model artifacts error: {0}")]
    Artifacts(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Generation timed out: {0}")]
    Timeout(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Chat not found: {0}")]
    NotFound(String),

    #[error("Failed to encode chat history: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_displays_correctly() {
        let err = Error::Engine(EngineError::Artifacts("tokenizer.json missing".into()));
        assert!(err.to_string().contains("artifacts"));
        assert!(err.to_string().contains("tokenizer.json"));
    }

    #[test]
    fn engine_errors_convert_into_the_top_level_error() {
        let err: Error = EngineError::Timeout("no completion within 30.0s".into()).into();
        assert!(matches!(err, Error::Engine(EngineError::Timeout(_))));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn store_error_displays_correctly() {
        let err = Error::Store(StoreError::NotFound("abc123".into()));
        assert!(err.to_string().contains("abc123"));
    }
}
