//! Error types for query execution

use thiserror::Error;

/// Query execution errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// Error from hexad-core (storage, decoding)
    #[error("Core error: {0}")]
    Core(#[from] hexad_core::Error),

    /// Pattern cannot be compiled (e.g. a triple with three variables)
    #[error("Malformed pattern: {0}")]
    MalformedPattern(String),

    /// Variable not found in the pattern
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// Invalid query arguments (domain / starting index mismatch)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
