//! Error types for cascade-core

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Missing or invalid model / scoring-function parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed postings or document-vector bytes
    #[error("Decode error: {0}")]
    Decode(String),

    /// Operation not defined for the model it was invoked on
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Scoring function used before `initialize`
    #[error("Scoring function not initialized: {0}")]
    Uninitialized(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Query error: {0}")]
    Query(String),
}

pub type Result<T> = std::result::Result<T, Error>;
