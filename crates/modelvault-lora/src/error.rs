//! Error types for adapter operations

use std::path::PathBuf;
use thiserror::Error;

/// Adapter errors
#[derive(Debug, Error)]
pub enum LoraError {
    /// No search root holds the adapter
    #[error("Adapter not found: {0}")]
    NotFound(String),

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Payload could not be decoded
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Matrix dimensions disagree
    #[error("Shape mismatch on {layer}: expected {expected} values, got {actual}")]
    Shape {
        layer: String,
        expected: usize,
        actual: usize,
    },

    #[error("File too large: {} is {size} bytes (max {max})", .path.display())]
    TooLarge { path: PathBuf, size: u64, max: u64 },
}

/// Result type for adapter operations
pub type Result<T> = std::result::Result<T, LoraError>;
