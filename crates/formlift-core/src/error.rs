//! Error types for field extraction operations.

use std::io;
use thiserror::Error;

/// Errors that can occur while turning document text into field records.
///
/// Structural ambiguity (an inconclusive grid, an unmatched template) is
/// never an error: those cases recover locally with a conservative
/// interpretation. Only inputs that cannot be processed at all surface here.
#[derive(Debug, Error)]
pub enum FormliftError {
    /// The document text is degenerate (empty, non-text, or otherwise
    /// unusable). Batch drivers should skip the document and continue.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The template catalog could not be loaded or is internally invalid.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for formlift operations
pub type Result<T> = std::result::Result<T, FormliftError>;
