//! Error types for the retrieval engine.

/// Errors surfaced by the indexing and retrieval core.
///
/// Parse and embedding failures are recoverable per file: the indexer
/// records them in the run report instead of aborting the pass. `NotFound`
/// and `InvalidFilter` are returned synchronously to the caller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Source text could not be parsed with the grammar for its language.
    #[error("parse failed: {0}")]
    Parse(String),

    /// The embedding provider failed after retries.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// No chunk matches the requested identifier.
    #[error("no chunk matches identifier '{0}'")]
    NotFound(String),

    /// A search filter value is not part of the supported enumeration.
    #[error("invalid {field} filter: '{value}'")]
    InvalidFilter { field: &'static str, value: String },

    /// IO error reading source files or index state.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using `EngineError`.
pub type Result<T> = std::result::Result<T, EngineError>;
