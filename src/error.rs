use thiserror::Error;

/// Main error type for storydump
#[derive(Error, Debug)]
pub enum ExportError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog lookup for a table failed (missing table, permissions, connectivity)
    #[error("Introspection failed for table '{table}': {reason}")]
    Introspection { table: String, reason: String },

    /// No relationship pattern ties the table to the story
    #[error("No relationship to the story could be resolved for table '{table}'")]
    ResolutionUnavailable { table: String },

    /// The store rejected the scoped query or the read dropped mid-way
    #[error("Query failed for table '{table}': {reason}")]
    Execution { table: String, reason: String },

    /// Root story lookup failed; nothing to scope against
    #[error("Story not found: {0}")]
    StoryNotFound(String),

    /// Relationship graph failed validation
    #[error("Invalid relationship graph: {0}")]
    InvalidGraph(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using ExportError
pub type Result<T> = std::result::Result<T, ExportError>;
