//! Error types for the healthlog_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for healthlog_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed import bundle, token, time slot or date.
    /// Nothing has been mutated when this is returned.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller asked for something the current state cannot satisfy
    /// (e.g. renaming a medication that is not in the catalog).
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// A write to the persistence backend failed
    #[error("Persistence error during {operation}: {source}")]
    Persistence {
        operation: String,
        #[source]
        source: Box<Error>,
    },

    /// The backend applied only part of a full import
    #[error(
        "Partial import failure: wrote [{}], failed [{}]: {reason}",
        .written.join(", "),
        .failed.join(", ")
    )]
    PartialImport {
        written: Vec<String>,
        failed: Vec<String>,
        reason: String,
    },

    /// Login or user management failure
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Requested user or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Wrap an error raised while talking to the store
    pub fn persistence(operation: impl Into<String>, source: Error) -> Self {
        Error::Persistence {
            operation: operation.into(),
            source: Box::new(source),
        }
    }
}
