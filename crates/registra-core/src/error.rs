//! Error types for the registra records engine.

use thiserror::Error;

/// Result type alias using registra's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for registra operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The relational store is unreachable or a query failed in
    /// transport (wraps sqlx::Error). Fatal for the current operation.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A table or its column metadata does not exist on this deployment.
    /// Non-fatal at probe sites; callers treat it as "feature absent".
    #[error("Schema unavailable for table: {0}")]
    SchemaUnavailable(String),

    /// After filtering candidates against the live column set, nothing
    /// remained to write. The schema has drifted too far to proceed.
    #[error("No applicable columns for table: {0}")]
    NoApplicableColumns(String),

    /// A constraint violation rejected the write (unique email, foreign
    /// key, check constraint). Callers map this to a conflict outcome.
    #[error("Write rejected: {0}")]
    WriteRejected(String),

    /// The archive table is missing. Archival is a precondition for
    /// deleting live data and is never silently skipped.
    #[error("Archive unavailable: {0}")]
    ArchiveUnavailable(String),

    /// The record to provision against or archive does not exist.
    #[error("Record not found: {0}")]
    RecordNotFound(i64),

    /// Invalid input (bad SQL identifier, malformed request)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
