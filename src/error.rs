//! Error types for the salestage import pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ParseError`] - CSV reading and decoding errors
//! - [`UploadError`] - Pre-parse input rejection (file type, size, company)
//! - [`StoreError`] - Staging store persistence errors
//! - [`CommitError`] - Batch state-transition failures
//! - [`QueryError`] - Review query failures
//! - [`ConfigError`] - Configuration loading errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Per-row validation failures are deliberately NOT errors: they are data,
//! accumulated on the staged row (see `models::RowOutcome`).

use thiserror::Error;
use uuid::Uuid;

use crate::models::BatchStatus;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while reading and decoding a CSV stream.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Failed to read the input.
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode bytes under the detected encoding.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Malformed CSV structure.
    #[error("Invalid CSV format: {0}")]
    Malformed(String),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Upload Errors (pre-parse input guards)
// =============================================================================

/// Input rejected before any row is read. No batch is created for these.
#[derive(Debug, Error)]
pub enum UploadError {
    /// File extension is not an accepted tabular format.
    #[error("Unsupported file type: '{0}' (accepted: csv, tsv, txt)")]
    UnsupportedFileType(String),

    /// File exceeds the configured size cap.
    #[error("File is {size} bytes, exceeding the {limit} byte limit")]
    FileTooLarge { size: usize, limit: usize },

    /// Company code is not in the configured registry.
    #[error("Unknown source company: '{0}'")]
    UnknownCompany(String),

    /// CSV-level failure (unreadable stream, no headers, ...).
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

// =============================================================================
// Staging Store Errors
// =============================================================================

/// Errors from the staging store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization of the per-row error list failed.
    #[error("Row error serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded into its domain type.
    #[error("Corrupt stored value in column '{column}': '{value}'")]
    Corrupt { column: &'static str, value: String },

    /// A `Failed` parse result must never reach the store.
    #[error("A failed parse is never staged")]
    FailedParse,
}

// =============================================================================
// Commit Engine Errors
// =============================================================================

/// Batch state-transition failures from commit/cancel.
///
/// Callers must surface these to the operator rather than retry blindly:
/// `AlreadyCommitted` and `InvalidState` mean the batch is already settled.
#[derive(Debug, Error)]
pub enum CommitError {
    /// No batch with this id exists in staging.
    #[error("Import batch not found: {0}")]
    NotFound(Uuid),

    /// The batch was already committed (possibly by a concurrent call).
    #[error("Import batch {0} is already committed")]
    AlreadyCommitted(Uuid),

    /// The batch is in a state that does not allow this transition.
    #[error("Import batch {batch_id} is {status}, which does not allow this operation")]
    InvalidState { batch_id: Uuid, status: BatchStatus },

    /// Underlying store failure; the transaction was rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors from the batch query service.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No batch with this id exists.
    #[error("Import batch not found: {0}")]
    NotFound(Uuid),

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading the import configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML.
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A company profile carries an unusable date format.
    #[error("Company '{code}' has an invalid date format: '{format}'")]
    BadDateFormat { code: String, format: String },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for parse operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// Result type for staging store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for commit/cancel operations.
pub type CommitResult<T> = Result<T, CommitError>;

/// Result type for review queries.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ParseError -> UploadError
        let parse_err = ParseError::EmptyFile;
        let upload_err: UploadError = parse_err.into();
        assert!(upload_err.to_string().contains("empty"));

        // sqlx::Error -> StoreError
        let store_err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(store_err.to_string().contains("Database error"));
    }

    #[test]
    fn test_upload_error_messages() {
        let err = UploadError::FileTooLarge { size: 2048, limit: 1024 };
        let msg = err.to_string();
        assert!(msg.contains("2048"));
        assert!(msg.contains("1024"));

        let err = UploadError::UnknownCompany("zz".into());
        assert!(err.to_string().contains("'zz'"));
    }

    #[test]
    fn test_commit_error_messages() {
        let id = Uuid::new_v4();
        let err = CommitError::InvalidState { batch_id: id, status: BatchStatus::Cancelled };
        let msg = err.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("Cancelled"));
    }
}
