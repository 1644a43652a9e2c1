//! Error types for readpos operations.
//!
//! This module provides the error hierarchy using `thiserror` for opening
//! and migrating the position database, validating position values, and
//! running CLI commands.

use thiserror::Error;

/// Result type alias for readpos operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for storage-layer operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The database could not be opened or brought to the current revision.
    ///
    /// No handle is returned when this occurs; the file is left at the
    /// revision it had before the call.
    #[error("failed to open database {path}: {source}")]
    Open {
        /// Path of the database file.
        path: String,
        /// Underlying storage failure.
        #[source]
        source: StorageError,
    },

    /// Storage-related errors outside of the open path.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A position value failed validation.
    #[error("invalid value: {0}")]
    Value(#[from] ValueError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

impl Error {
    /// Returns the storage error behind this error, if any.
    #[must_use]
    pub const fn storage_error(&self) -> Option<&StorageError> {
        match self {
            Self::Open { source, .. } | Self::Storage(source) => Some(source),
            _ => None,
        }
    }
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The database file could not be opened or configured.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Database query or engine error.
    #[error("database error: {0}")]
    Database(String),

    /// The revision set definition could not be loaded.
    #[error("invalid revision set: {0}")]
    RevisionSet(String),

    /// A statement of a schema revision failed to execute.
    #[error("migration to revision {revision} failed: {reason}")]
    Migration {
        /// Revision being applied.
        revision: u32,
        /// Engine error message.
        reason: String,
    },

    /// The version record belongs to a different application.
    #[error("database application ID is {found} but should be {expected}")]
    IdentityMismatch {
        /// Application ID stored in the file.
        found: String,
        /// Application ID this build expects.
        expected: String,
    },

    /// The file header carries a foreign application tag.
    #[error("database header application tag is {found:#010x} but should be {expected:#010x}")]
    ApplicationTagMismatch {
        /// Tag stored in the file header.
        found: i32,
        /// Tag this build expects.
        expected: i32,
    },

    /// The version table exists but holds no row.
    #[error("schema_version table is empty")]
    VersionRecordMissing,

    /// The file is at a revision newer than any this build knows.
    #[error("database is at revision {found}, newer than the latest known revision {latest}")]
    UnsupportedRevision {
        /// Revision stored in the file.
        found: u32,
        /// Newest revision in the revision set.
        latest: u32,
    },

    /// A stored row could not be decoded into a position record.
    #[error("invalid stored record for {key}: {reason}")]
    InvalidRecord {
        /// Entity key of the row.
        key: String,
        /// Why the row was rejected.
        reason: String,
    },
}

/// Validation errors for position values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A required identifier was empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A numeric value was outside the representable range.
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::RevisionSet(err.to_string())
    }
}
