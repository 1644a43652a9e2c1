//! Connection configuration.
//!
//! [`DatabaseConfig`] is the explicit data-source configuration handed to
//! the [`ConnectionManager`](super::ConnectionManager). It can be built in
//! code or deserialized from JSON; omitted fields take their defaults.

use crate::error::{Error, Result};
use crate::storage::APPLICATION_TAG;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default busy timeout for `SQLite` connections, in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// `SQLite` journal mode.
///
/// Values map 1:1 to `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Write-ahead log. Readers proceed while a writer commits.
    #[default]
    Wal,
    /// Rollback journal, deleted after each transaction.
    Delete,
}

impl JournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` locking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockingMode {
    /// Locks are released at the end of each transaction.
    #[default]
    Normal,
    /// The first connection to write keeps the file locked.
    Exclusive,
}

impl LockingMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Exclusive => "exclusive",
        }
    }
}

/// Transaction isolation for steady-state connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// Never observe another transaction's uncommitted writes.
    #[default]
    ReadCommitted,
    /// Allow dirty reads (shared-cache connections only).
    ReadUncommitted,
}

impl Isolation {
    /// Returns the value for the `read_uncommitted` pragma.
    #[must_use]
    pub const fn read_uncommitted(self) -> bool {
        matches!(self, Self::ReadUncommitted)
    }
}

/// Data-source configuration for a position database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Journal mode, re-asserted on every connection.
    pub journal_mode: JournalMode,
    /// Locking mode.
    pub locking_mode: LockingMode,
    /// Whether foreign-key constraints are enforced.
    pub foreign_keys: bool,
    /// Isolation level for get/save connections.
    pub isolation: Isolation,
    /// How long to wait on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Integer tag stored in the file header (`PRAGMA application_id`).
    pub application_tag: i32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::Wal,
            locking_mode: LockingMode::Normal,
            foreign_keys: true,
            isolation: Isolation::ReadCommitted,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            application_tag: APPLICATION_TAG,
        }
    }
}

impl DatabaseConfig {
    /// Returns the busy timeout as a duration.
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Parses a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on malformed JSON or unknown fields.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config {
            message: e.to_string(),
        })
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_json(&json)
    }
}
