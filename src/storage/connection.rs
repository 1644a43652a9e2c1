//! Connection management.
//!
//! The [`ConnectionManager`] owns the data-source configuration of one
//! database file and hands out freshly configured connections. No
//! connection is cached: every operation opens its own, runs one
//! transaction on it, and drops it.

use crate::error::{StorageError, StorageResult};
use crate::storage::config::DatabaseConfig;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Produces configured connections to a single database file.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    /// Absolute path to the database file.
    path: PathBuf,
    /// Pragmas applied to every connection.
    config: DatabaseConfig,
}

impl ConnectionManager {
    /// Binds a configuration to a database path.
    ///
    /// The parent directory must already exist; this does not create it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the path cannot be resolved,
    /// its parent directory is missing, or it names a directory.
    pub fn configure(path: impl AsRef<Path>, config: DatabaseConfig) -> StorageResult<Self> {
        let path = path.as_ref();
        let path = std::path::absolute(path).map_err(|e| {
            StorageError::Connection(format!("failed to resolve {}: {e}", path.display()))
        })?;

        match path.parent() {
            Some(parent) if parent.is_dir() => {}
            Some(parent) => {
                return Err(StorageError::Connection(format!(
                    "parent directory {} does not exist",
                    parent.display()
                )));
            }
            None => {
                return Err(StorageError::Connection(format!(
                    "{} has no parent directory",
                    path.display()
                )));
            }
        }

        if path.is_dir() {
            return Err(StorageError::Connection(format!(
                "{} is a directory",
                path.display()
            )));
        }

        Ok(Self { path, config })
    }

    /// Returns the absolute database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration applied to connections.
    #[must_use]
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Opens a connection for ordinary reads and writes.
    ///
    /// The file must already exist. The connection reads with the configured
    /// isolation level; callers run their work inside an explicit
    /// transaction, so nothing is autocommitted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the file cannot be opened or
    /// configured.
    pub fn acquire(&self) -> StorageResult<Connection> {
        let conn = self.open(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX)?;
        conn.pragma_update(
            None,
            "read_uncommitted",
            self.config.isolation.read_uncommitted(),
        )
        .map_err(|e| self.connection_error(&e))?;
        trace!(path = %self.path.display(), "acquired connection");
        Ok(conn)
    }

    /// Opens a connection for running migrations, creating the file if
    /// absent.
    ///
    /// Nothing is written to the file here: the journal mode is left as
    /// found and the header tag is only read. A non-zero tag that differs
    /// from the configured one is rejected; a zero tag is written later,
    /// inside the migration transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the file cannot be opened, or
    /// [`StorageError::ApplicationTagMismatch`] if it belongs to another
    /// application.
    pub fn acquire_for_migration(&self) -> StorageResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| self.connection_error(&e))?;
        self.apply_session_pragmas(&conn)
            .map_err(|e| self.connection_error(&e))?;

        let expected = self.config.application_tag;
        let found = read_application_tag(&conn)?;
        if found != 0 && found != expected {
            return Err(StorageError::ApplicationTagMismatch { found, expected });
        }
        Ok(conn)
    }

    /// Switches the file to the configured journal mode.
    ///
    /// Must run outside a transaction. Called once a migration has
    /// committed, and on every steady-state connection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the pragma fails.
    pub fn apply_journal_mode(&self, conn: &Connection) -> StorageResult<()> {
        let requested = self.config.journal_mode.pragma_value();
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", requested, |row| row.get(0))
            .map_err(|e| self.connection_error(&e))?;
        if !mode.eq_ignore_ascii_case(requested) {
            warn!(
                path = %self.path.display(),
                requested,
                actual = %mode,
                "journal mode not applied"
            );
        }
        Ok(())
    }

    fn open(&self, flags: OpenFlags) -> StorageResult<Connection> {
        let conn = Connection::open_with_flags(&self.path, flags)
            .map_err(|e| self.connection_error(&e))?;
        self.apply_session_pragmas(&conn)
            .map_err(|e| self.connection_error(&e))?;
        // Some open paths reset the journal mode, so assert it every time.
        self.apply_journal_mode(&conn)?;
        Ok(conn)
    }

    /// Pragmas that only affect this connection, never the file.
    fn apply_session_pragmas(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.busy_timeout(self.config.busy_timeout())?;
        conn.pragma_update(None, "foreign_keys", self.config.foreign_keys)?;

        let _: String = conn.pragma_update_and_check(
            None,
            "locking_mode",
            self.config.locking_mode.pragma_value(),
            |row| row.get(0),
        )?;
        Ok(())
    }

    fn connection_error(&self, err: &rusqlite::Error) -> StorageError {
        StorageError::Connection(format!("{}: {err}", self.path.display()))
    }
}

/// Reads the header application tag (`PRAGMA application_id`).
///
/// # Errors
///
/// Returns [`StorageError::Database`] if the pragma cannot be read.
pub fn read_application_tag(conn: &Connection) -> StorageResult<i32> {
    Ok(conn.pragma_query_value(None, "application_id", |row| row.get(0))?)
}
