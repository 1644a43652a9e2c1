//! Schema version record.
//!
//! The `schema_version` table holds exactly one row once the bootstrap
//! revision has been applied: the application ID and the current revision
//! number. Before that the table does not exist, which reads as "no schema
//! yet" rather than as an error.
//!
//! The store never commits. Its reads and writes run inside the caller's
//! transaction.

use crate::error::{StorageError, StorageResult};
use rusqlite::{ErrorCode, OptionalExtension, Transaction, params};
use tracing::debug;

/// SQL to read the version record.
const GET_VERSION_SQL: &str =
    "SELECT version_application_id, version_number FROM schema_version LIMIT 1";

/// SQL to advance the revision of an existing record.
const UPDATE_VERSION_SQL: &str = "UPDATE schema_version SET version_number = ?1";

/// SQL to create the record.
const INSERT_VERSION_SQL: &str =
    "INSERT INTO schema_version (version_application_id, version_number) VALUES (?1, ?2)";

/// Reads and writes the version record for one application ID.
#[derive(Debug, Clone)]
pub struct VersionStore {
    application_id: String,
}

impl VersionStore {
    /// Creates a store expecting `application_id` in the version record.
    #[must_use]
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
        }
    }

    /// Reads the current revision.
    ///
    /// Returns `Ok(None)` if the version table does not exist yet. The read
    /// runs under a savepoint that is rolled back on that path, so the
    /// caller's transaction is left clean.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::IdentityMismatch`] if the record names another
    /// application, [`StorageError::VersionRecordMissing`] if the table is
    /// empty, or [`StorageError::Database`] for any other engine error.
    pub fn get(&self, tx: &mut Transaction<'_>) -> StorageResult<Option<u32>> {
        let mut savepoint = tx.savepoint()?;
        let row = savepoint
            .query_row(GET_VERSION_SQL, [], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .optional();

        let (found_id, number) = match row {
            Ok(Some(row)) => row,
            Ok(None) => return Err(StorageError::VersionRecordMissing),
            Err(err) if is_missing_table(&err) => {
                debug!("schema_version table absent, no schema yet");
                savepoint.rollback()?;
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        savepoint.commit()?;

        if found_id != self.application_id {
            return Err(StorageError::IdentityMismatch {
                found: found_id,
                expected: self.application_id.clone(),
            });
        }

        u32::try_from(number)
            .map(Some)
            .map_err(|_| StorageError::Database(format!("invalid schema revision {number}")))
    }

    /// Records `revision` as current.
    ///
    /// Updates the existing row in place; inserts it if none exists yet
    /// (the bootstrap write).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if either statement fails.
    pub fn set(&self, tx: &Transaction<'_>, revision: u32) -> StorageResult<()> {
        let updated = tx.execute(UPDATE_VERSION_SQL, params![i64::from(revision)])?;
        if updated == 0 {
            tx.execute(
                INSERT_VERSION_SQL,
                params![self.application_id, i64::from(revision)],
            )?;
        }
        Ok(())
    }
}

/// True for the engine's "no such table" condition.
fn is_missing_table(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(message)) => {
            e.code == ErrorCode::Unknown && message.starts_with("no such table")
        }
        _ => false,
    }
}
