//! Schema migration.
//!
//! [`Migrator::upgrade`] brings a database from whatever revision it is at
//! to the newest revision of a [`RevisionSet`]. The whole upgrade, from the
//! first statement to the last version-record write, is a single
//! transaction. If anything fails the transaction is dropped uncommitted
//! and the file stays at the revision it had before.

use crate::error::{StorageError, StorageResult};
use crate::storage::connection::read_application_tag;
use crate::storage::revisions::RevisionSet;
use crate::storage::version::VersionStore;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info, trace};

/// Progress reported while upgrading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationEvent<'a> {
    /// A revision is about to be applied.
    Upgrading {
        /// Revision the database is at (`None` before the bootstrap revision).
        from: Option<u32>,
        /// Revision being applied.
        to: u32,
    },
    /// A statement is about to be executed.
    ExecutingSql {
        /// Revision the statement belongs to.
        revision: u32,
        /// Statement text.
        statement: &'a str,
    },
}

/// Receives [`MigrationEvent`]s.
///
/// Closures taking `&MigrationEvent` implement this trait.
pub trait MigrationObserver: Send + Sync {
    /// Called for each event, in order.
    fn on_event(&self, event: &MigrationEvent<'_>);
}

impl<F> MigrationObserver for F
where
    F: Fn(&MigrationEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &MigrationEvent<'_>) {
        self(event);
    }
}

/// Logs migration events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl MigrationObserver for TracingObserver {
    fn on_event(&self, event: &MigrationEvent<'_>) {
        match event {
            MigrationEvent::ExecutingSql {
                revision,
                statement,
            } => trace!(revision, statement, "executing SQL"),
            MigrationEvent::Upgrading { from, to } => {
                info!(from = ?from, to, "upgrading schema");
            }
        }
    }
}

/// Outcome of an upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MigrationReport {
    /// Revision before the upgrade (`None` for a database with no schema).
    pub from: Option<u32>,
    /// Revision after the upgrade.
    pub to: Option<u32>,
    /// Revisions applied, in order.
    pub applied: Vec<u32>,
}

impl MigrationReport {
    /// True if no revision was applied.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies pending revisions to a connection.
pub struct Migrator<'a> {
    versions: &'a VersionStore,
    observer: &'a dyn MigrationObserver,
    header_tag: Option<i32>,
}

impl<'a> Migrator<'a> {
    /// Creates a migrator reporting to `observer`.
    #[must_use]
    pub const fn new(versions: &'a VersionStore, observer: &'a dyn MigrationObserver) -> Self {
        Self {
            versions,
            observer,
            header_tag: None,
        }
    }

    /// Also stamps `tag` into the file header, as part of the upgrade
    /// transaction, once the version record has been accepted.
    #[must_use]
    pub const fn header_tag(mut self, tag: i32) -> Self {
        self.header_tag = Some(tag);
        self
    }

    /// Applies every revision newer than the stored one, in ascending order,
    /// then commits once.
    ///
    /// Running it again with the same revision set is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Migration`] if a statement fails,
    /// [`StorageError::UnsupportedRevision`] if the database is newer than
    /// the set, [`StorageError::ApplicationTagMismatch`] if the header
    /// carries a foreign tag, or any error from the [`VersionStore`].
    /// Nothing is committed in those cases, the header tag included.
    pub fn upgrade(
        &self,
        conn: &mut Connection,
        revisions: &RevisionSet,
    ) -> StorageResult<MigrationReport> {
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let from = self.versions.get(&mut tx)?;
        let latest = revisions.latest();
        if let Some(found) = from
            && found > latest
        {
            return Err(StorageError::UnsupportedRevision { found, latest });
        }
        if let Some(tag) = self.header_tag {
            write_header_tag(&tx, tag)?;
        }

        let mut current = from;
        let mut applied = Vec::new();
        for revision in revisions.after(from) {
            self.observer.on_event(&MigrationEvent::Upgrading {
                from: current,
                to: revision.number,
            });

            for statement in &revision.statements {
                self.observer.on_event(&MigrationEvent::ExecutingSql {
                    revision: revision.number,
                    statement: statement.as_str(),
                });
                tx.execute_batch(statement)
                    .map_err(|e| StorageError::Migration {
                        revision: revision.number,
                        reason: e.to_string(),
                    })?;
            }

            self.versions.set(&tx, revision.number)?;
            current = Some(revision.number);
            applied.push(revision.number);
        }

        tx.commit()?;

        Ok(MigrationReport {
            from,
            to: current,
            applied,
        })
    }
}

/// Writes `tag` to a zero header inside `tx`; a foreign tag is an error.
fn write_header_tag(tx: &Transaction<'_>, tag: i32) -> StorageResult<()> {
    let found = read_application_tag(tx)?;
    if found == tag {
        return Ok(());
    }
    if found != 0 {
        return Err(StorageError::ApplicationTagMismatch {
            found,
            expected: tag,
        });
    }
    tx.pragma_update(None, "application_id", tag)?;
    debug!(tag, "wrote application tag");
    Ok(())
}
