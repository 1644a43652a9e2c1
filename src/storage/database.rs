//! Database handle.
//!
//! [`Database::open`] is the only way to obtain a handle. It brings the file
//! to the newest schema revision before returning, so every handle in use
//! points at a fully migrated database.

use crate::core::{EntityKey, Position, PositionRecord};
use crate::error::{Error, Result, StorageResult};
use crate::storage::config::DatabaseConfig;
use crate::storage::connection::ConnectionManager;
use crate::storage::migrate::{MigrationObserver, MigrationReport, Migrator, TracingObserver};
use crate::storage::positions::PositionStore;
use crate::storage::revisions::RevisionSet;
use crate::storage::traits::PositionDatabase;
use crate::storage::version::VersionStore;
use crate::storage::APPLICATION_ID;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Options for [`Database::open_with`].
#[derive(Clone, Default)]
pub struct OpenOptions {
    config: DatabaseConfig,
    revisions: Option<RevisionSet>,
    observer: Option<Arc<dyn MigrationObserver>>,
}

impl OpenOptions {
    /// Default options: bundled revisions, default config, tracing observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connection configuration.
    #[must_use]
    pub fn config(mut self, config: DatabaseConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `revisions` instead of the bundled revision set.
    #[must_use]
    pub fn revisions(mut self, revisions: RevisionSet) -> Self {
        self.revisions = Some(revisions);
        self
    }

    /// Reports migration events to `observer` instead of `tracing`.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn MigrationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("config", &self.config)
            .field("revisions", &self.revisions)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Database status summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStatus {
    /// Absolute path of the database file.
    pub path: PathBuf,
    /// Revision stored in the file.
    pub revision: Option<u32>,
    /// Newest revision known to this handle.
    pub latest_revision: u32,
    /// Number of stored positions.
    pub position_count: usize,
    /// Size of the main database file in bytes.
    pub db_size: Option<u64>,
}

/// An open, fully migrated position database.
///
/// # Examples
///
/// ```no_run
/// use readpos::core::{EntityKey, Position};
/// use readpos::storage::Database;
///
/// let db = Database::open("positions.db").unwrap();
/// let key = EntityKey::new("book-42").unwrap();
/// db.positions().save(&key, &Position::parse("chapter-3", 120_000).unwrap());
/// assert!(db.positions().get(&key).is_some());
/// db.close();
/// ```
#[derive(Debug)]
pub struct Database {
    positions: PositionStore,
    versions: VersionStore,
    report: MigrationReport,
    latest_revision: u32,
    closed: AtomicBool,
}

impl Database {
    /// Opens (creating if absent) and migrates the database at `path` with
    /// the bundled revisions and default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Open`] if the file cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, OpenOptions::new())
    }

    /// Opens and migrates the database at `path` with explicit options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Open`] if the revision set cannot be loaded, the file
    /// cannot be opened, or migration fails. The file is left at the revision
    /// it had before the call.
    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        Self::create_or_upgrade(path, options).map_err(|source| Error::Open {
            path: path.display().to_string(),
            source,
        })
    }

    fn create_or_upgrade(path: &Path, options: OpenOptions) -> StorageResult<Self> {
        let OpenOptions {
            config,
            revisions,
            observer,
        } = options;

        let revisions = match revisions {
            Some(revisions) => revisions,
            None => RevisionSet::builtin()?,
        };
        let connections = ConnectionManager::configure(path, config)?;
        let versions = VersionStore::new(APPLICATION_ID);
        let created = !connections.path().exists();

        info!(path = %connections.path().display(), "opening position database");

        let observer: &dyn MigrationObserver = match &observer {
            Some(observer) => observer.as_ref(),
            None => &TracingObserver,
        };
        let report = match Self::migrate(&connections, &versions, observer, &revisions) {
            Ok(report) => report,
            Err(err) => {
                if created {
                    remove_empty_file(connections.path());
                }
                return Err(err);
            }
        };

        if report.is_noop() {
            info!(revision = ?report.to, "schema is current");
        } else {
            info!(from = ?report.from, to = ?report.to, "schema upgraded");
        }

        Ok(Self {
            positions: PositionStore::new(connections),
            versions,
            report,
            latest_revision: revisions.latest(),
            closed: AtomicBool::new(false),
        })
    }

    /// Runs the upgrade, then switches the journal mode once it committed.
    fn migrate(
        connections: &ConnectionManager,
        versions: &VersionStore,
        observer: &dyn MigrationObserver,
        revisions: &RevisionSet,
    ) -> StorageResult<MigrationReport> {
        let mut conn = connections.acquire_for_migration()?;
        let report = Migrator::new(versions, observer)
            .header_tag(connections.config().application_tag)
            .upgrade(&mut conn, revisions)?;
        connections.apply_journal_mode(&conn)?;
        Ok(report)
    }

    /// Returns the position store bound to this database.
    #[must_use]
    pub const fn positions(&self) -> &PositionStore {
        &self.positions
    }

    /// Returns the absolute database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.positions.connections().path()
    }

    /// Returns what the open-time migration did.
    #[must_use]
    pub const fn migration_report(&self) -> &MigrationReport {
        &self.report
    }

    /// Returns the newest revision of the set this handle was opened with.
    #[must_use]
    pub const fn latest_revision(&self) -> u32 {
        self.latest_revision
    }

    /// Reads the revision currently stored in the file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`](crate::error::StorageError) if the read fails.
    pub fn schema_revision(&self) -> StorageResult<Option<u32>> {
        let mut conn = self.positions.connections().acquire()?;
        let mut tx = conn.transaction()?;
        let revision = self.versions.get(&mut tx)?;
        tx.commit()?;
        Ok(revision)
    }

    /// Summarizes the database.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`](crate::error::StorageError) if a read fails.
    pub fn status(&self) -> StorageResult<DatabaseStatus> {
        Ok(DatabaseStatus {
            path: self.path().to_path_buf(),
            revision: self.schema_revision()?,
            latest_revision: self.latest_revision,
            position_count: self.positions.count()?,
            db_size: std::fs::metadata(self.path()).ok().map(|m| m.len()),
        })
    }

    /// Marks the handle closed.
    ///
    /// Idempotent. No connection is held between calls, so there is nothing
    /// to release.
    pub fn close(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!(path = %self.path().display(), "closed position database");
        }
    }

    /// True once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Removes a file this open created, as long as nothing was committed to it.
fn remove_empty_file(path: &Path) {
    let empty = std::fs::metadata(path).is_ok_and(|m| m.len() == 0);
    if empty && let Err(err) = std::fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "failed to remove empty database file");
    }
}

impl PositionDatabase for Database {
    fn last_read_position_get(&self, key: &EntityKey) -> Option<PositionRecord> {
        self.positions.get(key)
    }

    fn last_read_position_save(&self, key: &EntityKey, position: &Position) {
        self.positions.save(key, position);
    }

    fn close(&self) {
        Self::close(self);
    }
}
