//! Storage layer for readpos.
//!
//! Persists last-read positions in `SQLite`. Opening a database runs the
//! schema migrations to completion in one transaction; afterwards every
//! read and write runs on its own short-lived connection and transaction.

pub mod config;
pub mod connection;
pub mod database;
pub mod migrate;
pub mod positions;
pub mod revisions;
pub mod traits;
pub mod version;

pub use config::{DatabaseConfig, Isolation, JournalMode, LockingMode};
pub use connection::ConnectionManager;
pub use database::{Database, DatabaseStatus, OpenOptions};
pub use migrate::{MigrationEvent, MigrationObserver, MigrationReport, Migrator, TracingObserver};
pub use positions::PositionStore;
pub use revisions::{Revision, RevisionSet};
pub use traits::PositionDatabase;
pub use version::VersionStore;

/// Application ID stored in the `schema_version` row.
pub const APPLICATION_ID: &str = "org.thepalaceproject.audiobook";

/// Application tag stored in the file header (`PPAB`).
pub const APPLICATION_TAG: i32 = 0x5050_4142;

/// Default database path relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".readpos/positions.db";
