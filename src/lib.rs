//! # readpos
//!
//! Versioned `SQLite` store for last-read audiobook positions.
//!
//! readpos records one position per book (a reading-order item and an
//! offset into it) in a single database file, and evolves that file's
//! schema across releases with ordered, transactional revisions.
//!
//! ## Features
//!
//! - **Transactional migrations**: every pending revision is applied in one
//!   transaction when the database is opened; a failed upgrade leaves the
//!   file at its previous revision
//! - **Identity checks**: both the version record and the file header carry
//!   an application identifier, so foreign files are rejected
//! - **Per-call transactions**: no connection is held between reads and
//!   writes; concurrency is left to `SQLite`'s WAL locking
//! - **Best-effort access**: `get`/`save` never fail, with strict `try_*`
//!   variants for callers that need to know
//!
//! ```no_run
//! use readpos::{Database, EntityKey, Position};
//!
//! let db = Database::open("positions.db")?;
//! let book = EntityKey::new("book-42")?;
//! db.positions().save(&book, &Position::parse("chapter-3", 120_000)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod core;
pub mod error;
pub mod storage;

// Re-export commonly used types at crate root
pub use error::{Error, Result, StorageError, ValueError};

// Re-export core domain types
pub use core::{EntityKey, OffsetMillis, Position, PositionRecord, ReadingOrderItemId};

// Re-export storage types
pub use storage::{
    APPLICATION_ID, APPLICATION_TAG, DEFAULT_DB_PATH, Database, DatabaseConfig, MigrationEvent,
    MigrationObserver, MigrationReport, OpenOptions, PositionDatabase, PositionStore, Revision,
    RevisionSet,
};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
