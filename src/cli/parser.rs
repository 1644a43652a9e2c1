//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// readpos: inspect and edit a last-read position database.
///
/// Opening the database creates it if needed and upgrades its schema to
/// the newest revision.
#[derive(Parser, Debug)]
#[command(name = "readpos")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the database file.
    ///
    /// Defaults to `.readpos/positions.db` in the current directory.
    #[arg(short, long, env = "READPOS_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// JSON revision set to migrate with instead of the bundled one.
    #[arg(long, env = "READPOS_REVISIONS")]
    pub revisions: Option<PathBuf>,

    /// JSON connection configuration file.
    #[arg(long, env = "READPOS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and bring its schema up to date.
    ///
    /// Creates the parent directory if it doesn't exist.
    Init,

    /// Show schema revision and position count.
    Status,

    /// Show the last-read position of a book.
    Get {
        /// Book identifier.
        key: String,
    },

    /// Save the last-read position of a book.
    Save {
        /// Book identifier.
        key: String,

        /// Reading-order item identifier.
        item: String,

        /// Offset into the item, in milliseconds.
        offset: u64,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }
}
