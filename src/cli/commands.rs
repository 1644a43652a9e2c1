//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use crate::cli::output::{OutputFormat, format_init, format_position, format_status};
use crate::cli::parser::{Cli, Commands};
use crate::core::{EntityKey, Position};
use crate::error::{CommandError, Error, Result};
use crate::storage::{Database, DatabaseConfig, OpenOptions, RevisionSet};
use std::path::Path;

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Init => cmd_init(cli, &db_path, format),
        Commands::Status => cmd_status(cli, &db_path, format),
        Commands::Get { key } => cmd_get(cli, &db_path, key, format),
        Commands::Save { key, item, offset } => {
            cmd_save(cli, &db_path, key, item, *offset, format)
        }
    }
}

fn cmd_init(cli: &Cli, db_path: &Path, format: OutputFormat) -> Result<String> {
    // Create parent directory if needed
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to create directory: {e}"))
        })?;
    }

    let db = open_database(cli, db_path)?;
    let output = format_init(db.path(), db.migration_report(), format);
    db.close();
    Ok(output)
}

fn cmd_status(cli: &Cli, db_path: &Path, format: OutputFormat) -> Result<String> {
    let db = open_database(cli, db_path)?;
    let status = db.status()?;
    db.close();
    Ok(format_status(&status, format))
}

fn cmd_get(cli: &Cli, db_path: &Path, key: &str, format: OutputFormat) -> Result<String> {
    let key = EntityKey::new(key)?;
    let db = open_database(cli, db_path)?;
    let record = db.positions().try_get(&key)?;
    db.close();
    Ok(format_position(&key, record.as_ref(), format))
}

fn cmd_save(
    cli: &Cli,
    db_path: &Path,
    key: &str,
    item: &str,
    offset: u64,
    format: OutputFormat,
) -> Result<String> {
    let key = EntityKey::new(key)?;
    let position = Position::parse(item, offset)?;
    let db = open_database(cli, db_path)?;
    let record = db.positions().try_save(&key, &position)?;
    db.close();
    Ok(format_position(&key, Some(&record), format))
}

/// Opens the database, applying `--config` and `--revisions` if given.
///
/// Commands other than `init` never create the parent directory, so a
/// mistyped path fails instead of leaving an empty tree behind.
fn open_database(cli: &Cli, db_path: &Path) -> Result<Database> {
    let mut options = OpenOptions::new();

    if let Some(config_path) = &cli.config {
        options = options.config(DatabaseConfig::from_path(config_path)?);
    }

    if let Some(revisions_path) = &cli.revisions {
        let revisions = RevisionSet::from_path(revisions_path).map_err(|source| Error::Open {
            path: db_path.display().to_string(),
            source,
        })?;
        options = options.revisions(revisions);
    }

    Database::open_with(db_path, options)
}
