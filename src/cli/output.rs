//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::core::{EntityKey, PositionRecord};
use crate::error::Error;
use crate::storage::{DatabaseStatus, MigrationReport};
use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats the result of `init`.
#[must_use]
pub fn format_init(path: &Path, report: &MigrationReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = format!("Initialized database at: {}\n", path.display());
            if report.is_noop() {
                let _ = writeln!(output, "  Schema already current at {}", revision(report.to));
            } else {
                let _ = writeln!(
                    output,
                    "  Upgraded schema {} -> {} (applied {})",
                    revision(report.from),
                    revision(report.to),
                    join(&report.applied)
                );
            }
            output
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct InitResult<'a> {
                path: &'a Path,
                #[serde(flatten)]
                report: &'a MigrationReport,
            }
            format_json(&InitResult { path, report })
        }
    }
}

/// Formats a status response.
#[must_use]
pub fn format_status(status: &DatabaseStatus, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(status),
        OutputFormat::Json => format_json(status),
    }
}

fn format_status_text(status: &DatabaseStatus) -> String {
    let mut output = String::new();
    output.push_str("readpos Status\n");
    output.push_str("==============\n\n");
    let _ = writeln!(output, "  Path:          {}", status.path.display());
    let _ = writeln!(output, "  Schema:        {}", revision(status.revision));
    let _ = writeln!(output, "  Latest:        v{}", status.latest_revision);
    let _ = writeln!(output, "  Positions:     {}", status.position_count);
    if let Some(size) = status.db_size {
        let _ = writeln!(output, "  DB size:       {size} bytes");
    }
    output
}

/// Formats a position lookup.
#[must_use]
pub fn format_position(
    key: &EntityKey,
    record: Option<&PositionRecord>,
    format: OutputFormat,
) -> String {
    match (format, record) {
        (OutputFormat::Text, Some(record)) => format!(
            "{}: {} (updated {})\n",
            record.entity_key,
            record.position,
            record.updated_at.to_rfc3339()
        ),
        (OutputFormat::Text, None) => format!("{key}: no position\n"),
        (OutputFormat::Json, record) => format_json(&record),
    }
}

/// Formats an error for output.
#[must_use]
pub fn format_error(err: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => err.to_string(),
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }
            format_json(&ErrorOutput {
                error: err.to_string(),
            })
        }
    }
}

fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn revision(value: Option<u32>) -> String {
    value.map_or_else(|| "none".to_string(), |r| format!("v{r}"))
}

fn join(values: &[u32]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
