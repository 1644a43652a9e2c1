//! CLI layer for readpos.
//!
//! Provides the command-line interface using clap, with commands for
//! initializing a position database, inspecting it, and reading or saving
//! individual positions.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
