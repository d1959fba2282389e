//! CLI module for actionapi
//!
//! Provides command-line interface for:
//! - serve: connect to MySQL and serve the declared routes over HTTP
//! - check: validate a configuration file and list its routes

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check, route_listing, run, run_command, serve};
pub use config::{AppConfig, DatabaseConfig};
pub use errors::{CliError, CliErrorCode, CliResult};
