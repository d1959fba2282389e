//! CLI argument definitions using clap
//!
//! Commands:
//! - actionapi serve --config <path> [--port <port>]
//! - actionapi check --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// actionapi - declarative JSON API server over SQL templates
#[derive(Parser, Debug)]
#[command(name = "actionapi")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log filter directives, e.g. "actionapi=debug"; RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to the database and serve the declared routes
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./actionapi.json")]
        config: PathBuf,

        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate the configuration and list the routes it declares
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./actionapi.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["actionapi", "serve"]).unwrap();
        assert!(cli.log.is_none());
        match cli.command {
            Command::Serve { config, port } => {
                assert_eq!(config, PathBuf::from("./actionapi.json"));
                assert_eq!(port, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_log_flag() {
        let cli = Cli::try_parse_from([
            "actionapi",
            "check",
            "--config",
            "/etc/api.json",
            "--log",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Check { .. }));
    }
}
