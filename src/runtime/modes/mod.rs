//! Mode routing
//!
//! - Server mode (HTTP server, default)
//! - CLI mode (one-shot counter and config commands)

pub mod cli;
pub mod server;

pub use cli::run_cli;
pub use server::run_server;

use crate::cli::Commands;

/// Mode detection result
#[derive(Debug, PartialEq, Eq)]
pub enum Mode {
    Server,
    Cli,
}

/// `serve` (or no subcommand) runs the server, everything else is a CLI command
pub fn detect_mode(command: &Commands) -> Mode {
    match command {
        Commands::Serve { .. } => Mode::Server,
        _ => Mode::Cli,
    }
}
