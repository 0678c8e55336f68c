//! Command-line interface definitions using clap

use clap::{Parser, Subcommand};

/// visitor-counter - visitor counter and visitor log service
#[derive(Parser, Debug)]
#[command(name = "visitor-counter")]
#[command(version)]
#[command(about = "A visitor counter service with pluggable storage", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,

        /// Override server.port
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },

    /// Print the current count
    Count,

    /// Increment the counter once and print the new value
    Increment,

    /// Create the counter record (and tables) if missing
    Init,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: config.example.toml)
        output_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// No subcommand means `serve` with configured host/port
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve {
            host: None,
            port: None,
        })
    }
}
