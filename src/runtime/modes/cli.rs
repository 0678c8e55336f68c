//! CLI mode
//!
//! One-shot commands against the configured storage backend.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;

use crate::cli::{Commands, ConfigCommands};
use crate::config::AppConfig;
use crate::errors::CounterError;
use crate::runtime::lifetime;

const DEFAULT_SAMPLE_PATH: &str = "config.example.toml";

fn report(err: CounterError) -> anyhow::Error {
    eprintln!("{}", err.format_colored());
    anyhow::Error::new(err)
}

/// Run a non-server command
pub async fn run_cli(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        } => generate_config(output_path.as_deref().unwrap_or(DEFAULT_SAMPLE_PATH), force),
        Commands::Count => {
            let service = lifetime::startup::prepare_cli_startup(config).await?;
            let count = service.get_count().await.map_err(report)?;
            println!("{}", count);
            Ok(())
        }
        Commands::Increment => {
            let service = lifetime::startup::prepare_cli_startup(config).await?;
            let count = service.increment().await.map_err(report)?;
            println!("{}", count);
            Ok(())
        }
        Commands::Init => {
            let service = lifetime::startup::prepare_cli_startup(config).await?;
            service.initialize().await.map_err(report)?;
            let count = service.get_count().await.map_err(report)?;
            println!(
                "{} {} counter ready, count = {}",
                "✓".green().bold(),
                service.backend_name(),
                count
            );
            Ok(())
        }
        Commands::Serve { .. } => bail!("serve is handled by server mode"),
    }
}

fn generate_config(path: &str, force: bool) -> Result<()> {
    if Path::new(path).exists() && !force {
        bail!("{} already exists, use --force to overwrite", path);
    }

    AppConfig::default()
        .save_to_file(path)
        .with_context(|| format!("Failed to write {}", path))?;

    println!("{} Sample configuration written to {}", "✓".green().bold(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_config_refuses_to_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        generate_config(path, false).unwrap();
        assert!(generate_config(path, false).is_err());
        generate_config(path, true).unwrap();

        let written: AppConfig = toml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.server.port, 5000);
    }
}
