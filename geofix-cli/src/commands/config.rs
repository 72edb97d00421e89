//! Configuration CLI commands.
//!
//! Provides `config path` and `config show`.

use std::path::Path;

use clap::Subcommand;
use geofix::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = ConfigFile::load_from(path)?;
            if !path.exists() {
                println!("; {} not found, showing defaults", path.display());
            }
            print!("{}", config.to_ini_string());
            Ok(())
        }
    }
}
