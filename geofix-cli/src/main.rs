//! Geofix CLI - Command-line interface
//!
//! Drives the geofix location service against a simulated device:
//!
//! ```text
//! geofix current --timeout-ms 5000
//! geofix current --timeout-ms 0 --seed-age-ms 20000 --maximum-age-ms 10000
//! geofix watch --count 10 --interval-ms 250 --model delegate
//! geofix config show
//! ```

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use geofix::config::{config_file_path, ConfigFile};
use tracing_subscriber::EnvFilter;

use commands::config::ConfigCommands;
use commands::current::CurrentArgs;
use commands::watch::WatchArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "geofix")]
#[command(about = "Acquire locations from a simulated device", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: <config dir>/geofix/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Acquire a single fix
    Current(CurrentArgs),

    /// Print fixes as they arrive
    Watch(WatchArgs),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn init_logging(verbose: bool) -> Result<(), CliError> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}

fn run(cli: Cli) -> Result<(), CliError> {
    init_logging(cli.verbose)?;
    let path = cli.config.unwrap_or_else(config_file_path);

    match cli.command {
        Commands::Config { command } => commands::config::run(command, &path),
        command => {
            let config = ConfigFile::load_from(&path)?;
            config.apply_keys();

            let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
            runtime.block_on(async {
                match command {
                    Commands::Current(args) => commands::current::run(args, &config).await,
                    Commands::Watch(args) => commands::watch::run(args, &config).await,
                    Commands::Config { .. } => Ok(()),
                }
            })
        }
    }
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        e.exit();
    }
}
