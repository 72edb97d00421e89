//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;

use geofix::config::ConfigError;
use geofix::LocationError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be read or written
    Config(ConfigError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Location request failed
    Location(LocationError),
    /// Invalid argument combination
    Usage(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Location(LocationError::Timeout { .. }) => {
                eprintln!();
                eprintln!("No fix arrived in time. Try a longer --timeout-ms or a");
                eprintln!("shorter --interval-ms for the simulated device.");
            }
            CliError::Location(LocationError::NoLastKnownLocation) => {
                eprintln!();
                eprintln!("A zero timeout only reads the cached fix. Use --seed-age-ms");
                eprintln!("to give the simulated device one.");
            }
            _ => {}
        }

        process::exit(match self {
            CliError::Usage(_) => 2,
            _ => 1,
        })
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Location(e) => write!(f, "Location request failed: {}", e),
            CliError::Usage(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Location(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LocationError> for CliError {
    fn from(e: LocationError) -> Self {
        CliError::Location(e)
    }
}
