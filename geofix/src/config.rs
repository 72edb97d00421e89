//! Configuration file handling for `<config dir>/geofix/config.ini`.
//!
//! ```ini
//! [keys]
//! latitude = lat
//! longitude = lng
//! altitude = ele
//!
//! [request]
//! timeout_ms = 30000
//! minimum_update_time_ms = 1000
//! update_distance_m = 5
//! desired_accuracy_m = 3
//! maximum_age_ms = 10000
//! dont_open_settings = false
//! ```
//!
//! Every key is optional. A missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;
use tracing::{debug, info};

use crate::fix::{set_geo_location_keys, AltitudeKey, GeoKeys, LatitudeKey, LongitudeKey};
use crate::options::RequestOptions;

const KEYS_SECTION: &str = "keys";
const REQUEST_SECTION: &str = "request";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    Read(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    Write(#[source] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    Directory(#[source] std::io::Error),
}

/// Request defaults from the `[request]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDefaults {
    pub timeout_ms: Option<u64>,
    pub minimum_update_time_ms: Option<u64>,
    pub update_distance_m: Option<f64>,
    pub desired_accuracy_m: Option<f64>,
    pub maximum_age_ms: Option<u64>,
    pub dont_open_settings: bool,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub keys: GeoKeys,
    pub request: RequestDefaults,
}

/// Default configuration file path.
///
/// Falls back to the working directory when the platform has no config dir.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geofix")
        .join("config.ini")
}

impl ConfigFile {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read(ini::Error::Parse(e)))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(keys) = ini.section(Some(KEYS_SECTION)) {
            if let Some(k) = parse_key::<LatitudeKey>(keys, "latitude")? {
                config.keys.latitude = k;
            }
            if let Some(k) = parse_key::<LongitudeKey>(keys, "longitude")? {
                config.keys.longitude = k;
            }
            if let Some(k) = parse_key::<AltitudeKey>(keys, "altitude")? {
                config.keys.altitude = k;
            }
        }

        if let Some(request) = ini.section(Some(REQUEST_SECTION)) {
            let r = &mut config.request;
            r.timeout_ms = parse_value(request, "timeout_ms")?;
            r.minimum_update_time_ms = parse_value(request, "minimum_update_time_ms")?;
            r.update_distance_m = parse_value(request, "update_distance_m")?;
            r.desired_accuracy_m = parse_value(request, "desired_accuracy_m")?;
            r.maximum_age_ms = parse_value(request, "maximum_age_ms")?;
            r.dont_open_settings = parse_value(request, "dont_open_settings")?.unwrap_or(false);
        }

        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Directory)?;
        }
        self.to_ini().write_to_file(path).map_err(ConfigError::Write)
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.to_ini().write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some(KEYS_SECTION))
            .set("latitude", self.keys.latitude.as_str())
            .set("longitude", self.keys.longitude.as_str())
            .set("altitude", self.keys.altitude.as_str());

        let r = &self.request;
        let mut section = ini.with_section(Some(REQUEST_SECTION));
        if let Some(v) = r.timeout_ms {
            section.set("timeout_ms", v.to_string());
        }
        if let Some(v) = r.minimum_update_time_ms {
            section.set("minimum_update_time_ms", v.to_string());
        }
        if let Some(v) = r.update_distance_m {
            section.set("update_distance_m", v.to_string());
        }
        if let Some(v) = r.desired_accuracy_m {
            section.set("desired_accuracy_m", v.to_string());
        }
        if let Some(v) = r.maximum_age_ms {
            section.set("maximum_age_ms", v.to_string());
        }
        section.set("dont_open_settings", r.dont_open_settings.to_string());
        ini
    }

    /// Request options seeded from the `[request]` section.
    pub fn default_options(&self) -> RequestOptions {
        let r = &self.request;
        let mut options = RequestOptions::new().dont_open_settings(r.dont_open_settings);
        options.timeout = r.timeout_ms.map(Duration::from_millis);
        options.minimum_update_time = r.minimum_update_time_ms.map(Duration::from_millis);
        options.update_distance = r.update_distance_m;
        options.desired_accuracy = r.desired_accuracy_m;
        options.maximum_age = r.maximum_age_ms.map(Duration::from_millis);
        options
    }

    /// Install the `[keys]` mapping process-wide.
    ///
    /// Returns `false` if a mapping was already installed.
    pub fn apply_keys(&self) -> bool {
        match set_geo_location_keys(self.keys) {
            Ok(()) => {
                info!(keys = ?self.keys, "Installed coordinate key names");
                true
            }
            Err(_) => false,
        }
    }
}

fn parse_key<T>(section: &Properties, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(section, key)
}

fn parse_value<T>(section: &Properties, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = section.get(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
        section: section_name_for(key).to_string(),
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn section_name_for(key: &str) -> &'static str {
    match key {
        "latitude" | "longitude" | "altitude" => KEYS_SECTION,
        _ => REQUEST_SECTION,
    }
}
