//! Field-name aliasing for serialized fixes.
//!
//! External schemas disagree on what to call the coordinate fields
//! (`lat`/`latitude`, `lon`/`lng`/`longitude`, `alt`/`ele`/`altitude`).
//! The mapping is chosen once per process, before the first fix is
//! serialized, and is read-only afterwards.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

static GEO_KEYS: OnceLock<GeoKeys> = OnceLock::new();

/// Accepted names for the latitude field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatitudeKey {
    #[default]
    Latitude,
    Lat,
}

/// Accepted names for the longitude field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongitudeKey {
    #[default]
    Longitude,
    Lon,
    Lng,
}

/// Accepted names for the altitude field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AltitudeKey {
    #[default]
    Altitude,
    Alt,
    Ele,
}

impl LatitudeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latitude => "latitude",
            Self::Lat => "lat",
        }
    }
}

impl LongitudeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Longitude => "longitude",
            Self::Lon => "lon",
            Self::Lng => "lng",
        }
    }
}

impl AltitudeKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Altitude => "altitude",
            Self::Alt => "alt",
            Self::Ele => "ele",
        }
    }
}

/// Error returned when a key name is not one of the accepted aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown coordinate key '{}'", self.0)
    }
}

impl std::error::Error for UnknownKey {}

impl FromStr for LatitudeKey {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latitude" => Ok(Self::Latitude),
            "lat" => Ok(Self::Lat),
            other => Err(UnknownKey(other.to_string())),
        }
    }
}

impl FromStr for LongitudeKey {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "longitude" => Ok(Self::Longitude),
            "lon" => Ok(Self::Lon),
            "lng" => Ok(Self::Lng),
            other => Err(UnknownKey(other.to_string())),
        }
    }
}

impl FromStr for AltitudeKey {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "altitude" => Ok(Self::Altitude),
            "alt" => Ok(Self::Alt),
            "ele" => Ok(Self::Ele),
            other => Err(UnknownKey(other.to_string())),
        }
    }
}

/// The coordinate field names used when serializing a [`super::Fix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeoKeys {
    pub latitude: LatitudeKey,
    pub longitude: LongitudeKey,
    pub altitude: AltitudeKey,
}

impl GeoKeys {
    /// Build a mapping; altitude keeps its default name when `None`.
    pub fn new(latitude: LatitudeKey, longitude: LongitudeKey, altitude: Option<AltitudeKey>) -> Self {
        Self {
            latitude,
            longitude,
            altitude: altitude.unwrap_or_default(),
        }
    }
}

/// Install the process-wide key mapping.
///
/// Only the first call takes effect. Later calls return the rejected mapping
/// unchanged so the caller can tell the mapping was already fixed.
pub fn set_geo_location_keys(keys: GeoKeys) -> Result<(), GeoKeys> {
    GEO_KEYS.set(keys)
}

/// The process-wide key mapping, or the default names if none was installed.
pub fn geo_keys() -> GeoKeys {
    GEO_KEYS.get().copied().unwrap_or_default()
}
