//! Canonical and native fix types.
//!
//! A [`NativeFix`] is what a platform backend hands over: raw fields plus
//! presence information, and both a wall-clock and a boot-relative capture
//! time. A [`Fix`] is the canonical record callers receive after
//! normalization.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use super::keys::{geo_keys, GeoKeys};

/// A fix as reported by a native location backend.
///
/// Optional fields are `None` when the native object reports the field as
/// absent, which is distinct from a reported value of zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NativeFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters, if reported.
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters, if reported.
    pub horizontal_accuracy: Option<f64>,
    /// Vertical accuracy in meters, if reported.
    pub vertical_accuracy: Option<f64>,
    /// Ground speed in m/s, if reported.
    pub speed: Option<f64>,
    /// Course over ground in degrees, if reported.
    pub bearing: Option<f64>,
    /// Wall-clock capture time in epoch milliseconds.
    pub wall_time_ms: Option<i64>,
    /// Capture time on the boot clock in nanoseconds.
    pub elapsed_realtime_nanos: Option<i64>,
    /// Name of the provider that produced the fix (`gps`, `network`, ...).
    pub provider: Option<String>,
}

impl NativeFix {
    /// Create a native fix with only coordinates set.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Default::default()
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_accuracy(mut self, horizontal: f64, vertical: Option<f64>) -> Self {
        self.horizontal_accuracy = Some(horizontal);
        self.vertical_accuracy = vertical;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    pub fn with_wall_time(mut self, epoch_ms: i64) -> Self {
        self.wall_time_ms = Some(epoch_ms);
        self
    }

    pub fn with_elapsed_realtime_millis(mut self, since_boot_ms: i64) -> Self {
        self.elapsed_realtime_nanos = since_boot_ms.checked_mul(1_000_000);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// Canonical location record delivered to callers.
///
/// Latitude and longitude are always present; every other field is
/// independently optional.
#[derive(Debug, Clone, Default)]
pub struct Fix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: Option<f64>,
    /// Mean-sea-level altitude from a recent GGA sentence.
    pub msl_altitude: Option<f64>,
    /// Horizontal accuracy in meters.
    pub horizontal_accuracy: Option<f64>,
    /// Vertical accuracy in meters.
    pub vertical_accuracy: Option<f64>,
    /// Speed in m/s.
    pub speed: Option<f64>,
    /// Bearing in degrees.
    pub bearing: Option<f64>,
    /// Capture time in epoch milliseconds.
    pub timestamp: i64,
    /// Milliseconds between capture and normalization, never negative.
    pub age: i64,
    /// Capture time on the boot clock in milliseconds.
    pub elapsed_boot: Option<i64>,
    /// Provider tag (provider/criteria platforms only).
    pub provider: Option<String>,
    /// The native object this fix was normalized from.
    pub native: Option<Arc<NativeFix>>,
}

impl Fix {
    /// Create a synthetic fix (no native object attached).
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    /// Age of this fix relative to `now_ms`, clamped at zero.
    pub fn age_at(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp).max(0)
    }

    /// Whether this fix is no older than `maximum_age_ms` at `now_ms`.
    pub fn is_fresh(&self, now_ms: i64, maximum_age_ms: u64) -> bool {
        let age = now_ms.saturating_sub(self.timestamp);
        age <= i64::try_from(maximum_age_ms).unwrap_or(i64::MAX)
    }

    /// Serialize using an explicit key mapping.
    pub fn to_json_with(&self, keys: &GeoKeys) -> serde_json::Value {
        serde_json::Value::Object(self.json_fields(keys))
    }

    fn json_fields(&self, keys: &GeoKeys) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert(keys.latitude.as_str().into(), self.latitude.into());
        map.insert(keys.longitude.as_str().into(), self.longitude.into());
        if let Some(alt) = self.altitude {
            map.insert(keys.altitude.as_str().into(), alt.into());
        }
        let optional = [
            ("mslAltitude", self.msl_altitude),
            ("horizontalAccuracy", self.horizontal_accuracy),
            ("verticalAccuracy", self.vertical_accuracy),
            ("speed", self.speed),
            ("bearing", self.bearing),
        ];
        for (name, value) in optional {
            if let Some(v) = value {
                map.insert(name.into(), v.into());
            }
        }
        map.insert("timestamp".into(), self.timestamp.into());
        map.insert("age".into(), self.age.into());
        if let Some(boot) = self.elapsed_boot {
            map.insert("elapsedBoot".into(), boot.into());
        }
        if let Some(provider) = &self.provider {
            map.insert("provider".into(), provider.clone().into());
        }
        map
    }
}

impl PartialEq for Fix {
    fn eq(&self, other: &Self) -> bool {
        self.latitude == other.latitude
            && self.longitude == other.longitude
            && self.altitude == other.altitude
            && self.msl_altitude == other.msl_altitude
            && self.horizontal_accuracy == other.horizontal_accuracy
            && self.vertical_accuracy == other.vertical_accuracy
            && self.speed == other.speed
            && self.bearing == other.bearing
            && self.timestamp == other.timestamp
            && self.elapsed_boot == other.elapsed_boot
            && self.provider == other.provider
    }
}

impl Serialize for Fix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let object = self.json_fields(&geo_keys());
        let mut map = serializer.serialize_map(Some(object.len()))?;
        for (k, v) in &object {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
