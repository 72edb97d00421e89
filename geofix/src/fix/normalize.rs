//! Native fix normalization.
//!
//! Timestamps are derived from the boot clock whenever the native fix carries
//! a boot-relative capture time: `boot_time + elapsed_realtime`. The
//! wall-clock field is only used when that value is missing or negative,
//! since wall-clock adjustments would otherwise flip freshness checks.

use std::sync::Arc;

use tracing::trace;

use super::model::{Fix, NativeFix};
use crate::clock::Clock;

/// Converts native fixes into canonical [`Fix`] records.
#[derive(Clone)]
pub struct FixNormalizer {
    clock: Arc<dyn Clock>,
    vertical_falls_back_to_horizontal: bool,
}

impl std::fmt::Debug for FixNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixNormalizer")
            .field(
                "vertical_falls_back_to_horizontal",
                &self.vertical_falls_back_to_horizontal,
            )
            .finish_non_exhaustive()
    }
}

impl FixNormalizer {
    /// Create a normalizer reading the current time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            vertical_falls_back_to_horizontal: false,
        }
    }

    /// Report horizontal accuracy as vertical accuracy when the native fix
    /// has none.
    pub fn with_vertical_fallback(mut self, enabled: bool) -> Self {
        self.vertical_falls_back_to_horizontal = enabled;
        self
    }

    /// The clock this normalizer reads.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Normalize a native fix.
    pub fn normalize(&self, native: NativeFix) -> Fix {
        let now = self.clock.now_millis();

        let since_boot = native
            .elapsed_realtime_nanos
            .filter(|nanos| *nanos >= 0)
            .map(|nanos| (nanos as f64 / 1_000_000.0).round() as i64);

        let timestamp = match (since_boot, native.wall_time_ms) {
            (Some(boot_ms), _) => self.clock.boot_time_millis() + boot_ms,
            (None, Some(wall)) => wall,
            (None, None) => now,
        };

        let vertical_accuracy = if self.vertical_falls_back_to_horizontal {
            native.vertical_accuracy.or(native.horizontal_accuracy)
        } else {
            native.vertical_accuracy
        };

        let fix = Fix {
            latitude: native.latitude,
            longitude: native.longitude,
            altitude: native.altitude,
            msl_altitude: None,
            horizontal_accuracy: native.horizontal_accuracy,
            vertical_accuracy,
            speed: native.speed,
            bearing: native.bearing,
            timestamp,
            age: (now - timestamp).max(0),
            elapsed_boot: since_boot,
            provider: native.provider.clone(),
            native: Some(Arc::new(native)),
        };

        trace!(
            timestamp = fix.timestamp,
            age_ms = fix.age,
            provider = ?fix.provider,
            "Normalized native fix"
        );

        fix
    }
}
