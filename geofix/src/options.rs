//! Per-request options.
//!
//! [`RequestOptions`] carries every recognized option for a one-shot
//! request or a watch. Unset options fall back to the defaults below;
//! platform-specific hints are ignored by platforms they do not apply to.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::LocationError;

/// Desired accuracy (meters) at or below which fine-grained providers are used.
pub const ACCURACY_HIGH_M: f64 = 3.0;

/// Desired accuracy (meters) that accepts any provider.
pub const ACCURACY_ANY_M: f64 = 300.0;

/// Deadline for a one-shot request when no timeout is given.
pub const DEFAULT_GET_LOCATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Minimum time between deliveries on provider/criteria platforms.
pub const DEFAULT_MINIMUM_UPDATE_TIME: Duration = Duration::from_secs(60);

/// Minimum distance between deliveries.
pub const DEFAULT_UPDATE_DISTANCE_M: f64 = 0.0;

/// Named native provider on provider/criteria platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gps,
    Network,
    Passive,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gps => "gps",
            Self::Network => "network",
            Self::Passive => "passive",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity hint for delegate/manager platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityType {
    Other,
    AutomotiveNavigation,
    #[default]
    Fitness,
    OtherNavigation,
    Airborne,
}

/// Deferred (batched) delivery thresholds for delegate/manager platforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeferredUpdates {
    /// Distance to travel before the batch is delivered, in meters.
    pub traveled_m: f64,
    /// Time to wait before the batch is delivered.
    pub timeout: Duration,
}

/// Callback invoked when deferred delivery finishes (with the error, if any).
pub type DeferredCallback = Arc<dyn Fn(Option<LocationError>) + Send + Sync>;

/// Callback invoked when the platform pauses updates on its own.
pub type PausedCallback = Arc<dyn Fn() + Send + Sync>;

/// Optional callbacks for delegate-only events.
#[derive(Clone, Default)]
pub struct DelegateHooks {
    pub on_deferred: Option<DeferredCallback>,
    pub on_paused: Option<PausedCallback>,
}

impl fmt::Debug for DelegateHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateHooks")
            .field("on_deferred", &self.on_deferred.is_some())
            .field("on_paused", &self.on_paused.is_some())
            .finish()
    }
}

/// Options for a single request or watch.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Desired accuracy in meters (default [`ACCURACY_HIGH_M`]).
    pub desired_accuracy: Option<f64>,
    /// Minimum movement between deliveries, in meters.
    pub update_distance: Option<f64>,
    /// Minimum time between deliveries.
    pub minimum_update_time: Option<Duration>,
    /// Fixes older than this are rejected (cache path) or ignored (monitoring).
    pub maximum_age: Option<Duration>,
    /// One-shot deadline. `Some(Duration::ZERO)` means cached fix only.
    pub timeout: Option<Duration>,
    /// Bypass the authorization step of the gate.
    pub skip_permission_check: bool,
    /// Fail instead of opening settings when the subsystem is disabled.
    pub dont_open_settings: bool,

    /// Keep delivering while the app is in the background (delegate platforms).
    pub allows_background_updates: bool,
    /// Let the platform pause updates automatically (delegate platforms, default true).
    pub pauses_updates_automatically: Option<bool>,
    /// Activity hint (delegate platforms).
    pub activity_type: Option<ActivityType>,
    /// Batched delivery thresholds (delegate platforms).
    pub deferred_updates: Option<DeferredUpdates>,
    /// Named provider to use instead of a selection criterion (criteria platforms).
    pub provider: Option<ProviderKind>,
    /// Parse NMEA GGA sentences for mean-sea-level altitude (criteria platforms).
    pub nmea_altitude: bool,
    /// Deferred/paused callbacks for watches.
    pub hooks: DelegateHooks,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desired_accuracy(mut self, meters: f64) -> Self {
        self.desired_accuracy = Some(meters);
        self
    }

    pub fn update_distance(mut self, meters: f64) -> Self {
        self.update_distance = Some(meters);
        self
    }

    pub fn minimum_update_time(mut self, interval: Duration) -> Self {
        self.minimum_update_time = Some(interval);
        self
    }

    pub fn maximum_age(mut self, age: Duration) -> Self {
        self.maximum_age = Some(age);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn skip_permission_check(mut self, skip: bool) -> Self {
        self.skip_permission_check = skip;
        self
    }

    pub fn dont_open_settings(mut self, dont: bool) -> Self {
        self.dont_open_settings = dont;
        self
    }

    pub fn allows_background_updates(mut self, allow: bool) -> Self {
        self.allows_background_updates = allow;
        self
    }

    pub fn pauses_updates_automatically(mut self, pauses: bool) -> Self {
        self.pauses_updates_automatically = Some(pauses);
        self
    }

    pub fn activity_type(mut self, activity: ActivityType) -> Self {
        self.activity_type = Some(activity);
        self
    }

    pub fn deferred_updates(mut self, traveled_m: f64, timeout: Duration) -> Self {
        self.deferred_updates = Some(DeferredUpdates {
            traveled_m,
            timeout,
        });
        self
    }

    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn nmea_altitude(mut self, enabled: bool) -> Self {
        self.nmea_altitude = enabled;
        self
    }

    pub fn on_deferred(mut self, callback: impl Fn(Option<LocationError>) + Send + Sync + 'static) -> Self {
        self.hooks.on_deferred = Some(Arc::new(callback));
        self
    }

    pub fn on_paused(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.on_paused = Some(Arc::new(callback));
        self
    }

    /// Whether this request must be answered from the cached fix only.
    pub fn is_cache_only(&self) -> bool {
        self.timeout == Some(Duration::ZERO)
    }

    /// The one-shot deadline, defaulted.
    pub fn effective_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_GET_LOCATION_TIMEOUT)
    }

    /// The desired accuracy in meters, defaulted.
    pub fn effective_desired_accuracy(&self) -> f64 {
        self.desired_accuracy.unwrap_or(ACCURACY_HIGH_M)
    }

    /// The minimum update interval, defaulted.
    pub fn effective_minimum_update_time(&self) -> Duration {
        self.minimum_update_time.unwrap_or(DEFAULT_MINIMUM_UPDATE_TIME)
    }

    /// The distance filter in meters, defaulted.
    pub fn effective_update_distance(&self) -> f64 {
        self.update_distance.unwrap_or(DEFAULT_UPDATE_DISTANCE_M)
    }

    /// Maximum age in milliseconds, if set.
    pub fn maximum_age_ms(&self) -> Option<u64> {
        self.maximum_age
            .map(|age| u64::try_from(age.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RequestOptions::default();
        assert!(!options.is_cache_only());
        assert_eq!(options.effective_timeout(), DEFAULT_GET_LOCATION_TIMEOUT);
        assert_eq!(options.effective_desired_accuracy(), ACCURACY_HIGH_M);
        assert_eq!(options.effective_minimum_update_time(), Duration::from_secs(60));
        assert_eq!(options.effective_update_distance(), 0.0);
        assert!(options.maximum_age_ms().is_none());
    }

    #[test]
    fn test_zero_timeout_is_cache_only() {
        let options = RequestOptions::new().timeout(Duration::ZERO);
        assert!(options.is_cache_only());
    }

    #[test]
    fn test_maximum_age_saturates() {
        let options = RequestOptions::new().maximum_age(Duration::MAX);
        assert_eq!(options.maximum_age_ms(), Some(u64::MAX));
    }

    #[test]
    fn test_builder() {
        let options = RequestOptions::new()
            .maximum_age(Duration::from_millis(5_000))
            .provider(ProviderKind::Network)
            .deferred_updates(500.0, Duration::from_secs(30))
            .on_paused(|| {});

        assert_eq!(options.maximum_age_ms(), Some(5_000));
        assert_eq!(options.provider.map(|p| p.as_str()), Some("network"));
        assert_eq!(options.deferred_updates.unwrap().traveled_m, 500.0);
        assert!(options.hooks.on_paused.is_some());
        assert!(format!("{:?}", options.hooks).contains("on_paused: true"));
    }
}
