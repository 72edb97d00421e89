//! Manager/delegate platform model.
//!
//! Every registration owns its own native manager object. The manager is
//! configured with accuracy, distance filter and background hints, and
//! reports through delegate callbacks, which the backend turns into
//! [`NativeEvent`](super::NativeEvent)s on the registration's sink.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{
    EventSink, LastKnownCandidate, NativeSession, PlatformKind, PlatformLocationProvider,
    SessionId,
};
use crate::error::LocationResult;
use crate::fix::{Fix, NativeFix};
use crate::options::{ActivityType, DeferredUpdates, RequestOptions};
use crate::status::{StatusTrigger, StatusWatchId};

/// Native manager configuration for one registration.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    pub desired_accuracy_m: f64,
    /// `None` means every movement is reported.
    pub distance_filter_m: Option<f64>,
    pub allows_background_updates: bool,
    pub pauses_updates_automatically: bool,
    pub activity_type: ActivityType,
    pub deferred_updates: Option<DeferredUpdates>,
}

impl ManagerConfig {
    pub fn for_options(options: &RequestOptions) -> Self {
        Self {
            desired_accuracy_m: options.effective_desired_accuracy(),
            distance_filter_m: options.update_distance,
            allows_background_updates: options.allows_background_updates,
            pauses_updates_automatically: options.pauses_updates_automatically.unwrap_or(true),
            activity_type: options.activity_type.unwrap_or_default(),
            deferred_updates: options.deferred_updates,
        }
    }
}

/// Build a [`NativeFix`] from a manager's location object fields.
///
/// Managers report unknown speed, course and accuracy as negative numbers.
#[allow(clippy::too_many_arguments)]
pub fn manager_fix(
    latitude: f64,
    longitude: f64,
    altitude: f64,
    horizontal_accuracy: f64,
    vertical_accuracy: f64,
    speed: f64,
    course: f64,
    timestamp_ms: i64,
) -> NativeFix {
    let known = |v: f64| Some(v).filter(|v| *v >= 0.0);
    NativeFix {
        latitude,
        longitude,
        altitude: known(vertical_accuracy).map(|_| altitude),
        horizontal_accuracy: known(horizontal_accuracy),
        vertical_accuracy: known(vertical_accuracy),
        speed: known(speed),
        bearing: known(course),
        wall_time_ms: Some(timestamp_ms),
        elapsed_realtime_nanos: None,
        provider: None,
    }
}

/// Native operations of a manager/delegate location service.
pub trait ManagerBackend: Send + Sync {
    /// Create a manager for a session with its delegate.
    fn create_manager(&self, id: SessionId, config: &ManagerConfig, delegate: EventSink) -> LocationResult<()>;

    fn start_updating(&self, id: SessionId) -> LocationResult<()>;

    /// Ask the manager to batch deliveries.
    fn allow_deferred_updates(&self, id: SessionId, traveled_m: f64, timeout: Duration) -> LocationResult<()>;

    fn stop_updating(&self, id: SessionId);

    /// Drop the manager and its delegate.
    fn release_manager(&self, id: SessionId);

    /// Sessions with a live manager.
    fn live_managers(&self) -> Vec<SessionId>;

    /// A live manager's cached location.
    fn cached_location(&self, id: SessionId) -> Option<NativeFix>;

    /// The cached location of a freshly created manager.
    fn fresh_cached_location(&self) -> Option<NativeFix>;

    /// Whether location services are enabled system-wide.
    fn location_services_enabled(&self) -> LocationResult<bool>;

    /// Start a manager whose delegate reports authorization changes.
    fn watch_authorization(&self, trigger: StatusTrigger) -> LocationResult<StatusWatchId>;

    fn unwatch_authorization(&self, id: StatusWatchId);
}

/// [`PlatformLocationProvider`] over a [`ManagerBackend`].
pub struct DelegatePlatform<B: ManagerBackend> {
    backend: Arc<B>,
}

impl<B: ManagerBackend> DelegatePlatform<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B: ManagerBackend> PlatformLocationProvider for DelegatePlatform<B> {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Delegate
    }

    fn start(&self, sink: EventSink, options: &RequestOptions) -> LocationResult<NativeSession> {
        let id = SessionId(sink.handle().0);
        let config = ManagerConfig::for_options(options);

        self.backend.create_manager(id, &config, sink)?;
        if let Err(e) = self.backend.start_updating(id) {
            self.backend.release_manager(id);
            return Err(e);
        }
        if let Some(deferred) = config.deferred_updates {
            // Batching is best effort; the session keeps running without it.
            if let Err(e) = self
                .backend
                .allow_deferred_updates(id, deferred.traveled_m, deferred.timeout)
            {
                warn!(session = %id, error = %e, "Deferred updates not available");
            }
        }

        debug!(session = %id, config = ?config, "Started location manager");
        Ok(NativeSession {
            id,
            nmea_listener: false,
        })
    }

    fn stop(&self, session: &NativeSession) {
        self.backend.stop_updating(session.id);
        self.backend.release_manager(session.id);
        debug!(session = %session.id, "Released location manager");
    }

    fn last_known_candidates(&self) -> Vec<LastKnownCandidate> {
        let cached: Vec<_> = self
            .backend
            .live_managers()
            .into_iter()
            .filter_map(|id| self.backend.cached_location(id))
            .map(|fix| LastKnownCandidate {
                fix,
                matches_criteria: false,
            })
            .collect();

        if !cached.is_empty() {
            return cached;
        }
        self.backend
            .fresh_cached_location()
            .map(|fix| LastKnownCandidate {
                fix,
                matches_criteria: false,
            })
            .into_iter()
            .collect()
    }

    fn query_enabled(&self) -> LocationResult<bool> {
        self.backend.location_services_enabled()
    }

    fn native_from_fix(&self, fix: &Fix) -> NativeFix {
        manager_fix(
            fix.latitude,
            fix.longitude,
            fix.altitude.unwrap_or(0.0),
            fix.horizontal_accuracy.unwrap_or(-1.0),
            fix.vertical_accuracy.unwrap_or(-1.0),
            fix.speed.unwrap_or(-1.0),
            fix.bearing.unwrap_or(-1.0),
            fix.timestamp,
        )
    }

    fn watch_status(&self, trigger: StatusTrigger) -> LocationResult<StatusWatchId> {
        self.backend.watch_authorization(trigger)
    }

    fn unwatch_status(&self, id: StatusWatchId) {
        self.backend.unwatch_authorization(id)
    }
}
