//! Registry of active location registrations.
//!
//! Every request or watch owns exactly one registration, identified by a
//! [`WatchHandle`]. The registry owns the native session behind it and
//! routes native events to the registration's callback after
//! normalization.
//!
//! # Lifecycle
//!
//! ```text
//! create ──► start ──► (events ...) ──► stop
//!              │
//!              └── error ──► disposed
//! ```
//!
//! `stop` is idempotent and may be called from inside the registration's
//! own callback. Events that arrive for a handle that is no longer
//! registered are dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::error::{LocationError, LocationResult};
use crate::fix::{Fix, FixNormalizer};
use crate::options::RequestOptions;
use crate::platform::{
    parse_gga_altitude, EventDispatch, EventSink, ListenerEvent, MslAltitude, NativeEvent,
    NativeSession, PlatformLocationProvider,
};

/// Opaque identifier of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(pub u64);

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback receiving a registration's events.
pub type ListenerCallback = Arc<dyn Fn(ListenerEvent) + Send + Sync>;

struct Registration {
    callback: ListenerCallback,
    options: RequestOptions,
    session: Option<NativeSession>,
    msl_altitude: Option<MslAltitude>,
}

struct RegistryInner {
    platform: Arc<dyn PlatformLocationProvider>,
    normalizer: FixNormalizer,
    entries: DashMap<WatchHandle, Registration>,
    next_handle: AtomicU64,
}

impl RegistryInner {
    fn translate(&self, handle: WatchHandle, event: NativeEvent, registration: &Snapshot) -> ListenerEvent {
        match event {
            NativeEvent::FixReceived(native) => {
                let mut fix = self.normalizer.normalize(native);
                if let Some(msl) = registration.msl_altitude {
                    let window_ms = registration.minimum_update_time_ms;
                    if fix.timestamp - msl.timestamp_ms <= window_ms {
                        fix.msl_altitude = Some(msl.altitude);
                    }
                }
                trace!(
                    handle = %handle,
                    latitude = fix.latitude,
                    longitude = fix.longitude,
                    timestamp = fix.timestamp,
                    "Fix delivered"
                );
                ListenerEvent::Fix(fix)
            }
            NativeEvent::Failed(reason) => ListenerEvent::Failed(LocationError::Native(reason)),
            NativeEvent::AuthorizationChanged(status) => ListenerEvent::AuthorizationChanged(status),
            NativeEvent::DeferredUpdatesFinished(error) => {
                ListenerEvent::DeferredUpdatesFinished(error.map(LocationError::Native))
            }
            NativeEvent::Paused => ListenerEvent::Paused,
        }
    }
}

/// What dispatch needs from a registration, copied out of the map so the
/// callback runs without holding a map guard.
struct Snapshot {
    callback: ListenerCallback,
    msl_altitude: Option<MslAltitude>,
    minimum_update_time_ms: i64,
}

impl EventDispatch for RegistryInner {
    fn dispatch(&self, handle: WatchHandle, event: NativeEvent) {
        let snapshot = match self.entries.get(&handle) {
            Some(entry) => Snapshot {
                callback: entry.callback.clone(),
                msl_altitude: entry.msl_altitude,
                minimum_update_time_ms: i64::try_from(entry.options.effective_minimum_update_time().as_millis())
                    .unwrap_or(i64::MAX),
            },
            None => {
                trace!(handle = %handle, "Dropping event for cleared registration");
                return;
            }
        };

        let event = self.translate(handle, event, &snapshot);
        (snapshot.callback)(event);
    }

    fn nmea(&self, handle: WatchHandle, sentence: &str, timestamp_ms: i64) {
        let Some(altitude) = parse_gga_altitude(sentence) else {
            return;
        };
        if let Some(mut entry) = self.entries.get_mut(&handle) {
            trace!(handle = %handle, altitude, "MSL altitude from NMEA");
            entry.msl_altitude = Some(MslAltitude {
                altitude,
                timestamp_ms,
            });
        }
    }
}

/// Table of active registrations over one platform.
#[derive(Clone)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    pub fn new(platform: Arc<dyn PlatformLocationProvider>, clock: Arc<dyn Clock>) -> Self {
        let normalizer =
            FixNormalizer::new(clock).with_vertical_fallback(platform.vertical_accuracy_fallback());
        Self {
            inner: Arc::new(RegistryInner {
                platform,
                normalizer,
                entries: DashMap::new(),
                next_handle: AtomicU64::new(1),
            }),
        }
    }

    pub fn platform(&self) -> &Arc<dyn PlatformLocationProvider> {
        &self.inner.platform
    }

    pub fn normalizer(&self) -> &FixNormalizer {
        &self.inner.normalizer
    }

    /// Allocate a registration without starting native monitoring.
    ///
    /// Handles are never reused within the registry's lifetime.
    pub fn create(
        &self,
        callback: impl Fn(ListenerEvent) + Send + Sync + 'static,
        options: &RequestOptions,
    ) -> WatchHandle {
        let handle = WatchHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
        self.inner.entries.insert(
            handle,
            Registration {
                callback: Arc::new(callback),
                options: options.clone(),
                session: None,
                msl_altitude: None,
            },
        );
        trace!(handle = %handle, "Registration created");
        handle
    }

    /// Start native monitoring for a registration.
    ///
    /// An unknown handle is a no-op.
    ///
    /// # Errors
    ///
    /// Native start failures are returned after the registration has been
    /// disposed.
    pub fn start(&self, handle: WatchHandle, options: &RequestOptions) -> LocationResult<()> {
        match self.inner.entries.get_mut(&handle) {
            Some(mut entry) => entry.options = options.clone(),
            None => {
                debug!(handle = %handle, "Start for unknown registration ignored");
                return Ok(());
            }
        }

        let weak = Arc::downgrade(&self.inner);
        let target: std::sync::Weak<dyn EventDispatch> = weak;
        let sink = EventSink::new(handle, target);

        match self.inner.platform.start(sink, options) {
            Ok(session) => {
                match self.inner.entries.get_mut(&handle) {
                    Some(mut entry) => entry.session = Some(session),
                    // Stopped while the platform was starting.
                    None => {
                        self.inner.platform.stop(&session);
                        debug!(handle = %handle, session = %session.id, "Registration cleared during start");
                        return Ok(());
                    }
                }
                debug!(handle = %handle, session = %session.id, "Registration started");
                Ok(())
            }
            Err(e) => {
                warn!(handle = %handle, error = %e, "Failed to start native monitoring");
                self.stop(handle);
                Err(e)
            }
        }
    }

    /// Stop native monitoring and dispose of a registration.
    ///
    /// Returns `false` if the handle was not registered.
    pub fn stop(&self, handle: WatchHandle) -> bool {
        match self.inner.entries.remove(&handle) {
            Some((_, registration)) => {
                if let Some(session) = registration.session {
                    self.inner.platform.stop(&session);
                }
                debug!(handle = %handle, "Registration stopped");
                true
            }
            None => false,
        }
    }

    /// The most recent cached fix the platform offers, normalized.
    ///
    /// Ties on timestamp prefer sources that match the platform's criterion.
    pub fn last_known(&self) -> Option<Fix> {
        self.inner
            .platform
            .last_known_candidates()
            .into_iter()
            .map(|candidate| {
                let matches = candidate.matches_criteria;
                (self.inner.normalizer.normalize(candidate.fix), matches)
            })
            .max_by_key(|(fix, matches)| (fix.timestamp, *matches))
            .map(|(fix, _)| fix)
    }

    pub fn contains(&self, handle: WatchHandle) -> bool {
        self.inner.entries.contains_key(&handle)
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Handles of live registrations, in allocation order.
    pub fn handles(&self) -> Vec<WatchHandle> {
        let mut handles: Vec<_> = self.inner.entries.iter().map(|e| *e.key()).collect();
        handles.sort();
        handles
    }
}
