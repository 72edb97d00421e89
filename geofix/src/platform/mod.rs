//! Native location platform abstraction.
//!
//! Two native programming models are supported behind one trait:
//!
//! ```text
//!                     PlatformLocationProvider
//!                    ┌───────────┴────────────┐
//!          CriteriaPlatform<B>        DelegatePlatform<B>
//!     (providers + criteria +         (one manager per
//!      optional NMEA listener)         registration, delegate
//!                 │                    callbacks)
//!                 │                           │
//!          B: ProviderBackend          B: ManagerBackend
//!                 └────────── SimulatedDevice ─┘
//! ```
//!
//! The registry talks only to [`PlatformLocationProvider`]; which model is
//! in use is decided once, when the service is composed.

mod criteria;
mod delegate;
mod event;
mod nmea;

pub use criteria::{Criteria, CriteriaAccuracy, CriteriaPlatform, ProviderBackend, ProviderSelector};
pub use delegate::{manager_fix, DelegatePlatform, ManagerBackend, ManagerConfig};
pub use event::{EventSink, ListenerEvent, NativeEvent};
pub use nmea::{parse_gga_altitude, MslAltitude};

pub(crate) use event::EventDispatch;

use std::fmt;

use tracing::warn;

use crate::error::LocationResult;
use crate::fix::{self, Fix, NativeFix};
use crate::options::RequestOptions;
use crate::status::{StatusTrigger, StatusWatchId};

/// Identifier of one native monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// A started native session and the secondary listeners attached to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeSession {
    pub id: SessionId,
    /// Whether a secondary NMEA listener was attached.
    pub nmea_listener: bool,
}

/// A cached native fix offered for the last-known lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct LastKnownCandidate {
    pub fix: NativeFix,
    /// Whether the source matches the criterion the platform prefers.
    pub matches_criteria: bool,
}

/// Which native programming model a platform follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    /// Named providers selected by accuracy criteria.
    Criteria,
    /// One manager object per registration with delegate callbacks.
    Delegate,
}

impl PlatformKind {
    /// The model native to the compilation target.
    pub fn for_current_target() -> Self {
        if cfg!(any(target_os = "ios", target_os = "macos")) {
            Self::Delegate
        } else {
            Self::Criteria
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Criteria => "criteria",
            Self::Delegate => "delegate",
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlatformKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "criteria" | "android" => Ok(Self::Criteria),
            "delegate" | "ios" => Ok(Self::Delegate),
            other => Err(format!("unknown platform model: {}", other)),
        }
    }
}

/// A native location platform.
///
/// Implementations must not call back into the registry or status notifier
/// synchronously from `start`, `stop`, `watch_status` or `unwatch_status`;
/// events are delivered later through the [`EventSink`] or [`StatusTrigger`].
pub trait PlatformLocationProvider: Send + Sync {
    /// The native model this platform follows.
    fn kind(&self) -> PlatformKind;

    /// Start native monitoring for one registration.
    ///
    /// # Errors
    ///
    /// `LocationError::NativeStartFailure` if the native layer refuses.
    fn start(&self, sink: EventSink, options: &RequestOptions) -> LocationResult<NativeSession>;

    /// Stop a session and detach its secondary listeners.
    fn stop(&self, session: &NativeSession);

    /// Cached fixes the platform can offer without starting a session.
    fn last_known_candidates(&self) -> Vec<LastKnownCandidate>;

    /// Whether the location subsystem is enabled.
    fn query_enabled(&self) -> LocationResult<bool>;

    /// Like [`query_enabled`](Self::query_enabled), treating failures as disabled.
    fn is_enabled(&self) -> bool {
        match self.query_enabled() {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!(error = %e, "Failed to query location subsystem, assuming disabled");
                false
            }
        }
    }

    /// Whether the device has satellite positioning hardware.
    fn has_gps(&self) -> bool {
        true
    }

    /// Whether satellite positioning is switched on.
    fn is_gps_enabled(&self) -> bool {
        self.is_enabled()
    }

    /// Geodesic distance in meters between two native fixes.
    fn distance(&self, a: &NativeFix, b: &NativeFix) -> f64 {
        fix::distance_m(a.latitude, a.longitude, b.latitude, b.longitude)
    }

    /// Build a native-equivalent fix from canonical fields.
    fn native_from_fix(&self, fix: &Fix) -> NativeFix {
        let mut native = NativeFix::new(fix.latitude, fix.longitude).with_wall_time(fix.timestamp);
        native.altitude = fix.altitude;
        native.speed = fix.speed.filter(|s| *s >= 0.0);
        native.bearing = fix.bearing.filter(|b| *b >= 0.0);
        native.provider = fix.provider.clone();
        native
    }

    /// Whether vertical accuracy should fall back to horizontal accuracy.
    fn vertical_accuracy_fallback(&self) -> bool {
        false
    }

    /// Start reporting subsystem status changes to `trigger`.
    fn watch_status(&self, trigger: StatusTrigger) -> LocationResult<StatusWatchId>;

    /// Stop a status watch started with [`watch_status`](Self::watch_status).
    fn unwatch_status(&self, id: StatusWatchId);
}
