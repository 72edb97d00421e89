//! Error types for location requests.
//!
//! Every failure a caller can observe from [`crate::LocationService`] is one
//! variant of [`LocationError`]. One-shot requests return it as the `Err`
//! side of their result; continuous watches additionally deliver it to the
//! watch's error callback.

use thiserror::Error;

/// Result type for location operations.
pub type LocationResult<T> = Result<T, LocationError>;

/// Errors that can occur while acquiring a location.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    /// Location authorization was not granted.
    #[error("location authorization denied")]
    Denied,

    /// The location subsystem is off and was not enabled through settings.
    #[error("location service is not enabled")]
    ServiceDisabled,

    /// Cache-only request found no cached fix.
    #[error("there is no last known location")]
    NoLastKnownLocation,

    /// Cache-only request found a fix older than the requested maximum age.
    #[error("last known location too old: {age_ms}ms (maximum: {maximum_age_ms}ms)")]
    StaleLocation { age_ms: i64, maximum_age_ms: u64 },

    /// One-shot request received no acceptable fix before its deadline.
    #[error("no acceptable location within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The native provider refused to start monitoring.
    #[error("failed to start location monitoring: {0}")]
    NativeStartFailure(String),

    /// A running native session reported a failure.
    #[error("native location failure: {0}")]
    Native(String),

    /// The settings screen could not be opened.
    #[error("cannot open location settings")]
    SettingsUnavailable,

    /// The request's registration was cleared before it settled.
    #[error("location request cancelled")]
    Cancelled,

    /// Application lifecycle events stopped while waiting for the settings screen.
    #[error("application lifecycle closed while waiting for settings")]
    Lifecycle,
}

impl LocationError {
    /// Whether this error comes from the permission/enablement gate.
    pub fn is_gate_failure(&self) -> bool {
        matches!(
            self,
            Self::Denied | Self::ServiceDisabled | Self::SettingsUnavailable | Self::Lifecycle
        )
    }
}
