//! Authorization, settings and application-lifecycle collaborators.
//!
//! These are the OS-facing services the permission gate sequences:
//!
//! - [`AuthorizationService`] - query or request location authorization
//! - [`SettingsPrompt`] - open the OS location settings screen
//! - [`AppLifecycle`] - resume / activity-result events that signal the user
//!   came back from the settings screen
//!
//! The traits use boxed futures so implementations can be held as
//! `Arc<dyn ...>` trait objects.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::LocationResult;

/// Request code used when launching the settings screen for a result.
pub const SETTINGS_REQUEST_CODE: i32 = 5340;

/// Capacity of the lifecycle broadcast channel.
const LIFECYCLE_CHANNEL_CAPACITY: usize = 16;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Location authorization status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    /// The app may not use location services (parental controls, MDM, ...).
    Restricted,
    /// The user refused.
    Denied,
    /// Authorized while the app is in use.
    WhenInUse,
    /// Authorized at all times.
    Always,
}

impl AuthorizationStatus {
    /// Whether any level of authorization is granted.
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::WhenInUse | Self::Always)
    }

    /// Whether authorized with the requested scope.
    ///
    /// `None` accepts either scope; `Some(true)` requires `Always`;
    /// `Some(false)` requires `WhenInUse`.
    pub fn is_authorized_for(&self, always: Option<bool>) -> bool {
        match always {
            None => self.is_authorized(),
            Some(true) => *self == Self::Always,
            Some(false) => *self == Self::WhenInUse,
        }
    }
}

/// Location authorization service.
pub trait AuthorizationService: Send + Sync {
    /// Current authorization status, without prompting.
    fn check(&self) -> BoxFuture<'_, AuthorizationStatus>;

    /// Request authorization, suspending until the user answers.
    ///
    /// `always` asks for background ("always") scope instead of in-use scope.
    fn request(&self, always: bool) -> BoxFuture<'_, AuthorizationStatus>;
}

/// Opens the OS location settings screen.
pub trait SettingsPrompt: Send + Sync {
    /// Launch the settings screen. Returns once it is shown, not once the
    /// user is done; completion is observed through [`AppLifecycle`].
    ///
    /// # Errors
    ///
    /// `LocationError::SettingsUnavailable` if the screen cannot be opened.
    fn open(&self, request_code: i32) -> LocationResult<()>;
}

/// Application lifecycle events relevant to the settings round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// The application returned to the foreground.
    Resumed,
    /// A launched activity returned a result.
    ActivityResult { request_code: i32 },
}

impl AppEvent {
    /// Whether this event ends the settings round trip.
    pub fn ends_settings_prompt(&self) -> bool {
        match self {
            Self::Resumed => true,
            Self::ActivityResult { request_code } => *request_code == SETTINGS_REQUEST_CODE,
        }
    }
}

/// Broadcast hub for application lifecycle events.
///
/// The host application forwards its resume and activity-result callbacks
/// here; the permission gate subscribes while a settings prompt is open.
#[derive(Debug, Clone)]
pub struct AppLifecycle {
    tx: broadcast::Sender<AppEvent>,
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl AppLifecycle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(LIFECYCLE_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Report that the application resumed.
    pub fn resumed(&self) {
        self.publish(AppEvent::Resumed);
    }

    /// Report an activity result.
    pub fn activity_result(&self, request_code: i32) {
        self.publish(AppEvent::ActivityResult { request_code });
    }

    fn publish(&self, event: AppEvent) {
        // No receivers is normal: nothing is waiting on settings.
        let receivers = self.tx.send(event).unwrap_or(0);
        debug!(event = ?event, receivers, "Lifecycle event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_authorized() {
        assert!(!AuthorizationStatus::NotDetermined.is_authorized());
        assert!(!AuthorizationStatus::Denied.is_authorized());
        assert!(!AuthorizationStatus::Restricted.is_authorized());
        assert!(AuthorizationStatus::WhenInUse.is_authorized());
        assert!(AuthorizationStatus::Always.is_authorized());
    }

    #[test]
    fn test_is_authorized_for_scope() {
        assert!(AuthorizationStatus::Always.is_authorized_for(Some(true)));
        assert!(!AuthorizationStatus::WhenInUse.is_authorized_for(Some(true)));
        assert!(AuthorizationStatus::WhenInUse.is_authorized_for(Some(false)));
        assert!(AuthorizationStatus::WhenInUse.is_authorized_for(None));
    }

    #[test]
    fn test_settings_round_trip_events() {
        assert!(AppEvent::Resumed.ends_settings_prompt());
        assert!(AppEvent::ActivityResult {
            request_code: SETTINGS_REQUEST_CODE
        }
        .ends_settings_prompt());
        assert!(!AppEvent::ActivityResult { request_code: 1 }.ends_settings_prompt());
    }

    #[tokio::test]
    async fn test_lifecycle_broadcast() {
        let lifecycle = AppLifecycle::new();
        let mut rx = lifecycle.subscribe();

        lifecycle.activity_result(SETTINGS_REQUEST_CODE);
        lifecycle.resumed();

        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::ActivityResult {
                request_code: SETTINGS_REQUEST_CODE
            }
        );
        assert_eq!(rx.recv().await.unwrap(), AppEvent::Resumed);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let lifecycle = AppLifecycle::new();
        lifecycle.resumed();
    }
}
