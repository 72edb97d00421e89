//! Permission and enablement gate.
//!
//! Every request passes the gate before any native monitoring starts:
//!
//! ```text
//! skip_permission_check? ──no──► check ──not authorized──► request ──► Denied
//!          │                        │                         │
//!          └───────────yes──────────┴──────authorized─────────┘
//!                                   ▼
//!                         enabled? ──yes──► Ok
//!                            │
//!                           no ──dont_open_settings──► ServiceDisabled
//!                            │
//!                            ▼
//!               open settings ─► wait for return ─► enabled? ─► Ok / ServiceDisabled
//! ```
//!
//! Only one settings prompt is shown at a time. Requests that arrive while
//! a prompt is open wait for it and re-check enablement before opening
//! their own.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::error::{LocationError, LocationResult};
use crate::options::RequestOptions;
use crate::permission::{AppLifecycle, AuthorizationService, SettingsPrompt, SETTINGS_REQUEST_CODE};
use crate::platform::PlatformLocationProvider;

/// Sequences authorization and enablement ahead of a request.
pub struct PermissionGate {
    platform: Arc<dyn PlatformLocationProvider>,
    authorization: Arc<dyn AuthorizationService>,
    settings: Arc<dyn SettingsPrompt>,
    lifecycle: AppLifecycle,
    prompt: Mutex<()>,
}

impl PermissionGate {
    pub fn new(
        platform: Arc<dyn PlatformLocationProvider>,
        authorization: Arc<dyn AuthorizationService>,
        settings: Arc<dyn SettingsPrompt>,
        lifecycle: AppLifecycle,
    ) -> Self {
        Self {
            platform,
            authorization,
            settings,
            lifecycle,
            prompt: Mutex::new(()),
        }
    }

    /// Make sure location may be used for a request.
    ///
    /// # Errors
    ///
    /// - `Denied` if authorization is refused
    /// - `ServiceDisabled` if the subsystem stays off
    /// - `SettingsUnavailable` if the settings screen cannot be opened
    pub async fn prepare(&self, options: &RequestOptions) -> LocationResult<()> {
        if options.skip_permission_check {
            debug!("Skipping permission check");
        } else {
            self.ensure_authorized().await?;
        }

        if self.platform.is_enabled() {
            return Ok(());
        }
        if options.dont_open_settings {
            debug!("Location disabled and settings prompt not allowed");
            return Err(LocationError::ServiceDisabled);
        }
        self.enable().await
    }

    /// Whether authorization is granted, optionally with a specific scope.
    pub async fn is_authorized(&self, always: Option<bool>) -> bool {
        self.authorization.check().await.is_authorized_for(always)
    }

    /// Request authorization.
    ///
    /// # Errors
    ///
    /// `Denied` if the user does not grant it.
    pub async fn authorize(&self, always: bool) -> LocationResult<()> {
        let status = self.authorization.request(always).await;
        if status.is_authorized() {
            Ok(())
        } else {
            info!(status = ?status, "Location authorization refused");
            Err(LocationError::Denied)
        }
    }

    /// Open the location settings and wait for the user to come back.
    ///
    /// Succeeds immediately if location is already enabled.
    ///
    /// # Errors
    ///
    /// `ServiceDisabled` if location is still off afterwards,
    /// `SettingsUnavailable` if the screen cannot be shown.
    pub async fn enable(&self) -> LocationResult<()> {
        let _prompt = self.prompt.lock().await;
        if self.platform.is_enabled() {
            debug!("Location enabled while waiting for settings prompt");
            return Ok(());
        }

        let mut events = self.lifecycle.subscribe();
        self.settings.open(SETTINGS_REQUEST_CODE)?;
        debug!(request_code = SETTINGS_REQUEST_CODE, "Opened location settings");

        loop {
            match events.recv().await {
                Ok(event) if event.ends_settings_prompt() => break,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Lifecycle events skipped while in settings");
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(LocationError::Lifecycle),
            }
        }

        if self.platform.is_enabled() {
            info!("Location enabled from settings");
            Ok(())
        } else {
            Err(LocationError::ServiceDisabled)
        }
    }

    async fn ensure_authorized(&self) -> LocationResult<()> {
        if self.authorization.check().await.is_authorized() {
            return Ok(());
        }
        self.authorize(false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::permission::AuthorizationStatus;
    use crate::platform::PlatformKind;
    use crate::platform::ManagerBackend;
    use crate::simulated::{SimulatedAuthorization, SimulatedDevice, SimulatedSettings};

    struct Fixture {
        device: Arc<SimulatedDevice>,
        auth: Arc<SimulatedAuthorization>,
        settings: Arc<SimulatedSettings>,
        lifecycle: AppLifecycle,
        gate: Arc<PermissionGate>,
    }

    fn fixture(auth: SimulatedAuthorization, enabled: bool) -> Fixture {
        let device = Arc::new(SimulatedDevice::new(Arc::new(ManualClock::new(0, 0))));
        device.set_enabled(enabled);
        let lifecycle = AppLifecycle::new();
        let auth = Arc::new(auth);
        let settings = Arc::new(SimulatedSettings::new(device.clone(), lifecycle.clone()));
        let gate = Arc::new(PermissionGate::new(
            device.platform(PlatformKind::Criteria),
            auth.clone(),
            settings.clone(),
            lifecycle.clone(),
        ));
        Fixture {
            device,
            auth,
            settings,
            lifecycle,
            gate,
        }
    }

    #[tokio::test]
    async fn test_authorized_and_enabled() {
        let f = fixture(SimulatedAuthorization::granted(), true);
        f.gate.prepare(&RequestOptions::new()).await.unwrap();
        assert_eq!(f.auth.check_calls(), 1);
        assert_eq!(f.auth.request_calls(), 0);
        assert_eq!(f.settings.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_requests_when_not_determined() {
        let f = fixture(
            SimulatedAuthorization::new(AuthorizationStatus::NotDetermined)
                .answering(AuthorizationStatus::WhenInUse),
            true,
        );
        f.gate.prepare(&RequestOptions::new()).await.unwrap();
        assert_eq!(f.auth.request_calls(), 1);
    }

    #[tokio::test]
    async fn test_denied() {
        let f = fixture(SimulatedAuthorization::new(AuthorizationStatus::Denied), true);
        let err = f.gate.prepare(&RequestOptions::new()).await.unwrap_err();
        assert_eq!(err, LocationError::Denied);
        assert_eq!(f.settings.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_skip_permission_check() {
        let f = fixture(SimulatedAuthorization::new(AuthorizationStatus::Denied), true);
        let options = RequestOptions::new().skip_permission_check(true);
        f.gate.prepare(&options).await.unwrap();
        assert_eq!(f.auth.check_calls(), 0);
        assert_eq!(f.auth.request_calls(), 0);
    }

    #[tokio::test]
    async fn test_dont_open_settings() {
        let f = fixture(SimulatedAuthorization::granted(), false);
        let options = RequestOptions::new().dont_open_settings(true);
        let err = f.gate.prepare(&options).await.unwrap_err();
        assert_eq!(err, LocationError::ServiceDisabled);
        assert_eq!(f.settings.open_calls(), 0);
    }

    #[tokio::test]
    async fn test_settings_enable_location() {
        let f = fixture(SimulatedAuthorization::granted(), false);
        f.gate.prepare(&RequestOptions::new()).await.unwrap();
        assert_eq!(f.settings.open_calls(), 1);
        assert!(f.device.location_services_enabled().unwrap());
    }

    #[tokio::test]
    async fn test_settings_left_disabled() {
        let f = fixture(SimulatedAuthorization::granted(), false);
        f.settings.set_enable_on_open(false);
        let err = f.gate.prepare(&RequestOptions::new()).await.unwrap_err();
        assert_eq!(err, LocationError::ServiceDisabled);
    }

    #[tokio::test]
    async fn test_settings_unavailable() {
        let f = fixture(SimulatedAuthorization::granted(), false);
        f.settings.set_available(false);
        let err = f.gate.prepare(&RequestOptions::new()).await.unwrap_err();
        assert_eq!(err, LocationError::SettingsUnavailable);
    }

    #[tokio::test]
    async fn test_concurrent_prompts_serialized() {
        let f = fixture(SimulatedAuthorization::granted(), false);
        f.settings.set_return_immediately(false);

        let first = tokio::spawn({
            let gate = f.gate.clone();
            async move { gate.prepare(&RequestOptions::new()).await }
        });
        let second = tokio::spawn({
            let gate = f.gate.clone();
            async move { gate.prepare(&RequestOptions::new()).await }
        });

        while f.settings.open_calls() == 0 {
            tokio::task::yield_now().await;
        }
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(f.settings.open_calls(), 1);

        f.lifecycle.resumed();
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(f.settings.open_calls(), 1);
    }

    #[tokio::test]
    async fn test_authorize_scope() {
        let f = fixture(
            SimulatedAuthorization::new(AuthorizationStatus::NotDetermined)
                .answering(AuthorizationStatus::Always),
            true,
        );
        assert!(!f.gate.is_authorized(None).await);
        f.gate.authorize(false).await.unwrap();
        assert!(f.gate.is_authorized(Some(false)).await);
        assert!(!f.gate.is_authorized(Some(true)).await);
        f.gate.authorize(true).await.unwrap();
        assert!(f.gate.is_authorized(Some(true)).await);
    }
}
