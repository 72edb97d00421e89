//! Simulated authorization service and settings screen.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::SimulatedDevice;
use crate::error::{LocationError, LocationResult};
use crate::permission::{AppLifecycle, AuthorizationService, AuthorizationStatus, BoxFuture, SettingsPrompt};

/// Authorization service with a fixed answer and call counters.
pub struct SimulatedAuthorization {
    status: Mutex<AuthorizationStatus>,
    answer: AuthorizationStatus,
    device: Option<Arc<SimulatedDevice>>,
    check_calls: AtomicUsize,
    request_calls: AtomicUsize,
}

impl SimulatedAuthorization {
    /// Starts at `status`; a request leaves it unchanged.
    pub fn new(status: AuthorizationStatus) -> Self {
        Self {
            status: Mutex::new(status),
            answer: status,
            device: None,
            check_calls: AtomicUsize::new(0),
            request_calls: AtomicUsize::new(0),
        }
    }

    /// Already authorized while in use.
    pub fn granted() -> Self {
        Self::new(AuthorizationStatus::WhenInUse)
    }

    /// The user answers a request with `answer`.
    pub fn answering(mut self, answer: AuthorizationStatus) -> Self {
        self.answer = answer;
        self
    }

    /// Report answered requests to the device's authorization watchers.
    pub fn with_device(mut self, device: Arc<SimulatedDevice>) -> Self {
        self.device = Some(device);
        self
    }

    pub fn status(&self) -> AuthorizationStatus {
        *self.status.lock()
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn request_calls(&self) -> usize {
        self.request_calls.load(Ordering::SeqCst)
    }
}

impl AuthorizationService for SimulatedAuthorization {
    fn check(&self) -> BoxFuture<'_, AuthorizationStatus> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        let status = self.status();
        Box::pin(async move { status })
    }

    fn request(&self, always: bool) -> BoxFuture<'_, AuthorizationStatus> {
        self.request_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            let granted = match self.answer {
                AuthorizationStatus::Always if !always => AuthorizationStatus::WhenInUse,
                answer => answer,
            };
            let changed = {
                let mut status = self.status.lock();
                let changed = *status != granted;
                *status = granted;
                changed
            };
            debug!(always, status = ?granted, "Simulated authorization answered");
            if changed {
                if let Some(device) = &self.device {
                    device.set_authorization(granted);
                }
            }
            granted
        })
    }
}

/// Settings screen that can switch the device on and report the return.
pub struct SimulatedSettings {
    device: Arc<SimulatedDevice>,
    lifecycle: AppLifecycle,
    available: AtomicBool,
    enable_on_open: AtomicBool,
    return_immediately: AtomicBool,
    open_calls: AtomicUsize,
}

impl SimulatedSettings {
    /// By default the user switches location on and returns immediately.
    pub fn new(device: Arc<SimulatedDevice>, lifecycle: AppLifecycle) -> Self {
        Self {
            device,
            lifecycle,
            available: AtomicBool::new(true),
            enable_on_open: AtomicBool::new(true),
            return_immediately: AtomicBool::new(true),
            open_calls: AtomicUsize::new(0),
        }
    }

    /// Whether the user switches location on while in settings.
    pub fn set_enable_on_open(&self, enable: bool) {
        self.enable_on_open.store(enable, Ordering::SeqCst);
    }

    /// Whether the user comes back without the test firing a lifecycle event.
    pub fn set_return_immediately(&self, immediately: bool) {
        self.return_immediately.store(immediately, Ordering::SeqCst);
    }

    /// Whether the settings screen can be opened at all.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }
}

impl SettingsPrompt for SimulatedSettings {
    fn open(&self, request_code: i32) -> LocationResult<()> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(LocationError::SettingsUnavailable);
        }

        if self.enable_on_open.load(Ordering::SeqCst) {
            self.device.set_enabled(true);
        }
        if self.return_immediately.load(Ordering::SeqCst) {
            self.lifecycle.activity_result(request_code);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test]
    async fn test_request_answer_and_counts() {
        let auth = SimulatedAuthorization::new(AuthorizationStatus::NotDetermined)
            .answering(AuthorizationStatus::Always);

        assert_eq!(auth.check().await, AuthorizationStatus::NotDetermined);
        assert_eq!(auth.request(false).await, AuthorizationStatus::WhenInUse);
        assert_eq!(auth.request(true).await, AuthorizationStatus::Always);
        assert_eq!(auth.check_calls(), 1);
        assert_eq!(auth.request_calls(), 2);
    }

    #[test]
    fn test_settings_unavailable() {
        let device = Arc::new(SimulatedDevice::new(Arc::new(ManualClock::new(0, 0))));
        let settings = SimulatedSettings::new(device, AppLifecycle::new());
        settings.set_available(false);
        assert_eq!(settings.open(1), Err(LocationError::SettingsUnavailable));
        assert_eq!(settings.open_calls(), 1);
    }
}
