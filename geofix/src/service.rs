//! The public location service.
//!
//! [`LocationService`] composes the registry, permission gate, coordinator
//! and status notifier over one platform:
//!
//! ```text
//!                    LocationService
//!        ┌──────────────┬─────┴───────┬────────────────┐
//!  RequestCoordinator  PermissionGate  StatusNotifier  distance
//!        │                  │               │
//!  ListenerRegistry ────────┴───────────────┘
//!        │
//!  PlatformLocationProvider
//! ```
//!
//! # Example
//!
//! ```ignore
//! let service = LocationService::builder(platform, authorization, settings)
//!     .clock(clock)
//!     .build();
//!
//! let fix = service.get_current_location(&RequestOptions::new()).await?;
//! let handle = service
//!     .watch_location(|fix| println!("{fix:?}"), |e| eprintln!("{e}"), &RequestOptions::new())
//!     .await?;
//! service.clear_watch(handle);
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::coordinator::RequestCoordinator;
use crate::error::{LocationError, LocationResult};
use crate::fix::{Fix, NativeFix};
use crate::gate::PermissionGate;
use crate::options::RequestOptions;
use crate::permission::{AppLifecycle, AuthorizationService, SettingsPrompt};
use crate::platform::{PlatformKind, PlatformLocationProvider};
use crate::registry::{ListenerRegistry, WatchHandle};
use crate::status::{StatusEvent, StatusNotifier, SubscriptionId};

/// Builder for [`LocationService`].
pub struct LocationServiceBuilder {
    platform: Arc<dyn PlatformLocationProvider>,
    authorization: Arc<dyn AuthorizationService>,
    settings: Arc<dyn SettingsPrompt>,
    lifecycle: Option<AppLifecycle>,
    clock: Option<Arc<dyn Clock>>,
}

impl LocationServiceBuilder {
    /// Use an existing lifecycle hub (default: a new one).
    pub fn lifecycle(mut self, lifecycle: AppLifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Use a specific clock (default: [`SystemClock`]).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> LocationService {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));
        let lifecycle = self.lifecycle.unwrap_or_default();

        let registry = ListenerRegistry::new(self.platform.clone(), clock.clone());
        let gate = Arc::new(PermissionGate::new(
            self.platform.clone(),
            self.authorization,
            self.settings,
            lifecycle.clone(),
        ));
        let coordinator = RequestCoordinator::new(registry, gate, clock);
        let status = StatusNotifier::new(self.platform.clone());

        debug!(platform = %self.platform.kind(), "Location service ready");
        LocationService {
            platform: self.platform,
            coordinator,
            status,
            lifecycle,
        }
    }
}

/// Location acquisition façade.
pub struct LocationService {
    platform: Arc<dyn PlatformLocationProvider>,
    coordinator: RequestCoordinator,
    status: StatusNotifier,
    lifecycle: AppLifecycle,
}

impl LocationService {
    pub fn builder(
        platform: Arc<dyn PlatformLocationProvider>,
        authorization: Arc<dyn AuthorizationService>,
        settings: Arc<dyn SettingsPrompt>,
    ) -> LocationServiceBuilder {
        LocationServiceBuilder {
            platform,
            authorization,
            settings,
            lifecycle: None,
            clock: None,
        }
    }

    /// Acquire a single fix. See [`RequestCoordinator::get_current_location`].
    pub async fn get_current_location(&self, options: &RequestOptions) -> LocationResult<Fix> {
        self.coordinator.get_current_location(options).await
    }

    /// Start a continuous watch. See [`RequestCoordinator::watch_location`].
    pub async fn watch_location(
        &self,
        on_fix: impl Fn(Fix) + Send + Sync + 'static,
        on_error: impl Fn(LocationError) + Send + Sync + 'static,
        options: &RequestOptions,
    ) -> LocationResult<WatchHandle> {
        self.coordinator
            .watch_location(on_fix, on_error, options)
            .await
    }

    /// Stop a watch; unknown handles are ignored.
    pub fn clear_watch(&self, handle: WatchHandle) {
        self.coordinator.clear_watch(handle)
    }

    /// The most recent cached fix, if any.
    pub fn last_known_location(&self) -> Option<Fix> {
        self.coordinator.registry().last_known()
    }

    /// Whether the location subsystem is enabled.
    pub fn is_enabled(&self) -> bool {
        self.platform.is_enabled()
    }

    /// Whether authorization is granted (`always` selects a scope).
    pub async fn is_authorized(&self, always: Option<bool>) -> bool {
        self.coordinator.gate().is_authorized(always).await
    }

    /// Open settings until location is enabled.
    pub async fn enable(&self) -> LocationResult<()> {
        self.coordinator.gate().enable().await
    }

    /// Request authorization.
    pub async fn authorize(&self, always: bool) -> LocationResult<()> {
        self.coordinator.gate().authorize(always).await
    }

    /// Geodesic distance in meters between two fixes.
    ///
    /// Uses each fix's native object when it has one.
    pub fn distance(&self, a: &Fix, b: &Fix) -> f64 {
        let a = self.native_of(a);
        let b = self.native_of(b);
        self.platform.distance(&a, &b)
    }

    /// Subscribe to subsystem status transitions.
    pub fn on_status_change(
        &self,
        callback: impl Fn(StatusEvent) + Send + Sync + 'static,
    ) -> LocationResult<SubscriptionId> {
        self.status.subscribe(callback)
    }

    /// Remove a status subscription. Returns `false` if it was unknown.
    pub fn off_status_change(&self, id: SubscriptionId) -> bool {
        self.status.unsubscribe(id)
    }

    pub fn has_gps(&self) -> bool {
        self.platform.has_gps()
    }

    pub fn is_gps_enabled(&self) -> bool {
        self.platform.is_gps_enabled()
    }

    pub fn platform_kind(&self) -> PlatformKind {
        self.platform.kind()
    }

    /// The lifecycle hub the host forwards resume/activity-result events to.
    pub fn lifecycle(&self) -> &AppLifecycle {
        &self.lifecycle
    }

    /// Number of live registrations.
    pub fn active_registrations(&self) -> usize {
        self.coordinator.registry().len()
    }

    fn native_of<'a>(&self, fix: &'a Fix) -> Cow<'a, NativeFix> {
        match fix.native.as_deref() {
            Some(native) => Cow::Borrowed(native),
            None => Cow::Owned(self.platform.native_from_fix(fix)),
        }
    }
}
