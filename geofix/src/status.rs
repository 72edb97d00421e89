//! Subsystem status change notifications.
//!
//! The notifier is lazy: the native status watch is registered when the
//! first subscriber arrives and removed when the last one leaves. Native
//! notifications are collapsed against the last published state so a
//! subscriber only sees actual transitions. Enablement and authorization
//! keep separate baselines, and both are re-read when the watch activates.
//!
//! ```text
//! platform ──► StatusTrigger ──► NotifierInner ──► subscribers
//!                 (weak)          (dedup per baseline)
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::LocationResult;
use crate::permission::AuthorizationStatus;
use crate::platform::PlatformLocationProvider;

/// A published status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    /// Whether location is now usable.
    pub enabled: bool,
    /// The authorization status, when the change came from authorization.
    pub authorization: Option<AuthorizationStatus>,
}

/// Callback for status transitions.
pub type StatusCallback = Arc<dyn Fn(StatusEvent) + Send + Sync>;

/// Identifies one status subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Identifies a native status watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusWatchId(pub u64);

struct Subscriptions {
    callbacks: BTreeMap<SubscriptionId, StatusCallback>,
    watch: Option<StatusWatchId>,
}

struct NotifierInner {
    platform: Arc<dyn PlatformLocationProvider>,
    state: Mutex<Subscriptions>,
    last_enabled: Mutex<Option<bool>>,
    last_authorization: Mutex<Option<AuthorizationStatus>>,
    next_id: AtomicU64,
}

impl NotifierInner {
    fn providers_changed(&self) {
        let enabled = match self.platform.query_enabled() {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!(error = %e, "Status query failed, keeping last known state");
                return;
            }
        };

        {
            let mut last = self.last_enabled.lock();
            if *last == Some(enabled) {
                trace!(enabled, "Status unchanged");
                return;
            }
            *last = Some(enabled);
        }

        self.emit(StatusEvent {
            enabled,
            authorization: None,
        });
    }

    fn authorization_changed(&self, status: AuthorizationStatus) {
        {
            let mut last = self.last_authorization.lock();
            if *last == Some(status) {
                trace!(status = ?status, "Authorization unchanged");
                return;
            }
            *last = Some(status);
        }

        self.emit(StatusEvent {
            enabled: status.is_authorized(),
            authorization: Some(status),
        });
    }

    /// Re-read the enablement baseline; authorization is unknown until the
    /// native watch reports it.
    fn rebaseline(&self) {
        let enabled = match self.platform.query_enabled() {
            Ok(enabled) => Some(enabled),
            Err(e) => {
                warn!(error = %e, "Status query failed on activation");
                None
            }
        };
        *self.last_enabled.lock() = enabled;
        *self.last_authorization.lock() = None;
    }

    fn emit(&self, event: StatusEvent) {
        let callbacks: Vec<StatusCallback> =
            self.state.lock().callbacks.values().cloned().collect();
        debug!(
            enabled = event.enabled,
            authorization = ?event.authorization,
            subscribers = callbacks.len(),
            "Status changed"
        );

        for callback in callbacks {
            callback(event);
        }
    }
}

/// Handle the platform uses to report native status notifications.
#[derive(Clone)]
pub struct StatusTrigger {
    inner: Weak<NotifierInner>,
}

impl fmt::Debug for StatusTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusTrigger")
            .field("attached", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl StatusTrigger {
    /// A trigger connected to nothing.
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    /// The set of enabled providers changed.
    pub fn providers_changed(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.providers_changed();
        }
    }

    /// The authorization status changed.
    pub fn authorization_changed(&self, status: AuthorizationStatus) {
        if let Some(inner) = self.inner.upgrade() {
            inner.authorization_changed(status);
        }
    }
}

/// Publishes subsystem status transitions to subscribers.
#[derive(Clone)]
pub struct StatusNotifier {
    inner: Arc<NotifierInner>,
}

impl StatusNotifier {
    pub fn new(platform: Arc<dyn PlatformLocationProvider>) -> Self {
        let initial = match platform.query_enabled() {
            Ok(enabled) => Some(enabled),
            Err(e) => {
                warn!(error = %e, "Initial status query failed");
                None
            }
        };
        Self {
            inner: Arc::new(NotifierInner {
                platform,
                state: Mutex::new(Subscriptions {
                    callbacks: BTreeMap::new(),
                    watch: None,
                }),
                last_enabled: Mutex::new(initial),
                last_authorization: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Add a subscriber, activating the native watch if it is the first.
    ///
    /// # Errors
    ///
    /// Fails if the native watch cannot be registered; the subscriber is
    /// not added in that case.
    pub fn subscribe(&self, callback: impl Fn(StatusEvent) + Send + Sync + 'static) -> LocationResult<SubscriptionId> {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mut state = self.inner.state.lock();

        if state.watch.is_none() {
            let trigger = StatusTrigger {
                inner: Arc::downgrade(&self.inner),
            };
            let watch = self.inner.platform.watch_status(trigger)?;
            self.inner.rebaseline();
            debug!(watch = watch.0, "Activated status watch");
            state.watch = Some(watch);
        }

        state.callbacks.insert(id, Arc::new(callback));
        Ok(id)
    }

    /// Remove a subscriber; the native watch is removed with the last one.
    ///
    /// Returns `false` for unknown subscriptions.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.inner.state.lock();
        if state.callbacks.remove(&id).is_none() {
            return false;
        }

        if state.callbacks.is_empty() {
            if let Some(watch) = state.watch.take() {
                self.inner.platform.unwatch_status(watch);
                debug!(watch = watch.0, "Deactivated status watch");
            }
        }
        true
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().callbacks.len()
    }

    /// Whether the native watch is registered.
    pub fn is_active(&self) -> bool {
        self.inner.state.lock().watch.is_some()
    }

    /// The last published or observed enabled state.
    pub fn last_enabled(&self) -> Option<bool> {
        *self.inner.last_enabled.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::platform::CriteriaPlatform;
    use crate::simulated::SimulatedDevice;

    fn notifier() -> (Arc<SimulatedDevice>, StatusNotifier) {
        let device = Arc::new(SimulatedDevice::new(Arc::new(ManualClock::new(0, 0))));
        device.set_enabled(false);
        let platform = Arc::new(CriteriaPlatform::new(device.clone()));
        (device, StatusNotifier::new(platform))
    }

    fn recorder() -> (Arc<Mutex<Vec<StatusEvent>>>, impl Fn(StatusEvent) + Send + Sync + 'static) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        (events, move |e| sink.lock().push(e))
    }

    #[test]
    fn test_lazy_activation() {
        let (device, notifier) = notifier();
        assert!(!notifier.is_active());
        assert_eq!(device.status_watcher_count(), 0);

        let a = notifier.subscribe(|_| {}).unwrap();
        let b = notifier.subscribe(|_| {}).unwrap();
        assert!(notifier.is_active());
        assert_eq!(device.status_watcher_count(), 1);

        assert!(notifier.unsubscribe(a));
        assert!(notifier.is_active());
        assert!(notifier.unsubscribe(b));
        assert!(!notifier.is_active());
        assert_eq!(device.status_watcher_count(), 0);
    }

    #[test]
    fn test_unknown_unsubscribe() {
        let (_device, notifier) = notifier();
        let id = notifier.subscribe(|_| {}).unwrap();
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
    }

    #[test]
    fn test_duplicate_notifications_suppressed() {
        let (device, notifier) = notifier();
        let (events, callback) = recorder();
        notifier.subscribe(callback).unwrap();

        device.set_enabled(true);
        device.set_enabled(true);

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(events[0].enabled);
        assert_eq!(events[0].authorization, None);
    }

    #[test]
    fn test_transitions_published() {
        let (device, notifier) = notifier();
        let (events, callback) = recorder();
        notifier.subscribe(callback).unwrap();

        device.set_enabled(true);
        device.set_enabled(false);
        device.set_enabled(true);

        let enabled: Vec<bool> = events.lock().iter().map(|e| e.enabled).collect();
        assert_eq!(enabled, vec![true, false, true]);
        assert_eq!(notifier.last_enabled(), Some(true));
    }

    #[test]
    fn test_no_events_after_unsubscribe() {
        let (device, notifier) = notifier();
        let (events, callback) = recorder();
        let id = notifier.subscribe(callback).unwrap();
        notifier.unsubscribe(id);

        device.set_enabled(true);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_changes_while_idle_rebaseline_on_subscribe() {
        let (device, notifier) = notifier();
        device.set_enabled(true);
        assert_eq!(notifier.last_enabled(), Some(false));

        let (events, callback) = recorder();
        notifier.subscribe(callback).unwrap();
        assert_eq!(notifier.last_enabled(), Some(true));

        device.set_enabled(false);
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert!(!events[0].enabled);
    }

    #[test]
    fn test_authorization_has_its_own_baseline() {
        let (device, notifier) = notifier();
        device.set_enabled(true);
        let (events, callback) = recorder();
        notifier.subscribe(callback).unwrap();

        let trigger = StatusTrigger {
            inner: Arc::downgrade(&notifier.inner),
        };
        trigger.authorization_changed(AuthorizationStatus::WhenInUse);
        trigger.authorization_changed(AuthorizationStatus::WhenInUse);
        trigger.authorization_changed(AuthorizationStatus::Always);

        let statuses: Vec<_> = events.lock().iter().map(|e| e.authorization).collect();
        assert_eq!(
            statuses,
            vec![Some(AuthorizationStatus::WhenInUse), Some(AuthorizationStatus::Always)]
        );
        assert_eq!(notifier.last_enabled(), Some(true));
    }

    #[test]
    fn test_detached_trigger_is_noop() {
        let trigger = StatusTrigger::detached();
        trigger.providers_changed();
        trigger.authorization_changed(AuthorizationStatus::Denied);
    }
}
