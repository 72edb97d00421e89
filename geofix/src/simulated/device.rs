//! A simulated location device implementing both native backends.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::error::{LocationError, LocationResult};
use crate::fix::NativeFix;
use crate::permission::AuthorizationStatus;
use crate::platform::{
    CriteriaAccuracy, CriteriaPlatform, Criteria, DelegatePlatform, EventSink, ManagerBackend,
    ManagerConfig, NativeEvent, PlatformKind, PlatformLocationProvider, ProviderBackend,
    ProviderSelector, SessionId,
};
use crate::status::{StatusTrigger, StatusWatchId};

const GPS: &str = "gps";
const NETWORK: &str = "network";
const PASSIVE: &str = "passive";

struct ProviderState {
    enabled: bool,
    last_known: Option<NativeFix>,
}

enum SessionKind {
    Provider {
        selector: ProviderSelector,
    },
    Manager {
        config: ManagerConfig,
        updating: bool,
        deferred: Option<(f64, Duration)>,
        location: Option<NativeFix>,
    },
}

struct Session {
    sink: EventSink,
    kind: SessionKind,
}

impl Session {
    fn accepts(&self, provider: &str) -> bool {
        match &self.kind {
            SessionKind::Provider {
                selector: ProviderSelector::Named(name),
            } => name == provider,
            SessionKind::Provider {
                selector: ProviderSelector::Criteria(criteria),
            } => criteria.accuracy == CriteriaAccuracy::Coarse || provider == GPS,
            SessionKind::Manager { updating, .. } => *updating,
        }
    }
}

struct DeviceState {
    providers: BTreeMap<String, ProviderState>,
    has_gps: bool,
    sessions: BTreeMap<SessionId, Session>,
    nmea: BTreeMap<SessionId, EventSink>,
    provider_watchers: BTreeMap<StatusWatchId, StatusTrigger>,
    authorization_watchers: BTreeMap<StatusWatchId, StatusTrigger>,
    next_watch_id: u64,
    fail_next_start: Option<String>,
    fail_status_query: bool,
    fresh_cached: Option<NativeFix>,
    start_count: usize,
}

impl DeviceState {
    fn take_start_failure(&mut self) -> LocationResult<()> {
        match self.fail_next_start.take() {
            Some(reason) => Err(LocationError::NativeStartFailure(reason)),
            None => Ok(()),
        }
    }

    fn any_enabled(&self) -> bool {
        self.providers
            .iter()
            .any(|(name, p)| p.enabled && name != PASSIVE)
    }

    fn allocate_watch(&mut self) -> StatusWatchId {
        self.next_watch_id += 1;
        StatusWatchId(self.next_watch_id)
    }
}

/// An in-process location device.
///
/// Tests and the command line drive it directly (`deliver`, `set_enabled`,
/// `emit_nmea`, ...) while the library sees it through
/// [`CriteriaPlatform`] or [`DelegatePlatform`]. Events are always
/// emitted after the device's own lock is released, so callbacks may call
/// back into the device.
pub struct SimulatedDevice {
    clock: Arc<dyn Clock>,
    state: Mutex<DeviceState>,
}

impl SimulatedDevice {
    /// A device with `gps`, `network` and `passive` providers, all enabled.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let providers = [GPS, NETWORK, PASSIVE]
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    ProviderState {
                        enabled: true,
                        last_known: None,
                    },
                )
            })
            .collect();

        Self {
            clock,
            state: Mutex::new(DeviceState {
                providers,
                has_gps: true,
                sessions: BTreeMap::new(),
                nmea: BTreeMap::new(),
                provider_watchers: BTreeMap::new(),
                authorization_watchers: BTreeMap::new(),
                next_watch_id: 0,
                fail_next_start: None,
                fail_status_query: false,
                fresh_cached: None,
                start_count: 0,
            }),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The device seen through the given native model.
    pub fn platform(self: &Arc<Self>, kind: PlatformKind) -> Arc<dyn PlatformLocationProvider> {
        match kind {
            PlatformKind::Criteria => Arc::new(CriteriaPlatform::new(self.clone())),
            PlatformKind::Delegate => Arc::new(DelegatePlatform::new(self.clone())),
        }
    }

    /// A `gps` fix stamped with the device clock.
    pub fn fix_now(&self, latitude: f64, longitude: f64) -> NativeFix {
        NativeFix::new(latitude, longitude)
            .with_wall_time(self.clock.now_millis())
            .with_elapsed_realtime_millis(self.clock.since_boot_millis())
            .with_provider(GPS)
    }

    /// A `gps` fix captured `age_ms` milliseconds ago.
    pub fn fix_aged(&self, latitude: f64, longitude: f64, age_ms: i64) -> NativeFix {
        NativeFix::new(latitude, longitude)
            .with_wall_time(self.clock.now_millis() - age_ms)
            .with_elapsed_realtime_millis(self.clock.since_boot_millis() - age_ms)
            .with_provider(GPS)
    }

    /// Deliver a fix to every session that would receive it.
    ///
    /// Also updates the provider's and managers' cached location. Returns
    /// the number of sessions the fix was delivered to.
    pub fn deliver(&self, fix: NativeFix) -> usize {
        let provider = fix.provider.clone().unwrap_or_else(|| GPS.to_string());
        let sinks: Vec<EventSink> = {
            let mut state = self.state.lock();
            if let Some(p) = state.providers.get_mut(&provider) {
                p.last_known = Some(fix.clone());
            }
            state.fresh_cached = Some(fix.clone());

            let mut sinks = Vec::new();
            for session in state.sessions.values_mut() {
                if !session.accepts(&provider) {
                    continue;
                }
                if let SessionKind::Manager { location, .. } = &mut session.kind {
                    *location = Some(fix.clone());
                }
                sinks.push(session.sink.clone());
            }
            sinks
        };

        trace!(provider = %provider, sessions = sinks.len(), "Delivering simulated fix");
        for sink in &sinks {
            sink.emit_fix(fix.clone());
        }
        sinks.len()
    }

    /// Feed an NMEA sentence to every attached NMEA listener.
    pub fn emit_nmea(&self, sentence: &str) {
        let sinks: Vec<EventSink> = self.state.lock().nmea.values().cloned().collect();
        let now = self.clock.now_millis();
        for sink in sinks {
            sink.nmea(sentence, now);
        }
    }

    /// Report a native failure on every session.
    pub fn fail_sessions(&self, reason: &str) {
        self.emit_all(|| NativeEvent::Failed(reason.to_string()));
    }

    /// Pause every manager session.
    pub fn pause(&self) {
        self.emit_managers(|| NativeEvent::Paused);
    }

    /// Finish deferred delivery on every manager session.
    pub fn finish_deferred(&self, error: Option<&str>) {
        self.emit_managers(|| NativeEvent::DeferredUpdatesFinished(error.map(str::to_string)));
    }

    /// Switch the `gps` and `network` providers on or off.
    pub fn set_enabled(&self, enabled: bool) {
        let watchers: Vec<StatusTrigger> = {
            let mut state = self.state.lock();
            for name in [GPS, NETWORK] {
                if let Some(p) = state.providers.get_mut(name) {
                    p.enabled = enabled;
                }
            }
            state.provider_watchers.values().cloned().collect()
        };
        debug!(enabled, "Simulated location switched");
        for trigger in watchers {
            trigger.providers_changed();
        }
    }

    /// Switch one provider on or off.
    pub fn set_provider_enabled(&self, provider: &str, enabled: bool) {
        let watchers: Vec<StatusTrigger> = {
            let mut state = self.state.lock();
            state
                .providers
                .entry(provider.to_string())
                .or_insert(ProviderState {
                    enabled,
                    last_known: None,
                })
                .enabled = enabled;
            state.provider_watchers.values().cloned().collect()
        };
        for trigger in watchers {
            trigger.providers_changed();
        }
    }

    /// Report an authorization change to authorization watchers.
    pub fn set_authorization(&self, status: AuthorizationStatus) {
        let watchers: Vec<StatusTrigger> = self
            .state
            .lock()
            .authorization_watchers
            .values()
            .cloned()
            .collect();
        for trigger in watchers {
            trigger.authorization_changed(status);
        }
    }

    pub fn set_has_gps(&self, has_gps: bool) {
        self.state.lock().has_gps = has_gps;
    }

    /// Seed a provider's cached fix.
    pub fn set_last_known(&self, provider: &str, fix: NativeFix) {
        let mut state = self.state.lock();
        state
            .providers
            .entry(provider.to_string())
            .or_insert(ProviderState {
                enabled: false,
                last_known: None,
            })
            .last_known = Some(fix.clone());
        state.fresh_cached = Some(fix);
    }

    /// Make the next session start fail.
    pub fn fail_next_start(&self, reason: &str) {
        self.state.lock().fail_next_start = Some(reason.to_string());
    }

    /// Make status queries fail.
    pub fn fail_status_query(&self, fail: bool) {
        self.state.lock().fail_status_query = fail;
    }

    /// Number of running sessions.
    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn nmea_listener_count(&self) -> usize {
        self.state.lock().nmea.len()
    }

    /// Number of active status watches of either kind.
    pub fn status_watcher_count(&self) -> usize {
        let state = self.state.lock();
        state.provider_watchers.len() + state.authorization_watchers.len()
    }

    /// Number of sessions ever started successfully.
    pub fn start_count(&self) -> usize {
        self.state.lock().start_count
    }

    /// Selectors of running provider sessions.
    pub fn selectors(&self) -> Vec<ProviderSelector> {
        self.state
            .lock()
            .sessions
            .values()
            .filter_map(|s| match &s.kind {
                SessionKind::Provider { selector } => Some(selector.clone()),
                SessionKind::Manager { .. } => None,
            })
            .collect()
    }

    /// Configurations of running manager sessions.
    pub fn manager_configs(&self) -> Vec<ManagerConfig> {
        self.state
            .lock()
            .sessions
            .values()
            .filter_map(|s| match &s.kind {
                SessionKind::Manager { config, .. } => Some(config.clone()),
                SessionKind::Provider { .. } => None,
            })
            .collect()
    }

    /// Deferred thresholds of running manager sessions.
    pub fn deferred_requests(&self) -> Vec<(f64, Duration)> {
        self.state
            .lock()
            .sessions
            .values()
            .filter_map(|s| match &s.kind {
                SessionKind::Manager { deferred, .. } => *deferred,
                SessionKind::Provider { .. } => None,
            })
            .collect()
    }

    fn emit_all(&self, event: impl Fn() -> NativeEvent) {
        let sinks: Vec<EventSink> = self
            .state
            .lock()
            .sessions
            .values()
            .map(|s| s.sink.clone())
            .collect();
        for sink in sinks {
            sink.emit(event());
        }
    }

    fn emit_managers(&self, event: impl Fn() -> NativeEvent) {
        let sinks: Vec<EventSink> = self
            .state
            .lock()
            .sessions
            .values()
            .filter(|s| matches!(s.kind, SessionKind::Manager { .. }))
            .map(|s| s.sink.clone())
            .collect();
        for sink in sinks {
            sink.emit(event());
        }
    }
}

impl ProviderBackend for SimulatedDevice {
    fn request_updates(
        &self,
        id: SessionId,
        selector: &ProviderSelector,
        _minimum_time: Duration,
        _minimum_distance_m: f64,
        sink: EventSink,
    ) -> LocationResult<()> {
        let mut state = self.state.lock();
        state.take_start_failure()?;
        if let ProviderSelector::Named(name) = selector {
            if !state.providers.contains_key(name) {
                return Err(LocationError::NativeStartFailure(format!(
                    "provider \"{}\" doesn't exist",
                    name
                )));
            }
        }

        state.sessions.insert(
            id,
            Session {
                sink,
                kind: SessionKind::Provider {
                    selector: selector.clone(),
                },
            },
        );
        state.start_count += 1;
        Ok(())
    }

    fn remove_updates(&self, id: SessionId) {
        self.state.lock().sessions.remove(&id);
    }

    fn add_nmea_listener(&self, id: SessionId, sink: EventSink) -> LocationResult<()> {
        self.state.lock().nmea.insert(id, sink);
        Ok(())
    }

    fn remove_nmea_listener(&self, id: SessionId) {
        self.state.lock().nmea.remove(&id);
    }

    fn providers(&self, criteria: Option<&Criteria>, enabled_only: bool) -> LocationResult<Vec<String>> {
        let state = self.state.lock();
        if state.fail_status_query {
            return Err(LocationError::Native("provider query failed".to_string()));
        }
        Ok(state
            .providers
            .iter()
            .filter(|(_, p)| !enabled_only || p.enabled)
            .filter(|(name, _)| match criteria {
                Some(c) if c.accuracy == CriteriaAccuracy::Fine => name.as_str() == GPS,
                _ => true,
            })
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn last_known_location(&self, provider: &str) -> Option<NativeFix> {
        self.state
            .lock()
            .providers
            .get(provider)
            .and_then(|p| p.last_known.clone())
    }

    fn is_provider_enabled(&self, provider: &str) -> bool {
        self.state
            .lock()
            .providers
            .get(provider)
            .map(|p| p.enabled)
            .unwrap_or(false)
    }

    fn has_gps_feature(&self) -> bool {
        self.state.lock().has_gps
    }

    fn register_providers_changed(&self, trigger: StatusTrigger) -> LocationResult<StatusWatchId> {
        let mut state = self.state.lock();
        let id = state.allocate_watch();
        state.provider_watchers.insert(id, trigger);
        Ok(id)
    }

    fn unregister_providers_changed(&self, id: StatusWatchId) {
        self.state.lock().provider_watchers.remove(&id);
    }
}

impl ManagerBackend for SimulatedDevice {
    fn create_manager(&self, id: SessionId, config: &ManagerConfig, delegate: EventSink) -> LocationResult<()> {
        let mut state = self.state.lock();
        state.take_start_failure()?;
        state.sessions.insert(
            id,
            Session {
                sink: delegate,
                kind: SessionKind::Manager {
                    config: config.clone(),
                    updating: false,
                    deferred: None,
                    location: None,
                },
            },
        );
        Ok(())
    }

    fn start_updating(&self, id: SessionId) -> LocationResult<()> {
        let mut state = self.state.lock();
        match state.sessions.get_mut(&id).map(|s| &mut s.kind) {
            Some(SessionKind::Manager { updating, .. }) => *updating = true,
            _ => {
                return Err(LocationError::NativeStartFailure(format!(
                    "no manager for {}",
                    id
                )))
            }
        }
        state.start_count += 1;
        Ok(())
    }

    fn allow_deferred_updates(&self, id: SessionId, traveled_m: f64, timeout: Duration) -> LocationResult<()> {
        let mut state = self.state.lock();
        if let Some(SessionKind::Manager { deferred, .. }) = state.sessions.get_mut(&id).map(|s| &mut s.kind) {
            *deferred = Some((traveled_m, timeout));
        }
        Ok(())
    }

    fn stop_updating(&self, id: SessionId) {
        let mut state = self.state.lock();
        if let Some(SessionKind::Manager { updating, .. }) = state.sessions.get_mut(&id).map(|s| &mut s.kind) {
            *updating = false;
        }
    }

    fn release_manager(&self, id: SessionId) {
        self.state.lock().sessions.remove(&id);
    }

    fn live_managers(&self) -> Vec<SessionId> {
        self.state
            .lock()
            .sessions
            .iter()
            .filter(|(_, s)| matches!(s.kind, SessionKind::Manager { .. }))
            .map(|(id, _)| *id)
            .collect()
    }

    fn cached_location(&self, id: SessionId) -> Option<NativeFix> {
        match self.state.lock().sessions.get(&id).map(|s| &s.kind) {
            Some(SessionKind::Manager { location, .. }) => location.clone(),
            _ => None,
        }
    }

    fn fresh_cached_location(&self) -> Option<NativeFix> {
        self.state.lock().fresh_cached.clone()
    }

    fn location_services_enabled(&self) -> LocationResult<bool> {
        let state = self.state.lock();
        if state.fail_status_query {
            return Err(LocationError::Native("location services query failed".to_string()));
        }
        Ok(state.any_enabled())
    }

    fn watch_authorization(&self, trigger: StatusTrigger) -> LocationResult<StatusWatchId> {
        let mut state = self.state.lock();
        let id = state.allocate_watch();
        state.authorization_watchers.insert(id, trigger);
        Ok(id)
    }

    fn unwatch_authorization(&self, id: StatusWatchId) {
        self.state.lock().authorization_watchers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::registry::WatchHandle;

    fn device() -> SimulatedDevice {
        SimulatedDevice::new(Arc::new(ManualClock::new(1_000_000, 50_000)))
    }

    #[test]
    fn test_provider_listing() {
        let device = device();
        device.set_provider_enabled(GPS, false);

        let all = device.providers(None, false).unwrap();
        assert_eq!(all.len(), 3);
        let enabled = device.providers(None, true).unwrap();
        assert_eq!(enabled, vec![NETWORK.to_string(), PASSIVE.to_string()]);
        let fine = device
            .providers(
                Some(&Criteria {
                    accuracy: CriteriaAccuracy::Fine,
                }),
                false,
            )
            .unwrap();
        assert_eq!(fine, vec![GPS.to_string()]);
    }

    #[test]
    fn test_fail_next_start_is_single_use() {
        let device = device();
        device.fail_next_start("busy");
        let selector = ProviderSelector::Criteria(Criteria::coarse());
        let sink = EventSink::detached(WatchHandle(1));

        let err = device
            .request_updates(SessionId(1), &selector, Duration::ZERO, 0.0, sink.clone())
            .unwrap_err();
        assert_eq!(err, LocationError::NativeStartFailure("busy".into()));
        assert!(device
            .request_updates(SessionId(1), &selector, Duration::ZERO, 0.0, sink)
            .is_ok());
        assert_eq!(device.session_count(), 1);
    }

    #[test]
    fn test_unknown_named_provider() {
        let device = device();
        let selector = ProviderSelector::Named("fused".into());
        let result = device.request_updates(
            SessionId(1),
            &selector,
            Duration::ZERO,
            0.0,
            EventSink::detached(WatchHandle(1)),
        );
        assert!(matches!(result, Err(LocationError::NativeStartFailure(_))));
    }

    #[test]
    fn test_named_session_only_receives_its_provider() {
        let device = device();
        device
            .request_updates(
                SessionId(1),
                &ProviderSelector::Named(NETWORK.into()),
                Duration::ZERO,
                0.0,
                EventSink::detached(WatchHandle(1)),
            )
            .unwrap();

        assert_eq!(device.deliver(device.fix_now(1.0, 2.0)), 0);
        assert_eq!(device.deliver(device.fix_now(1.0, 2.0).with_provider(NETWORK)), 1);
    }

    #[test]
    fn test_manager_lifecycle() {
        let device = device();
        let config = ManagerConfig::for_options(&Default::default());
        device
            .create_manager(SessionId(4), &config, EventSink::detached(WatchHandle(4)))
            .unwrap();
        assert_eq!(device.deliver(device.fix_now(1.0, 2.0)), 0);

        device.start_updating(SessionId(4)).unwrap();
        assert_eq!(device.deliver(device.fix_now(3.0, 4.0)), 1);
        assert_eq!(device.live_managers(), vec![SessionId(4)]);
        assert_eq!(device.cached_location(SessionId(4)).unwrap().latitude, 3.0);

        device.stop_updating(SessionId(4));
        device.release_manager(SessionId(4));
        assert!(device.live_managers().is_empty());
        assert_eq!(device.fresh_cached_location().unwrap().latitude, 3.0);
    }

    #[test]
    fn test_enabled_ignores_passive() {
        let device = device();
        device.set_enabled(false);
        assert!(!device.location_services_enabled().unwrap());
        device.fail_status_query(true);
        assert!(device.location_services_enabled().is_err());
    }
}
