//! Provider/criteria platform model.
//!
//! The native layer exposes named providers (`gps`, `network`, `passive`,
//! ...). A request either names a provider or hands the native layer an
//! accuracy criterion to choose one. An optional secondary NMEA listener
//! supplies mean-sea-level altitude.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::{
    EventSink, LastKnownCandidate, NativeSession, PlatformKind, PlatformLocationProvider,
    SessionId,
};
use crate::error::LocationResult;
use crate::fix::NativeFix;
use crate::options::{RequestOptions, ACCURACY_HIGH_M};
use crate::status::{StatusTrigger, StatusWatchId};

/// Providers that never count towards "location is enabled".
const IGNORED_PROVIDERS: [&str; 2] = ["passive", "local_database"];

/// The fine-grained provider.
const FINE_PROVIDER: &str = "gps";

/// Accuracy class of a selection criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriteriaAccuracy {
    Fine,
    Coarse,
}

/// Native provider selection criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criteria {
    pub accuracy: CriteriaAccuracy,
}

impl Criteria {
    /// Criterion for a request: fine when the desired accuracy is high.
    pub fn for_options(options: &RequestOptions) -> Self {
        let accuracy = if options.effective_desired_accuracy() <= ACCURACY_HIGH_M {
            CriteriaAccuracy::Fine
        } else {
            CriteriaAccuracy::Coarse
        };
        Self { accuracy }
    }

    pub fn coarse() -> Self {
        Self {
            accuracy: CriteriaAccuracy::Coarse,
        }
    }
}

/// How a session picks its native provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSelector {
    /// A provider named by the caller.
    Named(String),
    /// Let the native layer choose by criterion.
    Criteria(Criteria),
}

/// Native operations of a provider/criteria location manager.
pub trait ProviderBackend: Send + Sync {
    /// Request periodic updates for a session.
    fn request_updates(
        &self,
        id: SessionId,
        selector: &ProviderSelector,
        minimum_time: Duration,
        minimum_distance_m: f64,
        sink: EventSink,
    ) -> LocationResult<()>;

    /// Remove a session's update listener.
    fn remove_updates(&self, id: SessionId);

    /// Attach a raw NMEA listener for a session.
    fn add_nmea_listener(&self, id: SessionId, sink: EventSink) -> LocationResult<()>;

    /// Detach a session's NMEA listener.
    fn remove_nmea_listener(&self, id: SessionId);

    /// Provider names, optionally filtered by criterion and enablement.
    fn providers(&self, criteria: Option<&Criteria>, enabled_only: bool) -> LocationResult<Vec<String>>;

    /// A provider's cached fix.
    fn last_known_location(&self, provider: &str) -> Option<NativeFix>;

    fn is_provider_enabled(&self, provider: &str) -> bool;

    /// Whether the device declares satellite positioning hardware.
    fn has_gps_feature(&self) -> bool;

    /// Register for "providers changed" broadcasts.
    fn register_providers_changed(&self, trigger: StatusTrigger) -> LocationResult<StatusWatchId>;

    fn unregister_providers_changed(&self, id: StatusWatchId);
}

/// [`PlatformLocationProvider`] over a [`ProviderBackend`].
pub struct CriteriaPlatform<B: ProviderBackend> {
    backend: Arc<B>,
}

impl<B: ProviderBackend> CriteriaPlatform<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    fn selector(options: &RequestOptions) -> ProviderSelector {
        match options.provider {
            Some(provider) => ProviderSelector::Named(provider.as_str().to_string()),
            None => ProviderSelector::Criteria(Criteria::for_options(options)),
        }
    }
}

impl<B: ProviderBackend> PlatformLocationProvider for CriteriaPlatform<B> {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Criteria
    }

    fn start(&self, sink: EventSink, options: &RequestOptions) -> LocationResult<NativeSession> {
        let id = SessionId(sink.handle().0);
        let selector = Self::selector(options);
        let minimum_time = options.effective_minimum_update_time();
        let minimum_distance = options.effective_update_distance();

        self.backend
            .request_updates(id, &selector, minimum_time, minimum_distance, sink.clone())?;

        let mut session = NativeSession {
            id,
            nmea_listener: false,
        };
        if options.nmea_altitude {
            if let Err(e) = self.backend.add_nmea_listener(id, sink) {
                self.backend.remove_updates(id);
                return Err(e);
            }
            session.nmea_listener = true;
        }

        debug!(
            session = %id,
            selector = ?selector,
            minimum_time_ms = minimum_time.as_millis() as u64,
            minimum_distance_m = minimum_distance,
            nmea = session.nmea_listener,
            "Requested provider updates"
        );
        Ok(session)
    }

    fn stop(&self, session: &NativeSession) {
        self.backend.remove_updates(session.id);
        if session.nmea_listener {
            self.backend.remove_nmea_listener(session.id);
        }
        debug!(session = %session.id, "Removed provider updates");
    }

    fn last_known_candidates(&self) -> Vec<LastKnownCandidate> {
        let providers = match self.backend.providers(Some(&Criteria::coarse()), false) {
            Ok(providers) => providers,
            Err(e) => {
                warn!(error = %e, "Failed to list providers for last known location");
                return Vec::new();
            }
        };

        providers
            .iter()
            .filter_map(|provider| {
                self.backend
                    .last_known_location(provider)
                    .map(|fix| LastKnownCandidate {
                        fix,
                        matches_criteria: provider == FINE_PROVIDER,
                    })
            })
            .collect()
    }

    fn query_enabled(&self) -> LocationResult<bool> {
        let enabled = self.backend.providers(None, true)?;
        Ok(enabled
            .iter()
            .any(|p| !IGNORED_PROVIDERS.contains(&p.as_str())))
    }

    fn has_gps(&self) -> bool {
        self.backend.has_gps_feature()
    }

    fn is_gps_enabled(&self) -> bool {
        self.backend.is_provider_enabled(FINE_PROVIDER)
    }

    fn vertical_accuracy_fallback(&self) -> bool {
        true
    }

    fn watch_status(&self, trigger: StatusTrigger) -> LocationResult<StatusWatchId> {
        self.backend.register_providers_changed(trigger)
    }

    fn unwatch_status(&self, id: StatusWatchId) {
        self.backend.unregister_providers_changed(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ProviderKind;

    #[test]
    fn test_criteria_from_accuracy() {
        let fine = Criteria::for_options(&RequestOptions::new());
        assert_eq!(fine.accuracy, CriteriaAccuracy::Fine);

        let coarse = Criteria::for_options(&RequestOptions::new().desired_accuracy(100.0));
        assert_eq!(coarse.accuracy, CriteriaAccuracy::Coarse);
    }

    #[test]
    fn test_named_provider_overrides_criteria() {
        let options = RequestOptions::new()
            .desired_accuracy(1000.0)
            .provider(ProviderKind::Gps);
        assert_eq!(
            CriteriaPlatform::<crate::simulated::SimulatedDevice>::selector(&options),
            ProviderSelector::Named("gps".into())
        );
    }
}
