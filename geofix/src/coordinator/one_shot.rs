//! One-shot location requests.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{RequestCoordinator, RequestKind, RequestLifecycle, RequestState};
use crate::error::{LocationError, LocationResult};
use crate::fix::Fix;
use crate::options::RequestOptions;
use crate::platform::ListenerEvent;
use crate::registry::{ListenerRegistry, WatchHandle};

/// Stops a registration when the request future finishes or is dropped.
struct RegistrationGuard<'a> {
    registry: &'a ListenerRegistry,
    handle: WatchHandle,
}

impl Drop for RegistrationGuard<'_> {
    fn drop(&mut self) {
        self.registry.stop(self.handle);
    }
}

impl RequestCoordinator {
    /// Acquire a single fix.
    ///
    /// A zero timeout answers from the cached fix only. Otherwise the gate
    /// runs, native monitoring starts, and the first fix no older than
    /// `maximum_age` settles the request. Older fixes are ignored. If no
    /// acceptable fix arrives before the timeout, monitoring stops and the
    /// request fails with [`LocationError::Timeout`].
    ///
    /// Dropping the returned future stops monitoring.
    pub async fn get_current_location(&self, options: &RequestOptions) -> LocationResult<Fix> {
        let mut lifecycle = RequestLifecycle::new(RequestKind::OneShot);

        if options.is_cache_only() {
            let result = self.cached_location(options);
            lifecycle.advance(match result {
                Ok(_) => RequestState::Resolved,
                Err(_) => RequestState::Rejected,
            });
            return result;
        }

        lifecycle.advance(RequestState::Gating);
        if let Err(e) = self.gate.prepare(options).await {
            lifecycle.gate_failed(&e);
            return Err(e);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = self.registry.create(
            move |event| {
                // The receiver is gone once the request settled.
                let _ = tx.send(event);
            },
            options,
        );
        lifecycle.attach(handle);
        let _guard = RegistrationGuard {
            registry: &self.registry,
            handle,
        };

        if let Err(e) = self.registry.start(handle, options) {
            lifecycle.advance(RequestState::StartFailed);
            return Err(e);
        }
        lifecycle.advance(RequestState::Monitoring);

        let timeout = options.effective_timeout();
        let maximum_age_ms = options.maximum_age_ms();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                event = rx.recv() => match event {
                    Some(ListenerEvent::Fix(fix)) => {
                        if let Some(max) = maximum_age_ms {
                            let now = self.clock.now_millis();
                            if !fix.is_fresh(now, max) {
                                debug!(
                                    handle = %handle,
                                    age_ms = fix.age_at(now),
                                    maximum_age_ms = max,
                                    "Ignoring stale fix"
                                );
                                continue;
                            }
                        }
                        self.registry.stop(handle);
                        lifecycle.advance(RequestState::Resolved);
                        return Ok(fix);
                    }
                    Some(ListenerEvent::Failed(e)) => {
                        warn!(handle = %handle, error = %e, "Native failure while waiting for a fix");
                    }
                    Some(_) => {}
                    None => {
                        lifecycle.advance(RequestState::Cleared);
                        return Err(LocationError::Cancelled);
                    }
                },

                _ = &mut deadline => {
                    self.registry.stop(handle);
                    lifecycle.advance(RequestState::TimedOut);
                    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    info!(handle = %handle, timeout_ms, "Location request timed out");
                    return Err(LocationError::Timeout { timeout_ms });
                }
            }
        }
    }

    /// Answer from the cached fix without starting monitoring.
    ///
    /// # Errors
    ///
    /// `NoLastKnownLocation` if nothing is cached, `StaleLocation` if the
    /// cached fix is older than `maximum_age`.
    pub fn cached_location(&self, options: &RequestOptions) -> LocationResult<Fix> {
        let fix = self
            .registry
            .last_known()
            .ok_or(LocationError::NoLastKnownLocation)?;

        if let Some(max) = options.maximum_age_ms() {
            let now = self.clock.now_millis();
            if !fix.is_fresh(now, max) {
                return Err(LocationError::StaleLocation {
                    age_ms: fix.age_at(now),
                    maximum_age_ms: max,
                });
            }
        }
        Ok(fix)
    }
}
