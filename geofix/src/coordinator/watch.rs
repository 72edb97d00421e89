//! Continuous location watches.

use std::sync::Arc;

use tracing::{debug, info};

use super::{RequestCoordinator, RequestKind, RequestLifecycle, RequestState};
use crate::error::{LocationError, LocationResult};
use crate::fix::Fix;
use crate::options::RequestOptions;
use crate::platform::ListenerEvent;
use crate::registry::WatchHandle;

impl RequestCoordinator {
    /// Start delivering every fix to `on_fix` until the watch is cleared.
    ///
    /// Native failures while the watch runs go to `on_error`; the watch
    /// stays registered. A failure to start is delivered to `on_error` and
    /// returned.
    ///
    /// # Errors
    ///
    /// Gate failures are returned without calling `on_error`.
    pub async fn watch_location(
        &self,
        on_fix: impl Fn(Fix) + Send + Sync + 'static,
        on_error: impl Fn(LocationError) + Send + Sync + 'static,
        options: &RequestOptions,
    ) -> LocationResult<WatchHandle> {
        let mut lifecycle = RequestLifecycle::new(RequestKind::Watch);
        lifecycle.advance(RequestState::Gating);
        if let Err(e) = self.gate.prepare(options).await {
            lifecycle.gate_failed(&e);
            return Err(e);
        }

        let on_error = Arc::new(on_error);
        let hooks = options.hooks.clone();
        let errors = on_error.clone();
        let handle = self.registry.create(
            move |event| match event {
                ListenerEvent::Fix(fix) => on_fix(fix),
                ListenerEvent::Failed(e) => errors(e),
                ListenerEvent::DeferredUpdatesFinished(e) => {
                    if let Some(callback) = &hooks.on_deferred {
                        callback(e);
                    }
                }
                ListenerEvent::Paused => {
                    if let Some(callback) = &hooks.on_paused {
                        callback();
                    }
                }
                ListenerEvent::AuthorizationChanged(status) => {
                    debug!(status = ?status, "Authorization changed during watch");
                }
            },
            options,
        );
        lifecycle.attach(handle);

        if let Err(e) = self.registry.start(handle, options) {
            lifecycle.advance(RequestState::StartFailed);
            on_error(e.clone());
            return Err(e);
        }
        lifecycle.advance(RequestState::Monitoring);
        info!(handle = %handle, "Watch started");
        Ok(handle)
    }

    /// Stop a watch. Unknown or already cleared handles are ignored.
    pub fn clear_watch(&self, handle: WatchHandle) {
        if self.registry.stop(handle) {
            info!(handle = %handle, "Watch cleared");
        }
    }
}
