//! Native callback events and the sink backends deliver them through.
//!
//! Native location APIs report through delegate objects with many methods
//! or through listener interfaces. Backends translate those into the small
//! closed set of [`NativeEvent`] variants and push them into the
//! [`EventSink`] they were started with. The sink routes each event to the
//! registration it belongs to; once that registration is gone, events are
//! dropped.

use std::fmt;
use std::sync::Weak;

use crate::error::LocationError;
use crate::fix::{Fix, NativeFix};
use crate::permission::AuthorizationStatus;
use crate::registry::WatchHandle;

/// Event emitted by a native backend for one registration.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    /// A new fix was captured.
    FixReceived(NativeFix),
    /// The session failed.
    Failed(String),
    /// Authorization changed while the session was running.
    AuthorizationChanged(AuthorizationStatus),
    /// Deferred (batched) delivery finished, with an error message if any.
    DeferredUpdatesFinished(Option<String>),
    /// The platform paused updates.
    Paused,
}

/// Normalized event delivered to a registration's callback.
#[derive(Debug, Clone)]
pub enum ListenerEvent {
    Fix(Fix),
    Failed(LocationError),
    AuthorizationChanged(AuthorizationStatus),
    DeferredUpdatesFinished(Option<LocationError>),
    Paused,
}

/// Receiver side of an [`EventSink`].
pub(crate) trait EventDispatch: Send + Sync {
    fn dispatch(&self, handle: WatchHandle, event: NativeEvent);
    fn nmea(&self, handle: WatchHandle, sentence: &str, timestamp_ms: i64);
}

/// Handle a native backend uses to report events for one registration.
#[derive(Clone)]
pub struct EventSink {
    handle: WatchHandle,
    target: Option<Weak<dyn EventDispatch>>,
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("handle", &self.handle)
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl EventSink {
    pub(crate) fn new(handle: WatchHandle, target: Weak<dyn EventDispatch>) -> Self {
        Self {
            handle,
            target: Some(target),
        }
    }

    /// A sink that drops every event (for driving backends in isolation).
    pub fn detached(handle: WatchHandle) -> Self {
        Self {
            handle,
            target: None,
        }
    }

    /// The registration this sink reports for.
    pub fn handle(&self) -> WatchHandle {
        self.handle
    }

    /// Whether events still have somewhere to go.
    pub fn is_attached(&self) -> bool {
        self.target
            .as_ref()
            .map(|t| t.strong_count() > 0)
            .unwrap_or(false)
    }

    /// Report an event.
    pub fn emit(&self, event: NativeEvent) {
        if let Some(target) = self.target.as_ref().and_then(Weak::upgrade) {
            target.dispatch(self.handle, event);
        }
    }

    /// Report a fix.
    pub fn emit_fix(&self, fix: NativeFix) {
        self.emit(NativeEvent::FixReceived(fix));
    }

    /// Report a raw NMEA sentence from the secondary listener.
    pub fn nmea(&self, sentence: &str, timestamp_ms: i64) {
        if let Some(target) = self.target.as_ref().and_then(Weak::upgrade) {
            target.nmea(self.handle, sentence, timestamp_ms);
        }
    }
}
