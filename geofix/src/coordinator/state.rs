//! Request lifecycle states.

use std::fmt;

use tracing::debug;

use crate::error::LocationError;
use crate::registry::WatchHandle;

/// Kind of request being coordinated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    OneShot,
    Watch,
}

/// Lifecycle state of one request.
///
/// ```text
/// Created ──► Gating ──► Monitoring ──► Resolved | TimedOut | Cleared
///   │            │            │
///   │            │            └──► StartFailed
///   │            └──► Denied | ServiceDisabled
///   └──► Resolved | Rejected          (cache-only one-shot)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Created,
    Gating,
    Denied,
    ServiceDisabled,
    Monitoring,
    Resolved,
    Rejected,
    TimedOut,
    StartFailed,
    Cleared,
}

impl RequestState {
    /// Whether the request has settled.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Created | Self::Gating | Self::Monitoring)
    }

    /// Whether `next` may follow this state.
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Created, Gating)
                | (Created, Resolved)
                | (Created, Rejected)
                | (Gating, Denied)
                | (Gating, ServiceDisabled)
                | (Gating, Monitoring)
                | (Gating, StartFailed)
                | (Monitoring, Resolved)
                | (Monitoring, TimedOut)
                | (Monitoring, Cleared)
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Gating => "gating",
            Self::Denied => "denied",
            Self::ServiceDisabled => "service-disabled",
            Self::Monitoring => "monitoring",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
            Self::TimedOut => "timed-out",
            Self::StartFailed => "start-failed",
            Self::Cleared => "cleared",
        };
        f.write_str(name)
    }
}

/// Tracks and logs one request's progress through [`RequestState`].
#[derive(Debug)]
pub struct RequestLifecycle {
    kind: RequestKind,
    state: RequestState,
    handle: Option<WatchHandle>,
}

impl RequestLifecycle {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            state: RequestState::Created,
            handle: None,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn handle(&self) -> Option<WatchHandle> {
        self.handle
    }

    /// Record the registration allocated for this request.
    pub fn attach(&mut self, handle: WatchHandle) {
        self.handle = Some(handle);
    }

    /// Move to `next`.
    pub fn advance(&mut self, next: RequestState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid request transition {} -> {}",
            self.state,
            next
        );
        debug!(
            kind = ?self.kind,
            handle = ?self.handle.map(|h| h.0),
            from = %self.state,
            to = %next,
            "Request state"
        );
        self.state = next;
    }

    /// Move to the terminal state matching a gate failure.
    pub fn gate_failed(&mut self, error: &LocationError) {
        let next = match error {
            LocationError::Denied => RequestState::Denied,
            _ => RequestState::ServiceDisabled,
        };
        self.advance(next);
    }
}
