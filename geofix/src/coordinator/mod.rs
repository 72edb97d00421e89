//! Request coordination.
//!
//! The coordinator turns a caller's request into gate, registry and timer
//! operations:
//!
//! - one-shot requests ([`RequestCoordinator::get_current_location`]) settle
//!   exactly once, with the first acceptable fix or an error;
//! - watches ([`RequestCoordinator::watch_location`]) deliver every fix until
//!   cleared.
//!
//! # Example
//!
//! ```ignore
//! let coordinator = RequestCoordinator::new(registry, gate, clock);
//! let fix = coordinator
//!     .get_current_location(&RequestOptions::new().timeout(Duration::from_secs(10)))
//!     .await?;
//! ```

mod one_shot;
mod state;
mod watch;

pub use state::{RequestKind, RequestLifecycle, RequestState};

use std::sync::Arc;

use crate::clock::Clock;
use crate::gate::PermissionGate;
use crate::registry::ListenerRegistry;

/// Runs one-shot requests and watches over a registry.
pub struct RequestCoordinator {
    registry: ListenerRegistry,
    gate: Arc<PermissionGate>,
    clock: Arc<dyn Clock>,
}

impl RequestCoordinator {
    pub fn new(registry: ListenerRegistry, gate: Arc<PermissionGate>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            gate,
            clock,
        }
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &Arc<PermissionGate> {
        &self.gate
    }
}
