//! Shared harness for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use geofix::clock::{Clock, ManualClock};
use geofix::simulated::{SimulatedAuthorization, SimulatedDevice, SimulatedSettings};
use geofix::{AppLifecycle, LocationService, PlatformKind};

/// Wall clock at the start of every test (epoch ms).
pub const NOW: i64 = 1_700_000_000_000;

/// Time since boot at the start of every test.
pub const SINCE_BOOT: i64 = 7_200_000;

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub device: Arc<SimulatedDevice>,
    pub auth: Arc<SimulatedAuthorization>,
    pub settings: Arc<SimulatedSettings>,
    pub lifecycle: AppLifecycle,
    pub service: Arc<LocationService>,
}

impl Harness {
    pub fn new(kind: PlatformKind) -> Self {
        Self::build(kind, SimulatedAuthorization::granted(), true)
    }

    pub fn build(kind: PlatformKind, auth: SimulatedAuthorization, enabled: bool) -> Self {
        let clock = Arc::new(ManualClock::new(NOW, SINCE_BOOT));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let device = Arc::new(SimulatedDevice::new(dyn_clock.clone()));
        device.set_enabled(enabled);

        let lifecycle = AppLifecycle::new();
        let auth = Arc::new(auth.with_device(device.clone()));
        let settings = Arc::new(SimulatedSettings::new(device.clone(), lifecycle.clone()));
        let service = LocationService::builder(device.platform(kind), auth.clone(), settings.clone())
            .lifecycle(lifecycle.clone())
            .clock(dyn_clock)
            .build();

        Self {
            clock,
            device,
            auth,
            settings,
            lifecycle,
            service: Arc::new(service),
        }
    }

    /// Yield until the device has `count` running sessions.
    pub async fn wait_for_sessions(&self, count: usize) {
        while self.device.session_count() != count {
            tokio::task::yield_now().await;
        }
    }

    /// Let spawned tasks process what was delivered.
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }
}
