//! Common types and utilities shared across CLI commands.

use std::sync::Arc;
use std::time::Duration;

use clap::{Args, ValueEnum};
use geofix::clock::{Clock, SystemClock};
use geofix::simulated::{SimulatedAuthorization, SimulatedDevice, SimulatedSettings};
use geofix::{AppLifecycle, Fix, LocationService, PlatformKind};
use tokio::task::JoinHandle;
use tracing::debug;

/// Native location model to simulate.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Model {
    /// Named providers selected by accuracy criteria
    Criteria,
    /// One manager per request with delegate callbacks
    Delegate,
}

impl From<Model> for PlatformKind {
    fn from(model: Model) -> Self {
        match model {
            Model::Criteria => PlatformKind::Criteria,
            Model::Delegate => PlatformKind::Delegate,
        }
    }
}

/// Arguments describing the simulated device.
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Native location model
    #[arg(long, value_enum, default_value = "criteria")]
    pub model: Model,

    /// Starting latitude of the simulated receiver
    #[arg(long, default_value_t = 53.5511, allow_hyphen_values = true)]
    pub latitude: f64,

    /// Starting longitude of the simulated receiver
    #[arg(long, default_value_t = 9.9937, allow_hyphen_values = true)]
    pub longitude: f64,

    /// Milliseconds between simulated fixes
    #[arg(long, default_value_t = 1_000)]
    pub interval_ms: u64,

    /// Start with location switched off (the settings prompt switches it on)
    #[arg(long)]
    pub disabled: bool,
}

/// A service wired to a simulated device.
pub struct Simulation {
    pub device: Arc<SimulatedDevice>,
    pub service: Arc<LocationService>,
}

impl Simulation {
    pub fn new(args: &DeviceArgs) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let device = Arc::new(SimulatedDevice::new(clock.clone()));
        device.set_enabled(!args.disabled);

        let lifecycle = AppLifecycle::new();
        let settings = SimulatedSettings::new(device.clone(), lifecycle.clone());
        let service = LocationService::builder(
            device.platform(args.model.into()),
            Arc::new(SimulatedAuthorization::granted()),
            Arc::new(settings),
        )
        .lifecycle(lifecycle)
        .clock(clock)
        .build();

        Self {
            device,
            service: Arc::new(service),
        }
    }

    /// Deliver fixes along a straight north-east track until aborted.
    pub fn feed(&self, args: &DeviceArgs) -> JoinHandle<()> {
        let device = self.device.clone();
        let (mut latitude, mut longitude) = (args.latitude, args.longitude);
        let interval = Duration::from_millis(args.interval_ms.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let fix = device.fix_now(latitude, longitude).with_accuracy(4.0, None);
                let receivers = device.deliver(fix);
                debug!(latitude, longitude, receivers, "Simulated fix");
                latitude += 0.0001;
                longitude += 0.0001;
            }
        })
    }
}

/// Print a fix as one JSON line.
pub fn print_fix(fix: &Fix) {
    match serde_json::to_string(fix) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("Failed to serialize fix: {}", e),
    }
}
