//! `geofix current`: acquire a single fix.

use std::time::Duration;

use clap::Args;
use geofix::config::ConfigFile;
use tracing::info;

use super::common::{print_fix, DeviceArgs, Simulation};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct CurrentArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Deadline in milliseconds; 0 reads the cached fix only
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Reject fixes older than this many milliseconds
    #[arg(long)]
    pub maximum_age_ms: Option<u64>,

    /// Seed the device with a cached fix this many milliseconds old
    #[arg(long)]
    pub seed_age_ms: Option<i64>,

    /// Fail instead of opening settings when location is off
    #[arg(long)]
    pub dont_open_settings: bool,
}

pub async fn run(args: CurrentArgs, config: &ConfigFile) -> Result<(), CliError> {
    let simulation = Simulation::new(&args.device);
    if let Some(age) = args.seed_age_ms {
        let cached = simulation
            .device
            .fix_aged(args.device.latitude, args.device.longitude, age);
        simulation.device.set_last_known("gps", cached);
    }

    let mut options = config.default_options();
    if let Some(ms) = args.timeout_ms {
        options.timeout = Some(Duration::from_millis(ms));
    }
    if let Some(ms) = args.maximum_age_ms {
        options.maximum_age = Some(Duration::from_millis(ms));
    }
    options.dont_open_settings |= args.dont_open_settings;

    let feeder = simulation.feed(&args.device);
    let result = simulation.service.get_current_location(&options).await;
    feeder.abort();

    let fix = result?;
    info!(age_ms = fix.age, "Location acquired");
    print_fix(&fix);
    Ok(())
}
