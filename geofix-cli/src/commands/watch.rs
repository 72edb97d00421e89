//! `geofix watch`: print a stream of fixes.

use std::time::Duration;

use clap::Args;
use geofix::config::ConfigFile;
use geofix::Fix;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::common::{print_fix, DeviceArgs, Simulation};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub device: DeviceArgs,

    /// Number of fixes to print before stopping
    #[arg(long, default_value_t = 5)]
    pub count: usize,

    /// Minimum distance between fixes in meters
    #[arg(long)]
    pub update_distance_m: Option<f64>,

    /// Also report mean-sea-level altitude from NMEA (criteria model)
    #[arg(long)]
    pub nmea_altitude: bool,
}

pub async fn run(args: WatchArgs, config: &ConfigFile) -> Result<(), CliError> {
    if args.count == 0 {
        return Err(CliError::Usage("--count must be at least 1".to_string()));
    }

    let simulation = Simulation::new(&args.device);
    let mut options = config
        .default_options()
        .nmea_altitude(args.nmea_altitude);
    options.minimum_update_time = Some(Duration::from_millis(args.device.interval_ms));
    if let Some(m) = args.update_distance_m {
        options.update_distance = Some(m);
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Fix>();
    let handle = simulation
        .service
        .watch_location(
            move |fix| {
                let _ = tx.send(fix);
            },
            |e| warn!(error = %e, "Watch error"),
            &options,
        )
        .await?;
    info!(handle = %handle, count = args.count, "Watching");

    let feeder = simulation.feed(&args.device);
    let mut first: Option<Fix> = None;
    for _ in 0..args.count {
        let Some(fix) = rx.recv().await else {
            break;
        };
        if let Some(origin) = &first {
            info!(meters = simulation.service.distance(origin, &fix), "Distance from first fix");
        } else {
            first = Some(fix.clone());
        }
        print_fix(&fix);
    }

    simulation.service.clear_watch(handle);
    feeder.abort();
    Ok(())
}
