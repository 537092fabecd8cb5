//! Set-interval command - change a device's measurement interval.

use anyhow::{Context, Result, bail};
use tracing::warn;

use envsensor_core::{BleTransport, ConnectionConfig, MeasurementInterval, sync_device};

use crate::cli::SetIntervalArgs;
use crate::config::{Config, address_problem};

use super::open_store;

pub async fn cmd_set_interval(args: SetIntervalArgs, config: &Config, quiet: bool) -> Result<()> {
    if let Some(problem) = address_problem(&args.addr) {
        bail!("--addr: {}", problem);
    }
    let interval = MeasurementInterval::new(args.seconds).context("Invalid interval")?;

    let mut options = config.session_options().set_interval(interval);
    options.dry_run |= args.dry_run;
    if !options.dry_run {
        warn!(
            "{} will restart recording at page 0; unsynced pages are lost",
            args.addr
        );
    }

    let Some(target) = config.targets(Some(&args.addr), None).into_iter().next() else {
        bail!("No device selected");
    };
    if let Some(label) = target.label {
        options = options.label(label);
    }

    let mut store = open_store(config, options.dry_run)?;
    let transport = BleTransport::open(&target.address, ConnectionConfig::default())
        .await
        .with_context(|| format!("Failed to find {}", target.address))?;
    let report = sync_device(&transport, &mut store, &options)
        .await
        .with_context(|| format!("Failed to set the interval of {}", target.address))?;

    if !quiet {
        match report.interval_changed {
            Some(interval) => {
                println!("{}: measurement interval set to {interval}", report.address)
            }
            None => println!(
                "{}: dry run, measurement interval would be set to {}",
                report.address, interval
            ),
        }
    }
    Ok(())
}
