//! Forward command - push stored rows to InfluxDB.

use anyhow::{Context, Result};
use tracing::info;

use envsensor_core::{ForwardOptions, InfluxSink, forward_rows};

use crate::cli::ForwardArgs;
use crate::config::Config;

use super::open_store;

pub async fn cmd_forward(args: ForwardArgs, config: &Config, quiet: bool) -> Result<()> {
    let mut store = open_store(config, false)?;
    let sink = InfluxSink::new(config.influxdb.connection())
        .context("Invalid [influxdb] configuration")?;

    if !args.no_create {
        sink.ensure_database()
            .await
            .with_context(|| format!("Failed to create database on {}", sink.base_url()))?;
    }

    let batch_size = args
        .batch_size
        .map(|n| n as usize)
        .unwrap_or(config.influxdb.batch_size);
    info!(
        "Forwarding to {} (database {}, batch size {})",
        sink.base_url(),
        config.influxdb.database,
        batch_size
    );

    let options = ForwardOptions::default().batch_size(batch_size);
    let result = forward_rows(&mut store, &sink, options)
        .await
        .context("Forwarding stopped; rows up to the last accepted batch stay forwarded")?;

    if !quiet {
        match result.checkpoint {
            Some(cp) => println!(
                "Forwarded {} points in {} batches (up to row {})",
                result.points, result.batches, cp.last_row_id
            ),
            None => println!("Nothing new to forward"),
        }
    }
    Ok(())
}
