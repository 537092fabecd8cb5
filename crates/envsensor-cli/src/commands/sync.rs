//! Sync command - read new log pages into the database.

use anyhow::{Result, bail};
use tracing::{info, warn};

use envsensor_core::{BleTransport, ConnectionConfig, RunSummary, SessionReport, sync_devices};

use crate::cli::SyncArgs;
use crate::config::{Config, address_problem};
use crate::style;

use super::open_store;

pub async fn cmd_sync(args: SyncArgs, config: &Config, quiet: bool) -> Result<()> {
    if let Some(addr) = &args.addr
        && let Some(problem) = address_problem(addr)
    {
        bail!("--addr: {}", problem);
    }

    let targets = config.targets(args.addr.as_deref(), args.page_range());
    if targets.is_empty() {
        bail!("No devices to sync: add [[devices]] to the configuration or pass --addr");
    }

    let mut options = config.session_options();
    options.dry_run |= args.dry_run;
    options.no_scan |= args.no_scan;
    if options.dry_run {
        info!("---DRY RUN--- nothing is written to devices or the database");
    }
    if options.no_scan {
        info!("---NO SCAN--- pages are not read");
    }

    let mut store = open_store(config, options.dry_run)?;

    let pb = style::sync_progress_bar(quiet);
    let pb_for_callback = pb.clone();
    let options =
        options.with_progress(move |progress| style::show_progress(&pb_for_callback, &progress));

    let connection = ConnectionConfig::default();
    let summary = sync_devices(&targets, &mut store, &options, |target| {
        let address = target.address.clone();
        let connection = connection.clone();
        async move { BleTransport::open(&address, connection).await }
    })
    .await;
    pb.finish_and_clear();

    if !quiet {
        print_summary(&summary);
    }

    if !summary.is_success() {
        bail!(
            "{} of {} devices failed",
            summary.failures.len(),
            targets.len()
        );
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.reports {
        print_report(report);
    }
    for failure in &summary.failures {
        println!("{}: FAILED: {}", failure.address, failure.error);
    }
}

fn print_report(report: &SessionReport) {
    println!("{} ({})", report.address, report.name);
    println!(
        "  clock offset: {}s{}",
        report.clock_offset,
        if report.clock_offset != 0 {
            " (applied to row timestamps)"
        } else {
            ""
        }
    );
    if let Some(start) = report.recording_start {
        println!("  recording since: {start}");
    }
    if report.error_status.has_error() {
        println!("  error status: {}", report.error_status);
    }
    if let Some(interval) = report.interval_changed {
        println!("  measurement interval set to {}", interval);
    }
    if let Some(reason) = report.plan_reason {
        println!("  plan: {:?}", reason);
    }
    if let Some(loss) = report.data_loss {
        warn!(
            "{}: {} of {} unread pages were overwritten on the device",
            report.address, loss.lost_pages, loss.unread_pages
        );
        println!(
            "  DATA LOSS: {} pages overwritten before they were read",
            loss.lost_pages
        );
    }
    println!(
        "  pages read: {}, rows: {} new, {} already stored, {} conflicting",
        report.pages_read, report.rows.inserted, report.rows.duplicate, report.rows.conflict
    );
    if let Some(cp) = report.checkpoint {
        println!("  checkpoint: page {} row {}", cp.page, cp.row);
    }
}

