//! Example: incremental sync against a simulated sensor.
//!
//! Syncs a simulated device twice, with new pages logged in between, then
//! forwards everything to an in-memory sink. No Bluetooth adapter needed.
//!
//! Run with: `cargo run --example simulated_sync`

use envsensor_core::mock::{MemorySink, MemoryStore, MockTransport};
use envsensor_core::{
    ForwardOptions, RetryConfig, SessionOptions, SessionReport, forward_rows, sync_device,
};

fn print_report(report: &SessionReport) {
    println!(
        "  plan {:?}: {} pages, {} new rows, {} already stored",
        report.plan_reason, report.pages_read, report.rows.inserted, report.rows.duplicate
    );
    if let Some(cp) = report.checkpoint {
        println!("  checkpoint page {} row {}", cp.page, cp.row);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let device = MockTransport::builder().pages(40).latest_row(5).build();
    let mut store = MemoryStore::new();
    let options = SessionOptions::default()
        .connect_retry(RetryConfig::none())
        .planner(envsensor_core::PlannerConfig {
            initial_scan: envsensor_core::InitialScan::FromZero,
            ..Default::default()
        });

    println!("First sync:");
    print_report(&sync_device(&device, &mut store, &options).await?);

    device.advance(3, 7).await;
    println!("After three more pages:");
    print_report(&sync_device(&device, &mut store, &options).await?);

    let sink = MemorySink::new();
    let result = forward_rows(&mut store, &sink, ForwardOptions::default().batch_size(100)).await?;
    println!(
        "Forwarded {} points in {} batches",
        result.points, result.batches
    );

    Ok(())
}
