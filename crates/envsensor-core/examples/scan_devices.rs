//! Example: scanning for EnvSensor devices.
//!
//! Run with: `cargo run --example scan_devices`

use std::time::Duration;

use envsensor_core::scan::{ScanOptions, scan_for_devices};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Scanning for EnvSensor devices...");
    println!();

    let options = ScanOptions::default().duration(Duration::from_secs(10));
    let devices = scan_for_devices(options).await?;

    if devices.is_empty() {
        println!("No EnvSensor devices found.");
        println!();
        println!("Make sure:");
        println!("  - The sensor has a charged battery");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The device is within range");
        return Ok(());
    }

    println!("Found {} device(s):", devices.len());
    println!();
    for device in &devices {
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());
        println!("  {}", device.name.as_deref().unwrap_or("Unknown"));
        println!("    Identifier: {}", device.identifier);
        println!("    RSSI: {}", rssi);
        println!();
    }

    Ok(())
}
