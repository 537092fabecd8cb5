//! Device discovery.

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use envsensor_types::uuid::{SENSOR_SERVICE, SUPPORTED_DEVICE_NAME};

use crate::error::{Error, Result};
use crate::util::{create_identifier, format_peripheral_id, same_device};

/// A device seen during a scan.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub name: Option<String>,
    pub id: PeripheralId,
    /// BLE address (all zeros on macOS, use `identifier`).
    pub address: String,
    /// Address, or peripheral ID where the address is hidden.
    pub identifier: String,
    pub rssi: Option<i16>,
    pub is_envsensor: bool,
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub duration: Duration,
    /// Only return devices that look like EnvSensors.
    pub envsensor_only: bool,
    /// Scan attempts when looking for one device.
    pub attempts: u32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            envsensor_only: true,
            attempts: 3,
        }
    }
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn all_devices(mut self) -> Self {
        self.envsensor_only = false;
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }
}

/// First available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or_else(|| Error::device_not_found("no Bluetooth adapter available"))
}

/// Scan for sensors in range. An empty list is not an error.
pub async fn scan_for_devices(options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
    let adapter = get_adapter().await?;
    info!("Starting BLE scan for {} seconds...", options.duration.as_secs());

    adapter.start_scan(ScanFilter::default()).await?;
    sleep(options.duration).await;
    adapter.stop_scan().await?;

    let mut discovered = Vec::new();
    for peripheral in adapter.peripherals().await? {
        match describe(&peripheral).await {
            Ok(Some(device)) if device.is_envsensor || !options.envsensor_only => {
                debug!("Found device: {:?} ({})", device.name, device.identifier);
                discovered.push(device);
            }
            Ok(_) => {}
            Err(e) => debug!("Error processing peripheral: {}", e),
        }
    }

    info!("Scan complete. Found {} device(s)", discovered.len());
    Ok(discovered)
}

async fn describe(peripheral: &Peripheral) -> Result<Option<DiscoveredDevice>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };
    let id = peripheral.id();
    let address = properties.address.to_string();
    Ok(Some(DiscoveredDevice {
        name: properties.local_name.clone(),
        identifier: create_identifier(&address, &id),
        is_envsensor: is_envsensor(&properties),
        rssi: properties.rssi,
        id,
        address,
    }))
}

fn is_envsensor(properties: &PeripheralProperties) -> bool {
    properties.services.contains(&SENSOR_SERVICE)
        || properties.local_name.as_deref() == Some(SUPPORTED_DEVICE_NAME)
}

/// Find one device by address or peripheral ID.
///
/// Peripherals already known to the adapter are checked first; otherwise
/// the adapter scans up to `options.attempts` times with growing windows,
/// since advertisements are easily missed.
pub async fn find_device(identifier: &str, options: &ScanOptions) -> Result<(Adapter, Peripheral)> {
    let adapter = get_adapter().await?;
    info!("Looking for device: {}", identifier);

    if let Some(peripheral) = find_known(&adapter, identifier).await? {
        debug!("Found device without scanning");
        return Ok((adapter, peripheral));
    }

    let attempts = options.attempts.max(1);
    for attempt in 1..=attempts {
        let window = options.duration * attempt;
        info!("Scan attempt {}/{} ({}s)...", attempt, attempts, window.as_secs());

        adapter.start_scan(ScanFilter::default()).await?;
        sleep(window).await;
        adapter.stop_scan().await?;

        if let Some(peripheral) = find_known(&adapter, identifier).await? {
            info!("Found device on attempt {}", attempt);
            return Ok((adapter, peripheral));
        }
        if attempt < attempts {
            warn!("Device not found, retrying...");
        }
    }

    Err(Error::device_not_found(identifier))
}

async fn find_known(adapter: &Adapter, identifier: &str) -> Result<Option<Peripheral>> {
    for peripheral in adapter.peripherals().await? {
        let Ok(Some(props)) = peripheral.properties().await else {
            continue;
        };
        let address = props.address.to_string();
        if address != "00:00:00:00:00:00" && same_device(&address, identifier) {
            debug!("Matched by address: {}", address);
            return Ok(Some(peripheral));
        }
        let peripheral_id = format_peripheral_id(&peripheral.id());
        if peripheral_id.eq_ignore_ascii_case(identifier) {
            debug!("Matched by peripheral ID: {}", peripheral_id);
            return Ok(Some(peripheral));
        }
    }
    Ok(None)
}
