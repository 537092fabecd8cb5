//! BLE transport to a real sensor.
//!
//! [`BleTransport`] wraps a btleplug peripheral. Opening it locates the
//! device; [`Transport::connect`] connects and discovers services, caching
//! characteristics for lookup. Every GATT operation runs under a timeout so
//! a dropped link fails instead of hanging.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::scan::{ScanOptions, find_device};
use crate::traits::Transport;
use crate::util::{create_identifier, format_peripheral_id};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(45);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// BLE timeouts.
///
/// ```no_run
/// use std::time::Duration;
/// use envsensor_core::device::ConnectionConfig;
///
/// let config = ConnectionConfig::default().read_timeout(Duration::from_secs(15));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub connection_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub discovery_timeout: Duration,
    pub scan: ScanOptions,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            scan: ScanOptions::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    #[must_use]
    pub fn scan(mut self, scan: ScanOptions) -> Self {
        self.scan = scan;
        self
    }
}

/// A located sensor, connected on demand.
///
/// Does not implement `Clone`: it owns the link. Share it with `Arc`.
pub struct BleTransport {
    /// Kept alive for the lifetime of the peripheral.
    #[allow(dead_code)]
    adapter: Adapter,
    peripheral: Peripheral,
    address: String,
    characteristics: RwLock<HashMap<Uuid, Characteristic>>,
    config: ConnectionConfig,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("address", &self.address)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BleTransport {
    /// Locate a sensor by address (or peripheral ID on macOS).
    #[tracing::instrument(level = "info", skip_all, fields(identifier = %identifier))]
    pub async fn open(identifier: &str, config: ConnectionConfig) -> Result<Self> {
        let (adapter, peripheral) = find_device(identifier, &config.scan).await?;
        Ok(Self::from_peripheral(adapter, peripheral, config).await)
    }

    /// Wrap an already discovered peripheral.
    pub async fn from_peripheral(
        adapter: Adapter,
        peripheral: Peripheral,
        config: ConnectionConfig,
    ) -> Self {
        let address = match peripheral.properties().await {
            Ok(Some(p)) => create_identifier(&p.address.to_string(), &peripheral.id()),
            _ => format_peripheral_id(&peripheral.id()),
        };
        Self {
            adapter,
            peripheral,
            address,
            characteristics: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn discover(&self) -> Result<()> {
        timeout(self.config.discovery_timeout, self.peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", self.config.discovery_timeout))??;

        let mut cache = self.characteristics.write().await;
        cache.clear();
        for service in self.peripheral.services() {
            debug!("  Service: {}", service.uuid);
            for characteristic in service.characteristics {
                cache.insert(characteristic.uuid, characteristic);
            }
        }
        debug!("Cached {} characteristics", cache.len());
        Ok(())
    }

    async fn find_characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        let cache = self.characteristics.read().await;
        if cache.is_empty() {
            return Err(Error::NotConnected);
        }
        cache.get(&uuid).cloned().ok_or_else(|| {
            Error::characteristic_not_found(uuid.to_string(), self.peripheral.services().len())
        })
    }
}

#[async_trait]
impl Transport for BleTransport {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<()> {
        if self.is_connected().await && !self.characteristics.read().await.is_empty() {
            return Ok(());
        }
        info!("Connecting to {}...", self.address);
        timeout(self.config.connection_timeout, self.peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to device", self.config.connection_timeout))??;
        self.discover().await?;
        info!("Connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from {}...", self.address);
        self.characteristics.write().await.clear();
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        let target = self.find_characteristic(characteristic).await?;
        let data = timeout(self.config.read_timeout, self.peripheral.read(&target))
            .await
            .map_err(|_| {
                Error::timeout(
                    format!("read characteristic {}", characteristic),
                    self.config.read_timeout,
                )
            })??;
        Ok(data)
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let target = self.find_characteristic(characteristic).await?;
        timeout(
            self.config.write_timeout,
            self.peripheral.write(&target, data, WriteType::WithResponse),
        )
        .await
        .map_err(|_| {
            Error::timeout(
                format!("write characteristic {}", characteristic),
                self.config.write_timeout,
            )
        })??;
        Ok(())
    }
}
