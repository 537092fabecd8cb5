//! Configuration file handling.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use envsensor_core::util::{is_mac_address, normalize_address, same_device};
use envsensor_core::{
    DeviceTarget, HandshakeConfig, InfluxConfig, InitialScan, PlannerConfig, RetryConfig,
    SessionOptions,
};
use envsensor_types::ring::RING_SIZE;

/// `envsensor.toml` contents.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub devices: Vec<DeviceConfig>,
    pub sync: SyncConfig,
    pub influxdb: InfluxSection,
}

impl Config {
    /// Load the file at `path`, or the default location when `None`.
    ///
    /// A missing default file yields the default configuration; a missing
    /// explicit file is an error.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Check every section and report all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.storage.validate());
        errors.extend(self.sync.validate());
        errors.extend(self.influxdb.validate());

        let mut seen = HashSet::new();
        for (i, device) in self.devices.iter().enumerate() {
            let prefix = format!("devices[{}]", i);
            errors.extend(device.validate(&prefix));

            if !seen.insert(normalize_address(&device.address).to_lowercase()) {
                errors.push(ValidationError::new(
                    format!("{}.address", prefix),
                    format!("duplicate device address '{}'", device.address),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Devices to sync. An explicit address selects one device, picking up
    /// its configured label and scan range when it is listed.
    pub fn targets(&self, addr: Option<&str>, page_range: Option<(u16, u16)>) -> Vec<DeviceTarget> {
        match addr {
            Some(addr) => {
                let configured = self.devices.iter().find(|d| same_device(&d.address, addr));
                let mut target = configured
                    .map(DeviceConfig::target)
                    .unwrap_or_else(|| DeviceTarget::new(normalize_address(addr)));
                if page_range.is_some() {
                    target.page_range = page_range;
                }
                vec![target]
            }
            None => self.devices.iter().map(DeviceConfig::target).collect(),
        }
    }

    /// Session options derived from the `[sync]` section.
    pub fn session_options(&self) -> SessionOptions {
        let sync = &self.sync;
        let tolerance = Duration::from_secs(sync.time_drift_tolerance_secs);
        SessionOptions::default()
            .dry_run(sync.dry_run)
            .no_scan(sync.no_scan)
            .time_drift_tolerance(tolerance)
            .handshake(HandshakeConfig {
                poll_attempts: sync.poll_attempts,
                poll_interval: Duration::from_millis(sync.poll_interval_ms),
                ..HandshakeConfig::default()
            })
            .planner(PlannerConfig {
                clock_tolerance_secs: u32::try_from(sync.time_drift_tolerance_secs)
                    .unwrap_or(u32::MAX),
                initial_scan: sync.initial_scan,
            })
            .connect_retry(
                RetryConfig::for_connect().max_retries(sync.connect_attempts.saturating_sub(1)),
            )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. A leading `~` expands to the home directory.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: envsensor_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }
        errors
    }

    pub fn resolved_path(&self) -> PathBuf {
        expand_home(&self.path)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub address: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Inclusive page range read on every run instead of the planned one.
    #[serde(default)]
    pub scan_range: Option<[u16; 2]>,
}

impl DeviceConfig {
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(message) = address_problem(&self.address) {
            errors.push(ValidationError::new(format!("{}.address", prefix), message));
        }

        if let Some(label) = &self.label
            && label.trim().is_empty()
        {
            errors.push(ValidationError::new(
                format!("{}.label", prefix),
                "label cannot be empty (omit it instead)",
            ));
        }

        if let Some(range) = self.scan_range {
            for page in range {
                if page >= RING_SIZE {
                    errors.push(ValidationError::new(
                        format!("{}.scan_range", prefix),
                        format!("page {} outside 0..={}", page, RING_SIZE - 1),
                    ));
                }
            }
        }

        errors
    }

    fn target(&self) -> DeviceTarget {
        DeviceTarget {
            address: normalize_address(&self.address),
            label: self.label.clone(),
            page_range: self.scan_range.map(|[start, end]| (start, end)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub time_drift_tolerance_secs: u64,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    pub initial_scan: InitialScan,
    pub connect_attempts: u32,
    /// Read only; `--dry-run` also enables it.
    pub dry_run: bool,
    /// Stop after the identity and clock checks; `--no-scan` also enables it.
    pub no_scan: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            time_drift_tolerance_secs: 30,
            poll_attempts: 5,
            poll_interval_ms: 100,
            initial_scan: InitialScan::LatestPage,
            connect_attempts: 5,
            dry_run: false,
            no_scan: false,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.poll_attempts == 0 {
            errors.push(ValidationError::new(
                "sync.poll_attempts",
                "must be at least 1",
            ));
        }
        if self.connect_attempts == 0 {
            errors.push(ValidationError::new(
                "sync.connect_attempts",
                "must be at least 1",
            ));
        }
        errors
    }
}

/// `[influxdb]`: the sink connection plus the forwarding batch size.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InfluxSection {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub batch_size: usize,
}

impl Default for InfluxSection {
    fn default() -> Self {
        let connection = InfluxConfig::default();
        Self {
            host: connection.host,
            port: connection.port,
            username: connection.username,
            password: connection.password,
            database: connection.database,
            batch_size: envsensor_core::forward::DEFAULT_BATCH_SIZE,
        }
    }
}

impl InfluxSection {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.host.trim().is_empty() {
            errors.push(ValidationError::new("influxdb.host", "host cannot be empty"));
        }
        if self.database.trim().is_empty() {
            errors.push(ValidationError::new(
                "influxdb.database",
                "database cannot be empty",
            ));
        }
        if self.batch_size == 0 {
            errors.push(ValidationError::new(
                "influxdb.batch_size",
                "must be at least 1",
            ));
        }
        errors
    }

    pub fn connection(&self) -> InfluxConfig {
        InfluxConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}

/// Why `address` is unusable, if it is.
///
/// Accepts MAC addresses and the peripheral UUIDs macOS reports instead.
pub fn address_problem(address: &str) -> Option<String> {
    if address.trim().is_empty() {
        Some("device address cannot be empty".to_string())
    } else if is_mac_address(address) || uuid::Uuid::parse_str(address).is_ok() {
        None
    } else {
        Some(format!(
            "malformed address '{}': expected six hex octets like C1:2A:3B:4C:5D:6E",
            address
        ))
    }
}

/// Default config location: `<config dir>/envsensor/config.toml`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("envsensor")
        .join("config.toml")
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// One failed check, with the offending field path (`devices[0].address`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
