//! Bluetooth UUIDs for EnvSensor devices.
//!
//! Every vendor characteristic shares the base
//! `0C4Cxxxx-7700-46F4-AA96-D5E974E32A54`, where `xxxx` is a 16-bit short id.
//! The owning service uses the short id with its low nibble cleared.

use uuid::{Uuid, uuid};

/// Vendor prefix occupying the high 16 bits of every vendor UUID.
pub const VENDOR_PREFIX: u32 = 0x0C4C_0000;

const BASE_D2: u16 = 0x7700;
const BASE_D3: u16 = 0x46F4;
const BASE_D4: [u8; 8] = [0xAA, 0x96, 0xD5, 0xE9, 0x74, 0xE3, 0x2A, 0x54];

/// Build the full 128-bit UUID for a vendor short id.
#[must_use]
pub const fn from_short_id(short: u16) -> Uuid {
    Uuid::from_fields(VENDOR_PREFIX | short as u32, BASE_D2, BASE_D3, &BASE_D4)
}

/// Build the UUID of the service that owns a vendor short id.
#[must_use]
pub const fn service_for(short: u16) -> Uuid {
    from_short_id(short & 0xFFF0)
}

// --- Sensor service (0x3000) ---

/// Sensor service UUID.
pub const SENSOR_SERVICE: Uuid = uuid!("0c4c3000-7700-46f4-aa96-d5e974e32a54");

/// Most recent measurement, same layout as a log row.
pub const LATEST_DATA: Uuid = uuid!("0c4c3001-7700-46f4-aa96-d5e974e32a54");

/// Current ring write position and page start time.
pub const LATEST_PAGE: Uuid = uuid!("0c4c3002-7700-46f4-aa96-d5e974e32a54");

/// Page request (write).
pub const REQUEST_PAGE: Uuid = uuid!("0c4c3003-7700-46f4-aa96-d5e974e32a54");

/// Page request readiness flag (poll).
pub const RESPONSE_FLAG: Uuid = uuid!("0c4c3004-7700-46f4-aa96-d5e974e32a54");

/// One log row per read, newest first.
pub const RESPONSE_DATA: Uuid = uuid!("0c4c3005-7700-46f4-aa96-d5e974e32a54");

// --- Setting service (0x3010) ---

/// Setting service UUID.
pub const SETTING_SERVICE: Uuid = uuid!("0c4c3010-7700-46f4-aa96-d5e974e32a54");

/// Measurement interval in seconds.
pub const MEASUREMENT_INTERVAL: Uuid = uuid!("0c4c3011-7700-46f4-aa96-d5e974e32a54");

// --- Control service (0x3030) ---

/// Control service UUID.
pub const CONTROL_SERVICE: Uuid = uuid!("0c4c3030-7700-46f4-aa96-d5e974e32a54");

/// Device clock as unix seconds.
pub const TIME_INFORMATION: Uuid = uuid!("0c4c3031-7700-46f4-aa96-d5e974e32a54");

/// Sensor/CPU/battery fault bytes.
pub const ERROR_STATUS: Uuid = uuid!("0c4c3033-7700-46f4-aa96-d5e974e32a54");

// --- Standard BLE UUIDs ---

/// Generic Access Profile (GAP) service.
pub const GAP_SERVICE: Uuid = uuid!("00001800-0000-1000-8000-00805f9b34fb");

/// Device name characteristic.
pub const DEVICE_NAME: Uuid = uuid!("00002a00-0000-1000-8000-00805f9b34fb");

/// Name advertised by supported sensors.
pub const SUPPORTED_DEVICE_NAME: &str = "EnvSensor-BL01";
