//! Characteristic payload types for EnvSensor devices.
//!
//! Every payload is a fixed-width little-endian layout. Decoders check the
//! length before reading any field and never return a partially decoded value.

use core::fmt;

use bytes::{Buf, BufMut};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{ParseError, ParseResult};
use crate::ring::{self, LAST_ROW};

/// Size of a LatestData / ResponseData payload.
pub const MEASUREMENT_BYTES: usize = 19;
/// Size of a LatestPage payload.
pub const LATEST_PAGE_BYTES: usize = 9;
/// Size of a RequestPage payload.
pub const REQUEST_PAGE_BYTES: usize = 3;
/// Size of a ResponseFlag payload.
pub const RESPONSE_FLAG_BYTES: usize = 5;
/// Size of a TimeInformation payload.
pub const TIME_INFORMATION_BYTES: usize = 4;
/// Size of a MeasurementInterval payload.
pub const MEASUREMENT_INTERVAL_BYTES: usize = 2;
/// Size of an ErrorStatus payload.
pub const ERROR_STATUS_BYTES: usize = 4;

/// Shortest accepted measurement interval in seconds.
pub const MIN_INTERVAL_SECS: u16 = 1;
/// Longest accepted measurement interval in seconds.
pub const MAX_INTERVAL_SECS: u16 = 3600;

fn check_len(data: &[u8], expected: usize) -> ParseResult<()> {
    if data.len() < expected {
        return Err(ParseError::InsufficientBytes {
            expected,
            actual: data.len(),
        });
    }
    if data.len() > expected {
        return Err(ParseError::invalid_value(format!(
            "payload is {} bytes, layout is {expected}",
            data.len()
        )));
    }
    Ok(())
}

/// Convert a device unix timestamp into an [`OffsetDateTime`].
pub fn unix_to_datetime(secs: u32) -> ParseResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(i64::from(secs))
        .map_err(|e| ParseError::invalid_value(format!("timestamp {secs}: {e}")))
}

/// One set of sensor values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurement {
    /// Temperature in °C.
    pub temperature: f32,
    /// Relative humidity in %.
    pub humidity: f32,
    /// Ambient light in lx.
    pub light: u16,
    /// UV index.
    pub uv_index: f32,
    /// Barometric pressure in hPa.
    pub pressure: f32,
    /// Sound noise in dB.
    pub noise: f32,
    /// Discomfort index.
    pub discomfort_index: f32,
    /// Heat stroke risk temperature in °C.
    pub heat_stroke: f32,
    /// Battery voltage in V.
    pub battery_voltage: f32,
}

/// A decoded LatestData or ResponseData payload.
///
/// Byte layout (19 bytes):
/// - byte 0: row index
/// - bytes 1-2: temperature (i16, /100)
/// - bytes 3-4: humidity (i16, /100)
/// - bytes 5-6: light (u16)
/// - bytes 7-8: UV index (i16, /100)
/// - bytes 9-10: pressure (i16, /10)
/// - bytes 11-12: noise (i16, /100)
/// - bytes 13-14: discomfort index (i16, /100)
/// - bytes 15-16: heat stroke (i16, /100)
/// - bytes 17-18: battery (u16, mV)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResponseData {
    /// Row index within the page (0..=12).
    pub row: u8,
    pub measurement: Measurement,
}

impl ResponseData {
    /// Decode a 19-byte measurement payload.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] for short payloads and
    /// [`ParseError::RowOutOfRange`] if the row index is past the page.
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        check_len(data, MEASUREMENT_BYTES)?;

        let mut buf = data;
        let row = ring::check_row(buf.get_u8())?;
        let temperature = f32::from(buf.get_i16_le()) / 100.0;
        let humidity = f32::from(buf.get_i16_le()) / 100.0;
        let light = buf.get_u16_le();
        let uv_index = f32::from(buf.get_i16_le()) / 100.0;
        let pressure = f32::from(buf.get_i16_le()) / 10.0;
        let noise = f32::from(buf.get_i16_le()) / 100.0;
        let discomfort_index = f32::from(buf.get_i16_le()) / 100.0;
        let heat_stroke = f32::from(buf.get_i16_le()) / 100.0;
        let battery_voltage = f32::from(buf.get_u16_le()) / 1000.0;

        Ok(ResponseData {
            row,
            measurement: Measurement {
                temperature,
                humidity,
                light,
                uv_index,
                pressure,
                noise,
                discomfort_index,
                heat_stroke,
                battery_voltage,
            },
        })
    }

    /// Encode into the device layout. Used by simulated devices.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; MEASUREMENT_BYTES] {
        fn fixed(value: f32, scale: f32) -> i16 {
            (value * scale).round() as i16
        }

        let m = &self.measurement;
        let mut out = [0u8; MEASUREMENT_BYTES];
        let mut buf = &mut out[..];
        buf.put_u8(self.row);
        buf.put_i16_le(fixed(m.temperature, 100.0));
        buf.put_i16_le(fixed(m.humidity, 100.0));
        buf.put_u16_le(m.light);
        buf.put_i16_le(fixed(m.uv_index, 100.0));
        buf.put_i16_le(fixed(m.pressure, 10.0));
        buf.put_i16_le(fixed(m.noise, 100.0));
        buf.put_i16_le(fixed(m.discomfort_index, 100.0));
        buf.put_i16_le(fixed(m.heat_stroke, 100.0));
        buf.put_u16_le((m.battery_voltage * 1000.0).round() as u16);
        out
    }
}

/// The device's current ring write position.
///
/// Byte layout (9 bytes): u32 start time of the latest page, u16 measurement
/// interval, u16 latest page, u8 latest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LatestPage {
    /// Device-clock unix time at which the latest page started.
    pub start_time: u32,
    /// Measurement interval in seconds.
    pub interval: u16,
    pub page: u16,
    pub row: u8,
}

impl LatestPage {
    /// Decode a 9-byte LatestPage payload.
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        check_len(data, LATEST_PAGE_BYTES)?;

        let mut buf = data;
        let start_time = buf.get_u32_le();
        let interval = buf.get_u16_le();
        let page = ring::check_page(buf.get_u16_le())?;
        let row = ring::check_row(buf.get_u8())?;

        Ok(LatestPage {
            start_time,
            interval,
            page,
            row,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; LATEST_PAGE_BYTES] {
        let mut out = [0u8; LATEST_PAGE_BYTES];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.start_time);
        buf.put_u16_le(self.interval);
        buf.put_u16_le(self.page);
        buf.put_u8(self.row);
        out
    }

    /// Seconds spanned by one complete page at the current interval.
    #[must_use]
    pub fn page_span_secs(&self) -> u32 {
        u32::from(self.interval) * u32::from(ring::ROWS_PER_PAGE)
    }

    /// Device time of the most recent sample.
    pub fn latest_sample_time(&self) -> ParseResult<u32> {
        sample_time(self.start_time, self.interval, self.row)
    }
}

/// A page request: which page to read and the highest row to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPage {
    pub page: u16,
    pub last_row: u8,
}

impl RequestPage {
    /// Build a validated request.
    pub fn new(page: u16, last_row: u8) -> ParseResult<Self> {
        Ok(RequestPage {
            page: ring::check_page(page)?,
            last_row: ring::check_row(last_row)?,
        })
    }

    /// Request every row of `page`.
    pub fn full_page(page: u16) -> ParseResult<Self> {
        Self::new(page, LAST_ROW)
    }

    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        check_len(data, REQUEST_PAGE_BYTES)?;
        let mut buf = data;
        let page = buf.get_u16_le();
        let last_row = buf.get_u8();
        Self::new(page, last_row)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; REQUEST_PAGE_BYTES] {
        let mut out = [0u8; REQUEST_PAGE_BYTES];
        let mut buf = &mut out[..];
        buf.put_u16_le(self.page);
        buf.put_u8(self.last_row);
        out
    }
}

/// Readiness of a requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ResponseFlag {
    /// The device is still preparing the page.
    NotReady,
    /// The page is ready; rows are stamped from `start_time`.
    Ready { start_time: u32 },
    /// The device rejected the request with this flag value.
    Failed(u8),
}

impl ResponseFlag {
    const UPDATING: u8 = 0x00;
    const COMPLETED: u8 = 0x01;

    /// Decode a 5-byte ResponseFlag payload.
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        check_len(data, RESPONSE_FLAG_BYTES)?;
        let mut buf = data;
        let flag = buf.get_u8();
        let start_time = buf.get_u32_le();
        Ok(match flag {
            Self::UPDATING => ResponseFlag::NotReady,
            Self::COMPLETED => ResponseFlag::Ready { start_time },
            code => ResponseFlag::Failed(code),
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; RESPONSE_FLAG_BYTES] {
        let (flag, start_time) = match *self {
            ResponseFlag::NotReady => (Self::UPDATING, 0),
            ResponseFlag::Ready { start_time } => (Self::COMPLETED, start_time),
            ResponseFlag::Failed(code) => (code, 0),
        };
        let mut out = [0u8; RESPONSE_FLAG_BYTES];
        let mut buf = &mut out[..];
        buf.put_u8(flag);
        buf.put_u32_le(start_time);
        out
    }
}

/// The instant the device started its current recording.
///
/// Writing it sets the device clock and restarts the log at page 0, so a
/// changed value between two reads means the ring was reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeInformation {
    pub unix_time: u32,
}

impl TimeInformation {
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        check_len(data, TIME_INFORMATION_BYTES)?;
        let mut buf = data;
        Ok(TimeInformation {
            unix_time: buf.get_u32_le(),
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; TIME_INFORMATION_BYTES] {
        self.unix_time.to_le_bytes()
    }

    /// Clock value for a host instant.
    ///
    /// # Errors
    ///
    /// Fails for instants before 1970 or after 2106, which the device
    /// cannot represent.
    pub fn from_datetime(at: OffsetDateTime) -> ParseResult<Self> {
        let unix_time = u32::try_from(at.unix_timestamp()).map_err(|_| {
            ParseError::invalid_value(format!("{at} is not representable as device time"))
        })?;
        Ok(TimeInformation { unix_time })
    }

    pub fn to_datetime(&self) -> ParseResult<OffsetDateTime> {
        unix_to_datetime(self.unix_time)
    }

}

/// Measurement interval, 1..=3600 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasurementInterval(u16);

impl MeasurementInterval {
    /// Validate an interval in seconds.
    pub fn new(secs: u16) -> ParseResult<Self> {
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&secs) {
            return Err(ParseError::invalid_value(format!(
                "measurement interval {secs}s outside {MIN_INTERVAL_SECS}..={MAX_INTERVAL_SECS}"
            )));
        }
        Ok(MeasurementInterval(secs))
    }

    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        check_len(data, MEASUREMENT_INTERVAL_BYTES)?;
        let mut buf = data;
        Self::new(buf.get_u16_le())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; MEASUREMENT_INTERVAL_BYTES] {
        self.0.to_le_bytes()
    }

    #[must_use]
    pub fn as_secs(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for MeasurementInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Fault class reported by the ErrorStatus characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorClass {
    Sensor,
    Cpu,
    Battery,
    Reserved,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Sensor => write!(f, "sensor fault"),
            ErrorClass::Cpu => write!(f, "CPU fault"),
            ErrorClass::Battery => write!(f, "battery fault"),
            ErrorClass::Reserved => write!(f, "reserved fault bit"),
        }
    }
}

/// Device fault bytes. Any non-zero byte is a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ErrorStatus {
    pub sensor: u8,
    pub cpu: u8,
    pub battery: u8,
    pub reserved: u8,
}

impl ErrorStatus {
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        check_len(data, ERROR_STATUS_BYTES)?;
        Ok(ErrorStatus {
            sensor: data[0],
            cpu: data[1],
            battery: data[2],
            reserved: data[3],
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; ERROR_STATUS_BYTES] {
        [self.sensor, self.cpu, self.battery, self.reserved]
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.code() != 0
    }

    /// All four bytes packed little-endian into one status code.
    #[must_use]
    pub fn code(&self) -> u32 {
        u32::from_le_bytes(self.to_bytes())
    }

    /// The fault classes currently set.
    #[must_use]
    pub fn faults(&self) -> Vec<ErrorClass> {
        [
            (self.sensor, ErrorClass::Sensor),
            (self.cpu, ErrorClass::Cpu),
            (self.battery, ErrorClass::Battery),
            (self.reserved, ErrorClass::Reserved),
        ]
        .into_iter()
        .filter(|(byte, _)| *byte != 0)
        .map(|(_, class)| class)
        .collect()
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let faults = self.faults();
        if faults.is_empty() {
            return write!(f, "no fault");
        }
        let names: Vec<String> = faults.iter().map(ToString::to_string).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Device time of `row` on a page that started at `start_time`.
///
/// All three values come from the device, so the sum is checked.
pub fn sample_time(start_time: u32, interval: u16, row: u8) -> ParseResult<u32> {
    u32::from(interval)
        .checked_mul(u32::from(row))
        .and_then(|offset| start_time.checked_add(offset))
        .ok_or(ParseError::TimeOverflow {
            start_time,
            interval,
            row,
        })
}

/// One stored log sample.
///
/// Identity is `(page, row, device_time)`: page numbers repeat every ring
/// revolution, and the device time tells the revolutions apart.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogRow {
    pub page: u16,
    pub row: u8,
    /// Device-clock unix time of the sample.
    pub device_time: u32,
    pub measurement: Measurement,
}

impl LogRow {
    /// Build a row from a decoded response, stamping it from the page start.
    pub fn from_response(
        page: u16,
        start_time: u32,
        interval: u16,
        data: &ResponseData,
    ) -> ParseResult<Self> {
        Ok(LogRow {
            page,
            row: data.row,
            device_time: sample_time(start_time, interval, data.row)?,
            measurement: data.measurement,
        })
    }

    /// Host-clock timestamp after applying a device clock offset.
    pub fn timestamp(&self, clock_offset_secs: i64) -> ParseResult<OffsetDateTime> {
        let secs = i64::from(self.device_time) + clock_offset_secs;
        OffsetDateTime::from_unix_timestamp(secs)
            .map_err(|e| ParseError::invalid_value(format!("timestamp {secs}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATEST_DATA_SAMPLE: [u8; 19] = [
        0x06, 0x1d, 0x0a, 0x8a, 0x19, 0x0a, 0x00, 0x02, 0x00, 0x25, 0x27, 0x05, 0x0e, 0x2b, 0x1d,
        0x62, 0x09, 0x73, 0x0a,
    ];

    #[test]
    fn test_decode_measurement_sample() {
        let data = ResponseData::from_bytes(&LATEST_DATA_SAMPLE).unwrap();
        let m = data.measurement;
        assert_eq!(data.row, 6);
        assert!((m.temperature - 25.89).abs() < 0.001);
        assert!((m.humidity - 65.38).abs() < 0.001);
        assert_eq!(m.light, 10);
        assert!((m.uv_index - 0.02).abs() < 0.001);
        assert!((m.pressure - 1002.1).abs() < 0.01);
        assert!((m.noise - 35.89).abs() < 0.001);
        assert!((m.discomfort_index - 74.67).abs() < 0.001);
        assert!((m.heat_stroke - 24.02).abs() < 0.001);
        assert!((m.battery_voltage - 2.675).abs() < 0.0001);
    }

    #[test]
    fn test_measurement_reencodes_to_sample() {
        let data = ResponseData::from_bytes(&LATEST_DATA_SAMPLE).unwrap();
        assert_eq!(data.to_bytes(), LATEST_DATA_SAMPLE);
    }

    #[test]
    fn test_decode_measurement_short_payload() {
        let err = ResponseData::from_bytes(&LATEST_DATA_SAMPLE[..18]).unwrap_err();
        assert_eq!(
            err,
            ParseError::InsufficientBytes {
                expected: 19,
                actual: 18
            }
        );
    }

    #[test]
    fn test_decode_measurement_negative_temperature() {
        let mut bytes = LATEST_DATA_SAMPLE;
        bytes[1..3].copy_from_slice(&(-512i16).to_le_bytes());
        let data = ResponseData::from_bytes(&bytes).unwrap();
        assert!((data.measurement.temperature + 5.12).abs() < 0.001);
    }

    #[test]
    fn test_decode_measurement_bad_row() {
        let mut bytes = LATEST_DATA_SAMPLE;
        bytes[0] = 13;
        assert_eq!(
            ResponseData::from_bytes(&bytes).unwrap_err(),
            ParseError::RowOutOfRange(13)
        );
    }

    #[test]
    fn test_decode_latest_page_sample() {
        let bytes = [0x43, 0x91, 0xe5, 0x5e, 0x2c, 0x01, 0x09, 0x02, 0x0b];
        let latest = LatestPage::from_bytes(&bytes).unwrap();
        assert_eq!(latest.start_time, 1_592_103_235);
        assert_eq!(latest.interval, 300);
        assert_eq!(latest.page, 521);
        assert_eq!(latest.row, 11);
        assert_eq!(latest.page_span_secs(), 3900);
        assert_eq!(latest.latest_sample_time(), Ok(1_592_103_235 + 3300));
        assert_eq!(latest.to_bytes(), bytes);
    }

    #[test]
    fn test_decode_latest_page_rejects_out_of_ring_page() {
        let bytes = [0, 0, 0, 0, 0x2c, 0x01, 0x00, 0x08, 0x00];
        assert_eq!(
            LatestPage::from_bytes(&bytes).unwrap_err(),
            ParseError::PageOutOfRange(2048)
        );
    }

    #[test]
    fn test_encode_request_page() {
        let req = RequestPage::new(521, 11).unwrap();
        assert_eq!(req.to_bytes(), [0x09, 0x02, 0x0b]);
        assert_eq!(RequestPage::from_bytes(&[0x09, 0x02, 0x0b]).unwrap(), req);
        assert_eq!(RequestPage::full_page(0).unwrap().last_row, 12);
        assert!(RequestPage::new(2048, 0).is_err());
        assert!(RequestPage::new(0, 13).is_err());
    }

    #[test]
    fn test_decode_response_flag_variants() {
        assert_eq!(
            ResponseFlag::from_bytes(&[0, 0, 0, 0, 0]).unwrap(),
            ResponseFlag::NotReady
        );
        assert_eq!(
            ResponseFlag::from_bytes(&[1, 0x43, 0x91, 0xe5, 0x5e]).unwrap(),
            ResponseFlag::Ready {
                start_time: 1_592_103_235
            }
        );
        assert_eq!(
            ResponseFlag::from_bytes(&[2, 0, 0, 0, 0]).unwrap(),
            ResponseFlag::Failed(2)
        );
        assert!(ResponseFlag::from_bytes(&[1, 0, 0]).is_err());
    }

    #[test]
    fn test_decode_time_sample() {
        let time = TimeInformation::from_bytes(&[0xE3, 0x68, 0x3E, 0x5F]).unwrap();
        assert_eq!(time.unix_time, 1_597_925_603);
        assert_eq!(time.to_datetime().unwrap().year(), 2020);
    }

    #[test]
    fn test_time_from_host_instant() {
        let host = OffsetDateTime::from_unix_timestamp(1030).unwrap();
        assert_eq!(
            TimeInformation::from_datetime(host).unwrap().unix_time,
            1030
        );
    }

    #[test]
    fn test_time_before_epoch_rejected() {
        let before = OffsetDateTime::from_unix_timestamp(-1).unwrap();
        assert!(TimeInformation::from_datetime(before).is_err());
    }

    #[test]
    fn test_measurement_interval_bounds() {
        assert!(MeasurementInterval::new(0).is_err());
        assert!(MeasurementInterval::new(3601).is_err());
        assert_eq!(MeasurementInterval::new(1).unwrap().as_secs(), 1);
        assert_eq!(MeasurementInterval::new(3600).unwrap().as_secs(), 3600);
        assert_eq!(
            MeasurementInterval::new(300).unwrap().to_bytes(),
            [0x2c, 0x01]
        );
        assert!(MeasurementInterval::from_bytes(&[0, 0]).is_err());
    }

    #[test]
    fn test_error_status_sample() {
        let status = ErrorStatus::from_bytes(&[0x00, 0x01, 0x01, 0x00]).unwrap();
        assert!(status.has_error());
        assert_eq!(status.faults(), vec![ErrorClass::Cpu, ErrorClass::Battery]);
        assert_eq!(status.to_string(), "CPU fault, battery fault");

        let clear = ErrorStatus::from_bytes(&[0, 0, 0, 0]).unwrap();
        assert!(!clear.has_error());
        assert_eq!(clear.to_string(), "no fault");
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let err = ErrorStatus::from_bytes(&[0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue(_)));
    }

    #[test]
    fn test_log_row_timestamps() {
        let data = ResponseData::from_bytes(&LATEST_DATA_SAMPLE).unwrap();
        let row = LogRow::from_response(521, 1_592_103_235, 300, &data).unwrap();
        assert_eq!(row.row, 6);
        assert_eq!(row.device_time, 1_592_103_235 + 1800);
        let ts = row.timestamp(-35).unwrap();
        assert_eq!(ts.unix_timestamp(), 1_592_103_235 + 1800 - 35);
    }

    #[test]
    fn test_sample_time_near_clock_end() {
        let data = ResponseData {
            row: 12,
            measurement: Measurement::default(),
        };
        let err = LogRow::from_response(3, u32::MAX - 100, 300, &data).unwrap_err();
        assert_eq!(
            err,
            ParseError::TimeOverflow {
                start_time: u32::MAX - 100,
                interval: 300,
                row: 12
            }
        );

        let latest = LatestPage {
            start_time: u32::MAX - 100,
            interval: 300,
            page: 3,
            row: 12,
        };
        assert!(latest.latest_sample_time().is_err());
        let first = LatestPage { row: 0, ..latest };
        assert_eq!(first.latest_sample_time().unwrap(), u32::MAX - 100);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_response_flag_serialization() {
        let json = serde_json::to_string(&ResponseFlag::Ready { start_time: 5 }).unwrap();
        assert_eq!(json, r#"{"Ready":{"start_time":5}}"#);
    }
}
