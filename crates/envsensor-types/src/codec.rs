//! Encode/decode entry points for every characteristic the sync engine touches.
//!
//! These are thin functions over the payload types in [`crate::types`] so the
//! protocol layer can speak in terms of characteristics rather than structs.

use crate::error::{ParseError, ParseResult};
use crate::types::{
    ErrorStatus, LatestPage, MeasurementInterval, REQUEST_PAGE_BYTES, RequestPage, ResponseData,
    ResponseFlag, TimeInformation,
};

/// Decode one ResponseData (or LatestData) read.
pub fn decode_response(bytes: &[u8]) -> ParseResult<ResponseData> {
    ResponseData::from_bytes(bytes)
}

/// Encode a request for `page`, returning rows `last_row` down to 0.
pub fn encode_request(page: u16, last_row: u8) -> ParseResult<[u8; REQUEST_PAGE_BYTES]> {
    Ok(RequestPage::new(page, last_row)?.to_bytes())
}

pub fn decode_flag(bytes: &[u8]) -> ParseResult<ResponseFlag> {
    ResponseFlag::from_bytes(bytes)
}

pub fn decode_latest_page(bytes: &[u8]) -> ParseResult<LatestPage> {
    LatestPage::from_bytes(bytes)
}

pub fn decode_time(bytes: &[u8]) -> ParseResult<TimeInformation> {
    TimeInformation::from_bytes(bytes)
}

pub fn encode_time(time: TimeInformation) -> [u8; 4] {
    time.to_bytes()
}

pub fn decode_interval(bytes: &[u8]) -> ParseResult<MeasurementInterval> {
    MeasurementInterval::from_bytes(bytes)
}

/// Encode an interval, rejecting values outside 1..=3600 seconds.
pub fn encode_interval(seconds: u16) -> ParseResult<[u8; 2]> {
    Ok(MeasurementInterval::new(seconds)?.to_bytes())
}

pub fn decode_error(bytes: &[u8]) -> ParseResult<ErrorStatus> {
    ErrorStatus::from_bytes(bytes)
}

/// Decode the GAP device name, trimming trailing NULs.
pub fn decode_device_name(bytes: &[u8]) -> ParseResult<String> {
    let name = std::str::from_utf8(bytes)
        .map_err(|e| ParseError::invalid_value(format!("device name is not UTF-8: {e}")))?;
    Ok(name.trim_end_matches('\0').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_request_validates() {
        assert_eq!(encode_request(2046, 12).unwrap(), [0xfe, 0x07, 0x0c]);
        assert!(encode_request(2048, 12).is_err());
    }

    #[test]
    fn test_encode_interval_validates() {
        assert_eq!(encode_interval(60).unwrap(), [60, 0]);
        assert!(encode_interval(0).is_err());
        assert!(encode_interval(3601).is_err());
    }

    #[test]
    fn test_decode_device_name() {
        assert_eq!(
            decode_device_name(b"EnvSensor-BL01\0").unwrap(),
            "EnvSensor-BL01"
        );
        assert!(decode_device_name(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn test_time_codec_pair() {
        let t = decode_time(&[0xE3, 0x68, 0x3E, 0x5F]).unwrap();
        assert_eq!(encode_time(t), [0xE3, 0x68, 0x3E, 0x5F]);
    }
}
