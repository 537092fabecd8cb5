//! Identifier helpers shared by scanning and the BLE transport.

use btleplug::platform::PeripheralId;

/// Format a peripheral ID as a string.
///
/// On macOS peripheral IDs are UUIDs; elsewhere they wrap the MAC address.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Identifier to store a device under: its address, or the peripheral ID on
/// platforms that hide addresses (reported as all zeros).
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if is_hidden_address(address) {
        format_peripheral_id(peripheral_id)
    } else {
        normalize_address(address)
    }
}

fn is_hidden_address(address: &str) -> bool {
    address == "00:00:00:00:00:00"
}

/// Canonical `AA:BB:CC:DD:EE:FF` form of a MAC address. Other identifiers
/// pass through unchanged.
pub fn normalize_address(address: &str) -> String {
    match mac_digits(address) {
        Some(digits) => digits
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(":"),
        None => address.to_string(),
    }
}

/// Whether `value` is six hex octets, separated by `:` or `-` or not at all.
pub fn is_mac_address(value: &str) -> bool {
    mac_digits(value).is_some()
}

fn mac_digits(value: &str) -> Option<String> {
    let separated = value.contains(':') || value.contains('-');
    let digits: String = value.chars().filter(|c| *c != ':' && *c != '-').collect();
    let well_formed = digits.len() == 12
        && digits.chars().all(|c| c.is_ascii_hexdigit())
        && (!separated || value.len() == 17);
    well_formed.then_some(digits)
}

/// Whether two identifiers name the same device.
pub fn same_device(a: &str, b: &str) -> bool {
    let strip = |s: &str| s.replace([':', '-'], "").to_ascii_lowercase();
    strip(a) == strip(b)
}
