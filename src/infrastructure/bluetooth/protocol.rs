//! Sundial Protocol
//!
//! Fixed GATT identifiers and the wire encoding shared with the sundial
//! peripheral.

use uuid::Uuid;

/// Bluetooth SIG base UUID (0000xxxx-0000-1000-8000-00805f9b34fb)
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Sundial service UUID - azimuth and altitude readings (0x181A)
pub const SUNDIAL_SERVICE_UUID: &str = "0000181a-0000-1000-8000-00805f9b34fb";

/// Location service UUID - optional, hosts the magnetic north hint (0x1819)
pub const LOCATION_SERVICE_UUID: &str = "00001819-0000-1000-8000-00805f9b34fb";

/// Azimuth characteristic UUID - read/notify (0x2BE1)
pub const AZIMUTH_CHAR_UUID: &str = "00002be1-0000-1000-8000-00805f9b34fb";

/// Altitude characteristic UUID - read/notify (0x2A6C)
pub const ALTITUDE_CHAR_UUID: &str = "00002a6c-0000-1000-8000-00805f9b34fb";

/// Magnetic north characteristic UUID - write (0x2AB0)
pub const NORTH_CHAR_UUID: &str = "00002ab0-0000-1000-8000-00805f9b34fb";

/// Size of a single encoded value
pub const VALUE_LEN: usize = 4;

/// Expand a 16-bit assigned number onto the Bluetooth base UUID.
pub const fn uuid_from_short(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Service and characteristic identifiers used by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattIdentifiers {
    pub sundial_service: Uuid,
    pub location_service: Uuid,
    pub azimuth: Uuid,
    pub altitude: Uuid,
    pub magnetic_north: Uuid,
}

impl Default for GattIdentifiers {
    fn default() -> Self {
        Self {
            sundial_service: uuid_from_short(0x181A),
            location_service: uuid_from_short(0x1819),
            azimuth: uuid_from_short(0x2BE1),
            altitude: uuid_from_short(0x2A6C),
            magnetic_north: uuid_from_short(0x2AB0),
        }
    }
}

/// Discovery request: devices must advertise every `services` entry;
/// `optional_services` are requested for access but not required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFilter {
    pub services: Vec<Uuid>,
    pub optional_services: Vec<Uuid>,
}

impl DeviceFilter {
    pub fn sundial(identifiers: &GattIdentifiers) -> Self {
        Self {
            services: vec![identifiers.sundial_service],
            optional_services: vec![identifiers.location_service],
        }
    }
}

/// Decode a little-endian IEEE-754 float in degrees.
///
/// Returns `None` when fewer than four bytes are present (no value yet).
/// Trailing bytes are ignored.
pub fn decode_degrees(bytes: &[u8]) -> Option<f64> {
    let raw: [u8; VALUE_LEN] = bytes.get(..VALUE_LEN)?.try_into().ok()?;
    Some(f32::from_le_bytes(raw) as f64)
}

/// Encode degrees as a little-endian IEEE-754 float.
pub fn encode_degrees(degrees: f64) -> [u8; VALUE_LEN] {
    (degrees as f32).to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_uuids_match_strings() {
        let ids = GattIdentifiers::default();
        assert_eq!(ids.sundial_service.to_string(), SUNDIAL_SERVICE_UUID);
        assert_eq!(ids.location_service.to_string(), LOCATION_SERVICE_UUID);
        assert_eq!(ids.azimuth.to_string(), AZIMUTH_CHAR_UUID);
        assert_eq!(ids.altitude.to_string(), ALTITUDE_CHAR_UUID);
        assert_eq!(ids.magnetic_north.to_string(), NORTH_CHAR_UUID);
    }

    #[test]
    fn test_degrees_round_trip() {
        for value in [171.62, -109.34, 31.76, 0.0, -0.0, 8.99, 359.999] {
            let decoded = decode_degrees(&encode_degrees(value)).unwrap();
            assert!((decoded - value).abs() < 1e-4, "{} -> {}", value, decoded);
        }
    }

    #[test]
    fn test_decode_known_bytes() {
        // 1.5f32 little-endian
        assert_eq!(decode_degrees(&[0x00, 0x00, 0xC0, 0x3F]), Some(1.5));
        assert_eq!(decode_degrees(&[0x00, 0x00, 0xC0, 0x3F, 0xFF]), Some(1.5));
    }

    #[test]
    fn test_decode_short_payload() {
        assert_eq!(decode_degrees(&[]), None);
        assert_eq!(decode_degrees(&[0x00, 0x00, 0xC0]), None);
    }

    #[test]
    fn test_sundial_filter() {
        let ids = GattIdentifiers::default();
        let filter = DeviceFilter::sundial(&ids);
        assert_eq!(filter.services, vec![ids.sundial_service]);
        assert_eq!(filter.optional_services, vec![ids.location_service]);
    }
}
