use crate::error::GeometryError;
use serde::{Deserialize, Serialize};

/// Observer position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeometryError> {
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !in_range {
            return Err(GeometryError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

#[derive(Deserialize)]
struct RawCoordinates {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = GeometryError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Coordinates::new(raw.latitude, raw.longitude)
    }
}

/// One azimuth/altitude pair as reported by the sundial, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    pub azimuth: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Ready,
}

/// Sensor characteristics that feed the read cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorChannel {
    Azimuth,
    Altitude,
}

/// What caused a read cycle to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTrigger {
    /// A characteristic notification updated the cached value.
    Notification(SensorChannel),
    /// The fallback poll timer fired.
    Poll,
    /// Invoked directly by the caller.
    Manual,
}

impl ReadTrigger {
    /// Poll and manual cycles actively read the characteristics first.
    pub fn refreshes_values(&self) -> bool {
        !matches!(self, Self::Notification(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingReading,
    MissingLocation,
}

/// Result of a single read cycle that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published,
    /// Session is not running; nothing to do.
    Idle,
    /// The link was down; an in-place reconnect was attempted.
    LinkDown,
    Skipped(SkipReason),
    /// The session left `Ready` while the cycle was computing.
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_validation() {
        assert!(Coordinates::new(50.4356, -104.5554).is_ok());
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert!(Coordinates::new(90.5, 0.0).is_err());
        assert!(Coordinates::new(0.0, -180.1).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_deserialized_coordinates_are_validated() {
        let parsed: Coordinates =
            serde_json::from_str(r#"{"latitude":50.4356,"longitude":-104.5554}"#).unwrap();
        assert_eq!(parsed, Coordinates::new(50.4356, -104.5554).unwrap());

        let out_of_range =
            serde_json::from_str::<Coordinates>(r#"{"latitude":200.0,"longitude":-999.0}"#);
        assert!(out_of_range.is_err());
    }

    #[test]
    fn test_trigger_refresh() {
        assert!(ReadTrigger::Poll.refreshes_values());
        assert!(ReadTrigger::Manual.refreshes_values());
        assert!(!ReadTrigger::Notification(SensorChannel::Altitude).refreshes_values());
    }
}
