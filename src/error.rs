use crate::domain::models::SessionState;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Failures of the pure solar and geomagnetic math.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("hour angle is undefined when cos(latitude) * cos(declination) is zero")]
    DegenerateHourAngle,
    #[error("non-finite input to {0}")]
    NonFinite(&'static str),
    #[error("coordinates out of range: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
}

/// Failures reported by a BLE transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth unavailable: {0}")]
    Unavailable(String),
    #[error("no device selected")]
    NoDevice,
    #[error("link is down")]
    LinkDown,
    #[error("GATT operation failed: {0}")]
    Gatt(String),
}

/// Errors surfaced by the sundial session.
#[derive(Debug, Error)]
pub enum SundialError {
    #[error("bluetooth not supported: {0}")]
    Unsupported(String),
    #[error("no device selected")]
    NoDeviceSelected,
    #[error("required service {0} not found")]
    ServiceNotFound(Uuid),
    #[error("required characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    #[error("transport call timed out after {0:?}")]
    Timeout(Duration),
    #[error("operation not allowed in state {0:?}")]
    InvalidState(SessionState),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("computation failed: {0}")]
    Geometry(#[from] GeometryError),
}

impl SundialError {
    /// Whether the error only affects a single read cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Geometry(_))
    }
}

pub type Result<T, E = SundialError> = std::result::Result<T, E>;
