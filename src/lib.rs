//! Sundial alignment host.
//!
//! Talks to a BLE sundial peripheral, reads its azimuth and altitude
//! sensors, and turns each reading into solar telemetry for the
//! observer's location.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{Result, SundialError};
pub use infrastructure::bluetooth::SundialSession;
