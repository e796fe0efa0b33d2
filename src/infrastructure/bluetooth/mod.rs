//! Bluetooth Module
//!
//! Provides the BLE session with a sundial peripheral.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    SundialSession                        │
//! │  (State machine, polling, telemetry publication)         │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │ Transport │  │ Connection │  │ Protocol │
//! │           │  │            │  │          │
//! │ - WinRT   │  │ - Service  │  │ - UUIDs  │
//! │ - Scanner │  │   lookup   │  │ - f32 LE │
//! │           │  │ - Notify   │  │   codec  │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - GATT identifiers and the float32 value codec
//! - [`transport`] - Abstract BLE transport used by the session
//! - [`connection`] - Service/characteristic resolution and notifications
//! - [`service`] - Session coordinator
//! - `scanner`, `winrt` - Windows implementation of the transport

pub mod connection;
#[cfg(test)]
pub mod mock;
pub mod protocol;
#[cfg(windows)]
pub mod scanner;
pub mod service;
pub mod transport;
#[cfg(windows)]
pub mod winrt;

// Re-export main session for convenience
pub use service::{SessionConfig, SundialSession};
pub use transport::BleTransport;
