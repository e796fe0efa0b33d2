pub mod geomagnetic;
pub mod geometry;
pub mod models;
pub mod settings;
pub mod solar;
pub mod telemetry;
