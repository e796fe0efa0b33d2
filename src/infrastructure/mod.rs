pub mod bluetooth;
pub mod clock;
pub mod location;
pub mod logging;
