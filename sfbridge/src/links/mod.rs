//! Per-link decoding run on the channel threads.

pub mod apps;
pub mod display;
pub mod sensors;
pub mod watchdog;

pub use apps::AppLink;
pub use display::{DisplayLink, FocusGate, StagedBuffer};
pub use sensors::SensorLink;
pub use watchdog::StallWatchdog;
