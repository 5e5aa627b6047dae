//! Bridges a containerised mobile OS's display and input paths into host
//! windows.
//!
//! Every producer link (display buffers, app lifecycle, sensors) is a
//! [`channel_layer::Channel`]: a listening Unix socket served by one
//! background thread that stages at most one event at a time. The
//! [`dispatch_layer::Dispatcher`] is the only owner of renderer, window,
//! touch-slot and input state and consumes those events on a single task.

pub mod bridge;
pub mod channel_layer;
pub mod comms;
pub mod config;
pub mod control;
pub mod dispatch_layer;
pub mod errors;
pub mod input_layer;
pub mod links;
pub mod rendering_layer;
pub mod window_layer;

pub use config::BridgeConfig;
pub use errors::StartupError;
