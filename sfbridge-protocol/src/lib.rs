//! Wire protocol spoken between the mobile OS side and the bridge.
//!
//! Three local stream sockets share the same framing machinery
//! ([`LinkConnection`] + [`Frame`]): the display link carrying native buffer
//! descriptors with their file descriptors, the line-oriented app-lifecycle
//! link, and the opaque length-prefixed sensor link.

pub mod app;
pub mod connection;
pub mod display;
mod error;
pub mod message_header;
pub mod native;
pub mod sensor;

use std::os::fd::OwnedFd;

pub use app::{AppNotice, AppTarget, Lifecycle};
pub use connection::LinkConnection;
pub use display::{DisplayMessage, ReleaseStatus};
pub use error::ProtocolError;
pub use native::{BufferInfo, NativeBuffer, NativeHandle, PixelFormat};
pub use sensor::SensorFrame;

pub const DEFAULT_ROOT: &str = "/tmp/sfbridge";
pub const DISPLAY_SOCKET: &str = "display";
pub const APP_SOCKET: &str = "apps";
pub const SENSOR_SOCKET: &str = "sensors";

/// A protocol unit that can be cut from the front of a receive buffer.
pub trait Frame: Sized {
	/// Parses one frame from the start of `bytes`, moving the descriptors it
	/// carries out of `fds`. Returns `Ok(None)` while the frame is incomplete,
	/// otherwise the frame and the number of bytes it consumed.
	fn parse(bytes: &[u8], fds: &mut Vec<OwnedFd>) -> Result<Option<(Self, usize)>, ProtocolError>;
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
	let mut raw = [0u8; 4];
	raw.copy_from_slice(&bytes[offset..offset + 4]);
	u32::from_le_bytes(raw)
}

pub(crate) fn read_i32(bytes: &[u8], offset: usize) -> i32 {
	read_u32(bytes, offset) as i32
}
