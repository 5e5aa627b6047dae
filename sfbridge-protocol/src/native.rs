use std::fmt;
use std::os::fd::OwnedFd;

/// Android HAL pixel format code as sent by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat(pub i32);

impl PixelFormat {
	pub const RGBA_8888: Self = Self(1);
	pub const RGBX_8888: Self = Self(2);
	pub const RGB_888: Self = Self(3);
	pub const RGB_565: Self = Self(4);
	pub const BGRA_8888: Self = Self(5);

	pub fn bytes_per_pixel(self) -> Option<u32> {
		match self {
			Self::RGBA_8888 | Self::RGBX_8888 | Self::BGRA_8888 => Some(4),
			Self::RGB_888 => Some(3),
			Self::RGB_565 => Some(2),
			_ => None,
		}
	}
}

impl fmt::Display for PixelFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			Self::RGBA_8888 => f.write_str("RGBA_8888"),
			Self::RGBX_8888 => f.write_str("RGBX_8888"),
			Self::RGB_888 => f.write_str("RGB_888"),
			Self::RGB_565 => f.write_str("RGB_565"),
			Self::BGRA_8888 => f.write_str("BGRA_8888"),
			Self(other) => write!(f, "format#{other}"),
		}
	}
}

/// Geometry of a graphics buffer. `stride` is in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
	pub width: i32,
	pub height: i32,
	pub stride: i32,
	pub format: PixelFormat,
}

/// The transferable part of a native buffer handle.
///
/// The descriptors are owned: dropping the handle closes them, which is how
/// the consumer gives up its reference to the graphics memory.
#[derive(Debug)]
pub struct NativeHandle {
	fds: Vec<OwnedFd>,
	ints: Vec<i32>,
}

impl NativeHandle {
	pub fn new(fds: Vec<OwnedFd>, ints: Vec<i32>) -> Self {
		Self { fds, ints }
	}

	pub fn num_fds(&self) -> usize {
		self.fds.len()
	}

	pub fn ints(&self) -> &[i32] {
		&self.ints
	}
}

#[derive(Debug)]
pub struct NativeBuffer {
	pub info: BufferInfo,
	pub handle: NativeHandle,
}
