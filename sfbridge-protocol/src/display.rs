use std::os::fd::OwnedFd;

use crate::native::{BufferInfo, NativeBuffer, NativeHandle, PixelFormat};
use crate::{Frame, ProtocolError, read_i32, read_u32};

pub const HEADER_LEN: usize = 8;
pub const BUFFER: u32 = 1;
pub const NO_BUFFER: u32 = 2;
pub const MAX_HANDLE_FDS: usize = 8;
pub const MAX_HANDLE_INTS: usize = 64;

const DESCRIPTOR_LEN: usize = 6 * 4;
const MAX_PAYLOAD_LEN: usize = DESCRIPTOR_LEN + MAX_HANDLE_INTS * 4;

/// A producer-to-consumer message on the display link.
#[derive(Debug)]
pub enum DisplayMessage {
	Buffer(NativeBuffer),
	NoBuffer,
}

impl Frame for DisplayMessage {
	fn parse(bytes: &[u8], fds: &mut Vec<OwnedFd>) -> Result<Option<(Self, usize)>, ProtocolError> {
		if bytes.len() < HEADER_LEN {
			return Ok(None);
		}
		let kind = read_u32(bytes, 0);
		let len = read_u32(bytes, 4) as usize;
		if len > MAX_PAYLOAD_LEN {
			return Err(ProtocolError::FrameTooLarge {
				len,
				max: MAX_PAYLOAD_LEN,
			});
		}
		if bytes.len() < HEADER_LEN + len {
			return Ok(None);
		}
		let payload = &bytes[HEADER_LEN..HEADER_LEN + len];
		let message = match kind {
			BUFFER => Self::Buffer(parse_buffer(payload, fds)?),
			NO_BUFFER => {
				if !payload.is_empty() {
					return Err(ProtocolError::InvalidPayload(
						"no_buffer message carries a payload".into(),
					));
				}
				Self::NoBuffer
			}
			other => return Err(ProtocolError::UnknownKind(other)),
		};
		Ok(Some((message, HEADER_LEN + len)))
	}
}

fn parse_buffer(payload: &[u8], fds: &mut Vec<OwnedFd>) -> Result<NativeBuffer, ProtocolError> {
	if payload.len() < DESCRIPTOR_LEN {
		return Err(ProtocolError::InvalidPayload(format!(
			"buffer descriptor needs {DESCRIPTOR_LEN} bytes, got {}",
			payload.len()
		)));
	}
	let field = |index: usize| read_i32(payload, index * 4);
	let info = BufferInfo {
		width: field(0),
		height: field(1),
		stride: field(2),
		format: PixelFormat(field(3)),
	};
	let num_fds = usize::try_from(field(4))
		.ok()
		.filter(|n| *n <= MAX_HANDLE_FDS)
		.ok_or_else(|| ProtocolError::InvalidPayload(format!("bad fd count {}", field(4))))?;
	let num_ints = usize::try_from(field(5))
		.ok()
		.filter(|n| *n <= MAX_HANDLE_INTS)
		.ok_or_else(|| ProtocolError::InvalidPayload(format!("bad int count {}", field(5))))?;
	if payload.len() != DESCRIPTOR_LEN + num_ints * 4 {
		return Err(ProtocolError::InvalidPayload(format!(
			"payload of {} bytes does not match {num_ints} handle ints",
			payload.len()
		)));
	}
	if fds.len() < num_fds {
		return Err(ProtocolError::FdCountMismatch {
			expected: num_fds,
			got: fds.len(),
		});
	}
	let ints = (0..num_ints)
		.map(|i| read_i32(payload, DESCRIPTOR_LEN + i * 4))
		.collect();
	let handle_fds = fds.drain(..num_fds).collect();
	Ok(NativeBuffer {
		info,
		handle: NativeHandle::new(handle_fds, ints),
	})
}

impl DisplayMessage {
	/// Encodes a buffer-ready frame. The `num_fds` descriptors must be sent
	/// alongside these bytes as `SCM_RIGHTS`.
	pub fn encode_buffer(info: &BufferInfo, num_fds: usize, ints: &[i32]) -> Vec<u8> {
		let payload_len = DESCRIPTOR_LEN + ints.len() * 4;
		let mut out = Vec::with_capacity(HEADER_LEN + payload_len);
		out.extend_from_slice(&BUFFER.to_le_bytes());
		out.extend_from_slice(&(payload_len as u32).to_le_bytes());
		for value in [
			info.width,
			info.height,
			info.stride,
			info.format.0,
			num_fds as i32,
			ints.len() as i32,
		] {
			out.extend_from_slice(&value.to_le_bytes());
		}
		for value in ints {
			out.extend_from_slice(&value.to_le_bytes());
		}
		out
	}

	pub fn encode_no_buffer() -> Vec<u8> {
		let mut out = Vec::with_capacity(HEADER_LEN);
		out.extend_from_slice(&NO_BUFFER.to_le_bytes());
		out.extend_from_slice(&0u32.to_le_bytes());
		out
	}
}

/// Consumer reply sent once per received buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ReleaseStatus {
	Rendered = 0,
	Failed = 1,
}

impl ReleaseStatus {
	pub const LEN: usize = 4;

	pub fn from_failed(failed: bool) -> Self {
		if failed { Self::Failed } else { Self::Rendered }
	}

	pub fn to_bytes(self) -> [u8; Self::LEN] {
		(self as i32).to_le_bytes()
	}

	pub fn from_bytes(bytes: [u8; Self::LEN]) -> Result<Self, ProtocolError> {
		match i32::from_le_bytes(bytes) {
			0 => Ok(Self::Rendered),
			1 => Ok(Self::Failed),
			other => Err(ProtocolError::InvalidPayload(format!(
				"unknown release status {other}"
			))),
		}
	}
}
