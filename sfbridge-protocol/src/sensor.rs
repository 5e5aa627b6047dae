use std::os::fd::OwnedFd;

use crate::{Frame, ProtocolError, read_u32};

pub const MAX_SENSOR_FRAME: usize = 4096;

/// One opaque record from the sensor link; decoding is left to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorFrame(pub Vec<u8>);

impl SensorFrame {
	pub fn encode(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(4 + self.0.len());
		out.extend_from_slice(&(self.0.len() as u32).to_le_bytes());
		out.extend_from_slice(&self.0);
		out
	}
}

impl Frame for SensorFrame {
	fn parse(bytes: &[u8], _fds: &mut Vec<OwnedFd>) -> Result<Option<(Self, usize)>, ProtocolError> {
		if bytes.len() < 4 {
			return Ok(None);
		}
		let len = read_u32(bytes, 0) as usize;
		if len > MAX_SENSOR_FRAME {
			return Err(ProtocolError::FrameTooLarge {
				len,
				max: MAX_SENSOR_FRAME,
			});
		}
		if bytes.len() < 4 + len {
			return Ok(None);
		}
		Ok(Some((Self(bytes[4..4 + len].to_vec()), 4 + len)))
	}
}
