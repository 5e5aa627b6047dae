use std::time::Duration;

use sfbridge_protocol::{LinkConnection, SensorFrame};

use crate::channel_layer::{ChannelError, LinkProtocol};
use crate::comms::link2dispatch::LinkEvent;

/// Frames the sensor link; records are passed on undecoded.
#[derive(Debug)]
pub struct SensorLink {
	read_timeout: Duration,
}

impl SensorLink {
	pub fn new(read_timeout: Duration) -> Self {
		Self { read_timeout }
	}
}

impl LinkProtocol for SensorLink {
	fn next_event(&mut self, conn: &mut LinkConnection) -> Result<Option<LinkEvent>, ChannelError> {
		let frame = conn.read_frame::<SensorFrame>(self.read_timeout)?;
		Ok(frame.map(LinkEvent::Sensor))
	}
}
