use std::time::Duration;

use sfbridge_protocol::{AppNotice, LinkConnection};

use crate::channel_layer::{ChannelError, LinkProtocol};
use crate::comms::link2dispatch::LinkEvent;

/// Decodes `open`/`close` notices from the app-lifecycle link.
#[derive(Debug)]
pub struct AppLink {
	read_timeout: Duration,
}

impl AppLink {
	pub fn new(read_timeout: Duration) -> Self {
		Self { read_timeout }
	}
}

impl LinkProtocol for AppLink {
	fn next_event(&mut self, conn: &mut LinkConnection) -> Result<Option<LinkEvent>, ChannelError> {
		let notice = conn.read_frame::<AppNotice>(self.read_timeout)?;
		if let Some(notice) = &notice {
			tracing::debug!(app = %notice.target, lifecycle = ?notice.lifecycle, "app notice");
		}
		Ok(notice.map(LinkEvent::App))
	}
}
