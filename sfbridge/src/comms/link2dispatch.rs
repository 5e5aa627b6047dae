use std::fmt;
use std::time::Duration;

use sfbridge_protocol::{AppNotice, Lifecycle, SensorFrame};

use crate::channel_layer::handoff::Consumed;
use crate::links::display::StagedBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
	Display,
	Apps,
	Sensors,
}

impl fmt::Display for LinkKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Display => "display",
			Self::Apps => "apps",
			Self::Sensors => "sensors",
		})
	}
}

/// Discriminant carried by every wake-up posted to the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
	Buffer,
	NoBuffer,
	NewWindow,
	CloseApp,
	Sensor,
}

#[derive(Debug)]
pub enum LinkEvent {
	Buffer(StagedBuffer),
	/// No buffer arrived; `waited` is how long the link actually waited.
	NoBuffer {
		waited: Duration,
	},
	App(AppNotice),
	Sensor(SensorFrame),
}

impl LinkEvent {
	pub fn code(&self) -> EventCode {
		match self {
			Self::Buffer(_) => EventCode::Buffer,
			Self::NoBuffer { .. } => EventCode::NoBuffer,
			Self::App(notice) => match notice.lifecycle {
				Lifecycle::Open => EventCode::NewWindow,
				Lifecycle::Close => EventCode::CloseApp,
			},
			Self::Sensor(_) => EventCode::Sensor,
		}
	}
}

/// One staged event. The producing link stays blocked until the signal,
/// and with it the [`Consumed`] token, is dropped by the dispatch loop.
#[derive(Debug)]
pub struct LinkSignal {
	pub link: LinkKind,
	pub event: LinkEvent,
	consumed: Consumed,
}

impl LinkSignal {
	pub(crate) fn new(link: LinkKind, event: LinkEvent, consumed: Consumed) -> Self {
		Self {
			link,
			event,
			consumed,
		}
	}

	#[cfg(test)]
	pub(crate) fn detached(link: LinkKind, event: LinkEvent) -> Self {
		Self::new(link, event, Consumed::detached())
	}

	pub fn code(&self) -> EventCode {
		self.event.code()
	}

	pub fn into_parts(self) -> (LinkKind, LinkEvent, Consumed) {
		(self.link, self.event, self.consumed)
	}
}

pub type LinkSignalRx = tokio::sync::mpsc::UnboundedReceiver<LinkSignal>;
pub type LinkSignalTx = tokio::sync::mpsc::UnboundedSender<LinkSignal>;
