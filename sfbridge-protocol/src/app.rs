use std::fmt;
use std::os::fd::OwnedFd;
use std::str::FromStr;

use crate::message_header::{CLOSE, MessageHeader, OPEN};
use crate::{Frame, ProtocolError};

pub const MAX_LINE_LEN: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	Open,
	Close,
}

impl Lifecycle {
	pub fn header(self) -> &'static str {
		match self {
			Self::Open => OPEN,
			Self::Close => CLOSE,
		}
	}
}

impl TryFrom<MessageHeader> for Lifecycle {
	type Error = ProtocolError;

	fn try_from(value: MessageHeader) -> Result<Self, Self::Error> {
		match value.0.as_str() {
			OPEN => Ok(Self::Open),
			CLOSE => Ok(Self::Close),
			_ => Err(ProtocolError::UnknownHeader(value.0)),
		}
	}
}

/// `appId[/activityId]` as announced by the app-lifecycle link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTarget {
	pub app_id: String,
	pub activity: Option<String>,
}

impl FromStr for AppTarget {
	type Err = ProtocolError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (app_id, activity) = match s.split_once('/') {
			Some((app, activity)) => (app, Some(activity)),
			None => (s, None),
		};
		if app_id.is_empty() || app_id.contains(char::is_whitespace) {
			return Err(ProtocolError::InvalidPayload(format!("invalid app id {s:?}")));
		}
		Ok(Self {
			app_id: app_id.to_string(),
			activity: activity.filter(|a| !a.is_empty()).map(str::to_string),
		})
	}
}

impl fmt::Display for AppTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.activity {
			Some(activity) => write!(f, "{}/{activity}", self.app_id),
			None => f.write_str(&self.app_id),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppNotice {
	pub lifecycle: Lifecycle,
	pub target: AppTarget,
}

impl AppNotice {
	pub fn encode(&self) -> Vec<u8> {
		format!("{} {}\n", self.lifecycle.header(), self.target).into_bytes()
	}
}

impl Frame for AppNotice {
	fn parse(bytes: &[u8], _fds: &mut Vec<OwnedFd>) -> Result<Option<(Self, usize)>, ProtocolError> {
		let Some(end) = bytes.iter().position(|b| *b == b'\n') else {
			if bytes.len() > MAX_LINE_LEN {
				return Err(ProtocolError::FrameTooLarge {
					len: bytes.len(),
					max: MAX_LINE_LEN,
				});
			}
			return Ok(None);
		};
		let line = std::str::from_utf8(&bytes[..end])
			.map_err(|e| ProtocolError::InvalidPayload(e.to_string()))?
			.trim_end_matches('\r');
		let Some((header, target)) = line.split_once(' ') else {
			return Err(ProtocolError::InvalidPayload(format!(
				"expected '<header> <app>', got {line:?}"
			)));
		};
		let notice = AppNotice {
			lifecycle: Lifecycle::try_from(MessageHeader::from(header))?,
			target: target.trim().parse()?,
		};
		Ok(Some((notice, end + 1)))
	}
}
