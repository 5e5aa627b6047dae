use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const EV_SYN: u16 = 0x00;
pub const EV_ABS: u16 = 0x03;
pub const SYN_REPORT: u16 = 0x00;
pub const ABS_MT_SLOT: u16 = 0x2f;
pub const ABS_MT_POSITION_X: u16 = 0x35;
pub const ABS_MT_POSITION_Y: u16 = 0x36;
pub const ABS_MT_TRACKING_ID: u16 = 0x39;
pub const ABS_MT_PRESSURE: u16 = 0x3a;

#[derive(Debug, Error)]
pub enum InputError {
	#[error("failed to open input device {path}: {source}")]
	Open {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("failed to write input event: {0}")]
	Write(#[from] io::Error),
}

/// The virtual input device the mobile OS reads touches from.
pub trait InputSink {
	fn send_event(&mut self, kind: u16, code: u16, value: i32) -> Result<(), InputError>;
}

impl<T: InputSink + ?Sized> InputSink for Box<T> {
	fn send_event(&mut self, kind: u16, code: u16, value: i32) -> Result<(), InputError> {
		(**self).send_event(kind, code, value)
	}
}

/// Writes raw `input_event` records to an existing event device node.
#[derive(Debug)]
pub struct EvdevWriter {
	device: File,
}

impl EvdevWriter {
	#[tracing::instrument(level = "info")]
	pub fn open(path: &Path) -> Result<Self, InputError> {
		let device = OpenOptions::new()
			.write(true)
			.open(path)
			.map_err(|source| InputError::Open {
				path: path.to_path_buf(),
				source,
			})?;
		Ok(Self { device })
	}
}

impl InputSink for EvdevWriter {
	fn send_event(&mut self, kind: u16, code: u16, value: i32) -> Result<(), InputError> {
		// SAFETY: input_event is plain old data; all-zero is a valid value.
		let mut event: libc::input_event = unsafe { std::mem::zeroed() };
		event.type_ = kind;
		event.code = code;
		event.value = value;
		// SAFETY: the slice covers exactly the initialised struct and does not
		// outlive it.
		let bytes = unsafe {
			std::slice::from_raw_parts(
				(&event as *const libc::input_event).cast::<u8>(),
				std::mem::size_of::<libc::input_event>(),
			)
		};
		self.device.write_all(bytes)?;
		Ok(())
	}
}

/// Drops every event; used when no input device is configured.
#[derive(Debug, Default)]
pub struct NullSink;

impl InputSink for NullSink {
	fn send_event(&mut self, _kind: u16, _code: u16, _value: i32) -> Result<(), InputError> {
		Ok(())
	}
}
