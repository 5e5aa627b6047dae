use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sfbridge_protocol::{BufferInfo, DisplayMessage, LinkConnection, NativeBuffer, ReleaseStatus};

use crate::channel_layer::{ChannelError, LinkProtocol};
use crate::comms::link2dispatch::LinkEvent;

/// Host focus as seen by the display link thread.
#[derive(Debug, Clone, Default)]
pub struct FocusGate(Arc<AtomicBool>);

impl FocusGate {
	pub fn set(&self, focused: bool) {
		self.0.store(focused, Ordering::Release);
	}

	pub fn is_focused(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}

/// Decodes the display link: buffers become [`StagedBuffer`]s, silence and
/// explicit `NO_BUFFER` frames become idle notifications.
#[derive(Debug)]
pub struct DisplayLink {
	focus: FocusGate,
	read_timeout: Duration,
	unfocused_read_timeout: Duration,
}

impl DisplayLink {
	pub fn new(focus: FocusGate, read_timeout: Duration, unfocused_read_timeout: Duration) -> Self {
		Self {
			focus,
			read_timeout,
			unfocused_read_timeout,
		}
	}

	fn current_timeout(&self) -> Duration {
		if self.focus.is_focused() {
			self.read_timeout
		} else {
			self.unfocused_read_timeout
		}
	}
}

impl LinkProtocol for DisplayLink {
	fn next_event(&mut self, conn: &mut LinkConnection) -> Result<Option<LinkEvent>, ChannelError> {
		let started = Instant::now();
		let message = conn.read_frame::<DisplayMessage>(self.current_timeout())?;
		let event = match message {
			None | Some(DisplayMessage::NoBuffer) => LinkEvent::NoBuffer {
				waited: started.elapsed(),
			},
			Some(DisplayMessage::Buffer(buffer)) => {
				tracing::trace!(
					width = buffer.info.width,
					height = buffer.info.height,
					format = %buffer.info.format,
					fds = buffer.handle.num_fds(),
					"buffer received"
				);
				LinkEvent::Buffer(StagedBuffer::new(buffer, conn.try_clone_stream()?))
			}
		};
		Ok(Some(event))
	}
}

/// A received buffer awaiting render.
///
/// Exactly one release status goes back to the producer per buffer: either
/// through [`StagedBuffer::release`] or, if the buffer is dropped unreleased,
/// a `Failed` status from `Drop`. The buffer's descriptors close afterwards.
#[derive(Debug)]
pub struct StagedBuffer {
	buffer: NativeBuffer,
	reply: UnixStream,
	acknowledged: bool,
}

impl StagedBuffer {
	pub fn new(buffer: NativeBuffer, reply: UnixStream) -> Self {
		Self {
			buffer,
			reply,
			acknowledged: false,
		}
	}

	pub fn buffer(&self) -> &NativeBuffer {
		&self.buffer
	}

	pub fn info(&self) -> &BufferInfo {
		&self.buffer.info
	}

	/// Acknowledges the buffer to the producer and closes our handle on it.
	pub fn release(mut self, failed: bool) -> Result<(), ChannelError> {
		self.acknowledged = true;
		self.send_status(ReleaseStatus::from_failed(failed))
	}

	fn send_status(&mut self, status: ReleaseStatus) -> Result<(), ChannelError> {
		self.reply.write_all(&status.to_bytes())?;
		Ok(())
	}
}

impl Drop for StagedBuffer {
	fn drop(&mut self) {
		if self.acknowledged {
			return;
		}
		self.acknowledged = true;
		if let Err(e) = self.send_status(ReleaseStatus::Failed) {
			tracing::debug!("could not report dropped buffer: {e}");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sfbridge_protocol::{NativeHandle, PixelFormat};
	use std::io::Read;

	fn staged() -> (StagedBuffer, UnixStream) {
		let (producer, consumer) = UnixStream::pair().unwrap();
		let buffer = NativeBuffer {
			info: BufferInfo {
				width: 2,
				height: 2,
				stride: 2,
				format: PixelFormat::RGBA_8888,
			},
			handle: NativeHandle::new(Vec::new(), Vec::new()),
		};
		(StagedBuffer::new(buffer, consumer), producer)
	}

	fn read_statuses(mut producer: UnixStream) -> Vec<ReleaseStatus> {
		let mut bytes = Vec::new();
		producer.read_to_end(&mut bytes).unwrap();
		bytes
			.chunks_exact(ReleaseStatus::LEN)
			.map(|c| ReleaseStatus::from_bytes(c.try_into().unwrap()).unwrap())
			.collect()
	}

	#[test]
	fn release_sends_one_status() {
		let (buffer, producer) = staged();
		buffer.release(false).unwrap();
		assert_eq!(read_statuses(producer), [ReleaseStatus::Rendered]);
	}

	#[test]
	fn failed_render_is_reported() {
		let (buffer, producer) = staged();
		buffer.release(true).unwrap();
		assert_eq!(read_statuses(producer), [ReleaseStatus::Failed]);
	}

	#[test]
	fn dropping_unreleased_buffer_reports_failure() {
		let (buffer, producer) = staged();
		drop(buffer);
		assert_eq!(read_statuses(producer), [ReleaseStatus::Failed]);
	}

	#[test]
	fn focus_selects_read_timeout() {
		let focus = FocusGate::default();
		let link = DisplayLink::new(
			focus.clone(),
			Duration::from_millis(10),
			Duration::from_millis(500),
		);
		assert_eq!(link.current_timeout(), Duration::from_millis(500));
		focus.set(true);
		assert_eq!(link.current_timeout(), Duration::from_millis(10));
	}
}
