use std::io::IoSliceMut;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::socket::{ControlMessageOwned, MsgFlags, recvmsg};

use crate::display::MAX_HANDLE_FDS;
use crate::{Frame, ProtocolError};

/// Blocking reader for one accepted link client.
///
/// Bytes and `SCM_RIGHTS` descriptors are accumulated until a whole frame can
/// be parsed; descriptors not yet claimed by a frame are closed on drop.
#[derive(Debug)]
pub struct LinkConnection {
	stream: UnixStream,
	buffer: Vec<u8>,
	pending_fds: Vec<OwnedFd>,
}

impl LinkConnection {
	pub fn new(stream: UnixStream) -> std::io::Result<Self> {
		stream.set_nonblocking(false)?;
		Ok(Self {
			stream,
			buffer: Vec::new(),
			pending_fds: Vec::new(),
		})
	}

	/// Reads the next frame, waiting at most `timeout`.
	///
	/// `Ok(None)` means the timeout elapsed without a complete frame; bytes
	/// already received stay buffered for the next call.
	pub fn read_frame<F: Frame>(&mut self, timeout: Duration) -> Result<Option<F>, ProtocolError> {
		let deadline = Instant::now() + timeout;
		loop {
			if let Some(frame) = self.try_parse_buffer()? {
				return Ok(Some(frame));
			}
			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				return Ok(None);
			}
			self.stream.set_read_timeout(Some(remaining))?;
			if !self.recv_chunk()? {
				return Ok(None);
			}
		}
	}

	/// A second handle on the same socket, used to reply from another thread.
	pub fn try_clone_stream(&self) -> std::io::Result<UnixStream> {
		self.stream.try_clone()
	}
}

impl LinkConnection {
	fn try_parse_buffer<F: Frame>(&mut self) -> Result<Option<F>, ProtocolError> {
		if self.buffer.is_empty() {
			return Ok(None);
		}
		let Some((frame, consumed)) = F::parse(&self.buffer, &mut self.pending_fds)? else {
			return Ok(None);
		};
		self.buffer.drain(..consumed);
		if self.buffer.is_empty() && !self.pending_fds.is_empty() {
			let got = self.pending_fds.len();
			tracing::warn!(count = got, "closing file descriptors no frame claimed");
			self.pending_fds.clear();
			return Err(ProtocolError::FdCountMismatch { expected: 0, got });
		}
		Ok(Some(frame))
	}

	/// Receives one chunk. Returns `false` when the read timed out.
	fn recv_chunk(&mut self) -> Result<bool, ProtocolError> {
		let mut buf = [0u8; 4096];
		let mut cmsg_space = nix::cmsg_space!([RawFd; MAX_HANDLE_FDS]);
		let mut iov = [IoSliceMut::new(&mut buf)];
		let (bytes, fds) = match recvmsg::<()>(
			self.stream.as_raw_fd(),
			&mut iov,
			Some(&mut cmsg_space),
			MsgFlags::MSG_CMSG_CLOEXEC,
		) {
			Err(Errno::EINTR) => return self.recv_chunk(),
			Err(err) if err == Errno::EAGAIN || err == Errno::EWOULDBLOCK => return Ok(false),
			Err(err) => return Err(ProtocolError::Nix(err)),
			Ok(msg) => {
				let mut fds = Vec::new();
				for cmsg in msg.cmsgs()? {
					if let ControlMessageOwned::ScmRights(rights) = cmsg {
						fds.extend(rights.into_iter().map(|fd| {
							// SAFETY: the kernel just installed this descriptor
							// for us and nothing else records it.
							unsafe { OwnedFd::from_raw_fd(fd) }
						}));
					}
				}
				if msg.flags.contains(MsgFlags::MSG_CTRUNC) {
					return Err(ProtocolError::Truncated);
				}
				if msg.bytes == 0 {
					return Err(ProtocolError::UnexpectedEof);
				}
				(msg.bytes, fds)
			}
		};
		if !fds.is_empty() {
			if !self.pending_fds.is_empty() {
				return Err(ProtocolError::InvalidPayload(
					"received file descriptors while a previous frame is incomplete".into(),
				));
			}
			self.pending_fds = fds;
		}
		self.buffer.extend_from_slice(&buf[..bytes]);
		Ok(true)
	}
}

impl AsRawFd for LinkConnection {
	fn as_raw_fd(&self) -> RawFd {
		self.stream.as_raw_fd()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::display::DisplayMessage;
	use crate::native::{BufferInfo, PixelFormat};
	use crate::{AppNotice, Lifecycle};
	use nix::sys::socket::{ControlMessage, sendmsg};
	use std::fs::File;
	use std::io::{IoSlice, Write};
	use std::os::fd::AsFd;

	fn send_with_fds(stream: &UnixStream, bytes: &[u8], fds: &[RawFd]) {
		let cmsgs = [ControlMessage::ScmRights(fds)];
		sendmsg::<()>(
			stream.as_raw_fd(),
			&[IoSlice::new(bytes)],
			if fds.is_empty() { &[] } else { &cmsgs },
			MsgFlags::empty(),
			None,
		)
		.unwrap();
	}

	#[test]
	fn buffer_with_descriptor_crosses_the_socket() {
		let (producer, consumer) = UnixStream::pair().unwrap();
		let mut conn = LinkConnection::new(consumer).unwrap();
		let info = BufferInfo {
			width: 4,
			height: 2,
			stride: 4,
			format: PixelFormat::RGBX_8888,
		};
		let memory = File::open("/dev/null").unwrap();
		let bytes = DisplayMessage::encode_buffer(&info, 1, &[42]);
		send_with_fds(&producer, &bytes, &[memory.as_fd().as_raw_fd()]);

		let message = conn
			.read_frame::<DisplayMessage>(Duration::from_secs(2))
			.unwrap()
			.unwrap();
		let DisplayMessage::Buffer(buffer) = message else {
			panic!("expected a buffer");
		};
		assert_eq!(buffer.info, info);
		assert_eq!(buffer.handle.num_fds(), 1);
		assert_eq!(buffer.handle.ints(), &[42]);
	}

	#[test]
	fn timeout_keeps_partial_frame_buffered() {
		let (mut producer, consumer) = UnixStream::pair().unwrap();
		let mut conn = LinkConnection::new(consumer).unwrap();
		producer.write_all(b"open com.a").unwrap();
		let first = conn
			.read_frame::<AppNotice>(Duration::from_millis(30))
			.unwrap();
		assert!(first.is_none());
		producer.write_all(b"/.Main\n").unwrap();
		let notice = conn
			.read_frame::<AppNotice>(Duration::from_secs(2))
			.unwrap()
			.unwrap();
		assert_eq!(notice.lifecycle, Lifecycle::Open);
		assert_eq!(notice.target.to_string(), "com.a/.Main");
	}

	#[test]
	fn peer_hangup_is_eof() {
		let (producer, consumer) = UnixStream::pair().unwrap();
		let mut conn = LinkConnection::new(consumer).unwrap();
		drop(producer);
		assert!(matches!(
			conn.read_frame::<AppNotice>(Duration::from_secs(1)),
			Err(ProtocolError::UnexpectedEof)
		));
	}

	#[test]
	fn unclaimed_descriptors_are_a_protocol_error() {
		let (producer, consumer) = UnixStream::pair().unwrap();
		let mut conn = LinkConnection::new(consumer).unwrap();
		let stray = File::open("/dev/null").unwrap();
		send_with_fds(
			&producer,
			&DisplayMessage::encode_no_buffer(),
			&[stray.as_fd().as_raw_fd()],
		);
		assert!(matches!(
			conn.read_frame::<DisplayMessage>(Duration::from_secs(1)),
			Err(ProtocolError::FdCountMismatch {
				expected: 0,
				got: 1
			})
		));
	}
}
