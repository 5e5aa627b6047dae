use std::fs::Permissions;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sfbridge_protocol::{LinkConnection, ProtocolError};
use thiserror::Error;

use super::handoff::Handoff;
use crate::comms::link2dispatch::{LinkEvent, LinkKind, LinkSignal, LinkSignalTx};

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ChannelError {
	#[error("failed to bind {path}: {source}")]
	Bind {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("failed to spawn link thread: {0}")]
	Spawn(#[source] io::Error),
	#[error("channel is not initialised")]
	NotInitialised,
	#[error("channel thread is already running")]
	AlreadyRunning,
	#[error("io error: {0}")]
	Io(#[from] io::Error),
	#[error("protocol error: {0}")]
	Protocol(#[from] ProtocolError),
}

/// Per-link message decoding, run on the link's background thread.
pub trait LinkProtocol: Send + 'static {
	/// Called once for every newly accepted client.
	fn on_connect(&mut self) {}

	/// Waits for at most one read timeout and returns the event to stage, if
	/// any. An error drops the client and returns the link to accepting.
	fn next_event(&mut self, conn: &mut LinkConnection) -> Result<Option<LinkEvent>, ChannelError>;
}

#[derive(Debug)]
struct ChannelShared {
	running: AtomicBool,
	connected: AtomicBool,
	handoff: Arc<Handoff>,
}

/// A listening Unix socket plus the background thread serving its one client.
///
/// The thread only decodes and stages events; everything it reads is handed to
/// the dispatch loop through [`LinkSignal`]s.
pub struct Channel<P: LinkProtocol> {
	kind: LinkKind,
	path: PathBuf,
	listener: Option<Arc<UnixListener>>,
	signals: Option<LinkSignalTx>,
	shared: Arc<ChannelShared>,
	protocol: Option<P>,
	thread: Option<JoinHandle<P>>,
}

impl<P: LinkProtocol> Channel<P> {
	pub fn new(kind: LinkKind, path: impl AsRef<Path>, protocol: P) -> Self {
		Self {
			kind,
			path: path.as_ref().to_path_buf(),
			listener: None,
			signals: None,
			shared: Arc::new(ChannelShared {
				running: AtomicBool::new(false),
				connected: AtomicBool::new(false),
				handoff: Handoff::new(),
			}),
			protocol: Some(protocol),
			thread: None,
		}
	}

	/// Binds the listening socket and records where wake-ups are posted.
	#[tracing::instrument(level = "info", skip(self, signals), fields(link = %self.kind, path = %self.path.display()))]
	pub fn init(&mut self, signals: LinkSignalTx) -> Result<(), ChannelError> {
		std::fs::remove_file(&self.path).ok();
		let listener = UnixListener::bind(&self.path).map_err(|source| ChannelError::Bind {
			path: self.path.clone(),
			source,
		})?;
		std::fs::set_permissions(&self.path, Permissions::from_mode(0o770)).ok();
		self.listener = Some(Arc::new(listener));
		self.signals = Some(signals);
		tracing::info!("link listening");
		Ok(())
	}

	pub fn start_thread(&mut self) -> Result<(), ChannelError> {
		if self.thread.is_some() {
			return Err(ChannelError::AlreadyRunning);
		}
		let (Some(listener), Some(signals)) = (self.listener.clone(), self.signals.clone()) else {
			return Err(ChannelError::NotInitialised);
		};
		let Some(protocol) = self.protocol.take() else {
			return Err(ChannelError::AlreadyRunning);
		};
		// A signal left over from a previous run no longer has a waiter.
		self.shared.handoff.cancel();
		self.shared.running.store(true, Ordering::Release);
		let shared = Arc::clone(&self.shared);
		let kind = self.kind;
		let spawned = thread::Builder::new()
			.name(format!("{kind}-link"))
			.spawn(move || link_thread(kind, listener, shared, protocol, signals));
		match spawned {
			Ok(handle) => {
				self.thread = Some(handle);
				Ok(())
			}
			Err(e) => {
				self.shared.running.store(false, Ordering::Release);
				Err(ChannelError::Spawn(e))
			}
		}
	}

	/// Stops the background thread. A throwaway connection unblocks a pending
	/// accept; a blocked read returns within one read timeout.
	#[tracing::instrument(level = "info", skip(self), fields(link = %self.kind))]
	pub fn stop_thread(&mut self) {
		let Some(handle) = self.thread.take() else {
			return;
		};
		self.shared.running.store(false, Ordering::Release);
		let _ = UnixStream::connect(&self.path);
		self.shared.handoff.wake();
		match handle.join() {
			Ok(protocol) => self.protocol = Some(protocol),
			Err(_) => tracing::error!("link thread panicked"),
		}
	}

	pub fn deinit(&mut self) {
		self.stop_thread();
		self.signals = None;
		if self.listener.take().is_some() {
			std::fs::remove_file(&self.path).ok();
		}
	}

	pub fn is_running(&self) -> bool {
		self.thread.is_some()
	}

	pub fn have_client(&self) -> bool {
		self.shared.connected.load(Ordering::Acquire)
	}

	/// Whether an event from this link is waiting for the dispatch loop.
	pub fn is_staged(&self) -> bool {
		self.shared.handoff.is_staged()
	}
}

impl<P: LinkProtocol> Drop for Channel<P> {
	fn drop(&mut self) {
		self.deinit();
	}
}

fn link_thread<P: LinkProtocol>(
	kind: LinkKind,
	listener: Arc<UnixListener>,
	shared: Arc<ChannelShared>,
	mut protocol: P,
	signals: LinkSignalTx,
) -> P {
	let span = tracing::info_span!("link", link = %kind);
	let _span = span.enter();
	shared.handoff.register_waiter();
	while shared.running.load(Ordering::Acquire) {
		let stream = match listener.accept() {
			Ok(_) if !shared.running.load(Ordering::Acquire) => break,
			Ok((stream, _addr)) => stream,
			Err(e) => {
				if !shared.running.load(Ordering::Acquire) {
					break;
				}
				tracing::warn!("accept failed: {e}");
				thread::sleep(ACCEPT_RETRY_DELAY);
				continue;
			}
		};
		let mut conn = match LinkConnection::new(stream) {
			Ok(conn) => conn,
			Err(e) => {
				tracing::warn!("failed to set up client socket: {e}");
				continue;
			}
		};
		tracing::info!("client connected");
		shared.connected.store(true, Ordering::Release);
		protocol.on_connect();
		let keep_running = serve_client(kind, &mut conn, &shared, &mut protocol, &signals);
		shared.connected.store(false, Ordering::Release);
		if !keep_running {
			break;
		}
	}
	tracing::debug!("link thread exiting");
	protocol
}

/// Serves one client until it disconnects. Returns `false` when the whole
/// link should stop.
fn serve_client<P: LinkProtocol>(
	kind: LinkKind,
	conn: &mut LinkConnection,
	shared: &ChannelShared,
	protocol: &mut P,
	signals: &LinkSignalTx,
) -> bool {
	while shared.running.load(Ordering::Acquire) {
		let event = match protocol.next_event(conn) {
			Ok(Some(event)) => event,
			Ok(None) => continue,
			Err(ChannelError::Protocol(ProtocolError::UnexpectedEof)) => {
				tracing::info!("client disconnected");
				return true;
			}
			Err(ChannelError::Protocol(e)) => {
				tracing::warn!("malformed message, dropping client: {e}");
				return true;
			}
			Err(e) => {
				tracing::warn!("link error, dropping client: {e}");
				return true;
			}
		};
		let code = event.code();
		let consumed = shared.handoff.stage();
		if signals.send(LinkSignal::new(kind, event, consumed)).is_err() {
			shared.handoff.cancel();
			tracing::warn!("dispatch loop is gone, stopping link");
			return false;
		}
		tracing::trace!(?code, "event staged");
		if !shared.handoff.wait_consumed(&shared.running) {
			return false;
		}
	}
	false
}
