use std::time::Duration;

use sfbridge_protocol::{AppNotice, PixelFormat};

use crate::comms::host2dispatch::{HostEvent, HostEventRx};
use crate::comms::link2dispatch::{LinkEvent, LinkSignal, LinkSignalRx};
use crate::control::{AndroidControl, ControlRequest};
use crate::input_layer::{InputSink, TouchInjector, TouchPoint};
use crate::links::{FocusGate, StagedBuffer, StallWatchdog};
use crate::rendering_layer::{Surface, SurfaceBackend, WindowId};
use crate::window_layer::WindowManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	Continue,
	Quit,
}

/// Frame accounting. Heartbeat draws are never counted as frames.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
	pub frames: u64,
	pub failed: u64,
	pub heartbeats: u64,
}

impl FrameStats {
	fn since(&self, earlier: &FrameStats) -> FrameStats {
		FrameStats {
			frames: self.frames - earlier.frames,
			failed: self.failed - earlier.failed,
			heartbeats: self.heartbeats - earlier.heartbeats,
		}
	}
}

/// The single owner of renderer, window, slot and input state.
pub struct Dispatcher<B: SurfaceBackend, I, C> {
	windows: WindowManager<B>,
	touch: TouchInjector<I>,
	control: C,
	watchdog: StallWatchdog,
	focus_gate: FocusGate,
	stats: FrameStats,
	reported: FrameStats,
	rendered_since_heartbeat: bool,
	last_format: Option<PixelFormat>,
}

impl<B, I, C> Dispatcher<B, I, C>
where
	B: SurfaceBackend,
	I: InputSink,
	C: AndroidControl,
{
	pub fn new(
		windows: WindowManager<B>,
		touch: TouchInjector<I>,
		control: C,
		watchdog: StallWatchdog,
		focus_gate: FocusGate,
	) -> Self {
		focus_gate.set(windows.host_focused());
		Self {
			windows,
			touch,
			control,
			watchdog,
			focus_gate,
			stats: FrameStats::default(),
			reported: FrameStats::default(),
			rendered_since_heartbeat: false,
			last_format: None,
		}
	}

	pub fn stats(&self) -> FrameStats {
		self.stats
	}

	pub fn windows(&self) -> &WindowManager<B> {
		&self.windows
	}

	pub fn touch(&self) -> &TouchInjector<I> {
		&self.touch
	}

	pub fn control(&self) -> &C {
		&self.control
	}

	/// Runs until a quit request or until both event sources are gone.
	pub async fn run(&mut self, signals: &mut LinkSignalRx, host: &mut HostEventRx) {
		let mut stats_tick = tokio::time::interval(Duration::from_secs(1));
		let mut host_open = true;
		loop {
			tokio::select! {
				signal = signals.recv() => match signal {
					Some(signal) => self.handle_signal(signal),
					None => {
						tracing::warn!("all links closed");
						return;
					}
				},
				event = host.recv(), if host_open => match event {
					Some(event) => {
						if self.handle_host_event(event) == Flow::Quit {
							tracing::info!("quit requested");
							return;
						}
					}
					None => {
						tracing::debug!("host event channel closed");
						host_open = false;
					}
				},
				_ = stats_tick.tick() => self.report_stats(),
			}
		}
	}

	fn report_stats(&mut self) {
		let delta = self.stats.since(&self.reported);
		if delta != FrameStats::default() {
			tracing::debug!(
				frames = delta.frames,
				failed = delta.failed,
				heartbeats = delta.heartbeats,
				idle_ms = self.watchdog.idle().as_millis() as u64,
				"bridge stats per second"
			);
		}
		self.reported = self.stats;
	}

	/// Consumes one staged link event. The producing link resumes once the
	/// signal is dropped at the end of this call.
	pub fn handle_signal(&mut self, signal: LinkSignal) {
		let (link, event, consumed) = signal.into_parts();
		let span = tracing::trace_span!("link_event", %link, code = ?event.code());
		let _span = span.enter();
		match event {
			LinkEvent::Buffer(buffer) => self.on_buffer(buffer),
			LinkEvent::NoBuffer { waited } => self.on_no_buffer(waited),
			LinkEvent::App(notice) => self.on_app_notice(&notice),
			LinkEvent::Sensor(frame) => tracing::trace!(len = frame.0.len(), "sensor frame"),
		}
		drop(consumed);
	}

	fn on_buffer(&mut self, buffer: StagedBuffer) {
		self.watchdog.reset();
		let format = buffer.info().format;
		let surface = self.windows.focused_surface_mut();
		let failed = if !surface.is_active() {
			tracing::trace!(window = %surface.window_id(), "surface hidden, dropping frame");
			true
		} else {
			match surface.render(buffer.buffer()) {
				Ok(()) => false,
				Err(e) => {
					tracing::warn!("render failed: {e}");
					true
				}
			}
		};
		if failed {
			self.stats.failed += 1;
		} else {
			self.stats.frames += 1;
			self.rendered_since_heartbeat = true;
			self.last_format = Some(format);
		}
		if let Err(e) = buffer.release(failed) {
			tracing::warn!("failed to release buffer: {e}");
		}
	}

	fn on_no_buffer(&mut self, waited: Duration) {
		if self.watchdog.record_idle(waited) {
			self.heartbeat();
		}
		if self.windows.host_focused() {
			self.request(ControlRequest::WakeUp);
		}
	}

	/// Redraws what is on screen so the host does not treat us as hung.
	fn heartbeat(&mut self) {
		let surface = self.windows.focused_surface_mut();
		if self.rendered_since_heartbeat {
			if let Some(format) = self.last_format
				&& let Err(e) = surface.save_screen(format)
			{
				tracing::debug!("could not save screen: {e}");
			}
			self.rendered_since_heartbeat = false;
		}
		if !surface.is_active() {
			return;
		}
		match surface.dummy_draw() {
			Ok(()) => self.stats.heartbeats += 1,
			Err(e) => tracing::warn!("heartbeat draw failed: {e}"),
		}
	}

	fn on_app_notice(&mut self, notice: &AppNotice) {
		let before = self.windows.focused_surface().window_id();
		if let Err(e) = self.windows.handle_notice(notice) {
			tracing::error!(app = %notice.target, "failed to apply app notice: {e}");
		}
		if self.windows.focused_surface().window_id() != before {
			self.lift_fingers();
		}
	}

	pub fn handle_host_event(&mut self, event: HostEvent) -> Flow {
		match event {
			HostEvent::Quit => return Flow::Quit,
			HostEvent::FocusGained { window } => {
				let requests = self.windows.host_focus_gained(window);
				if self.windows.host_focused() && !self.focus_gate.is_focused() {
					self.focus_gate.set(true);
					self.request(ControlRequest::WakeUp);
				}
				self.requests(requests);
			}
			HostEvent::FocusLost { window } => {
				let requests = self.windows.host_focus_lost(window);
				if !self.windows.host_focused() {
					self.focus_gate.set(false);
					self.lift_fingers();
				}
				self.requests(requests);
			}
			HostEvent::WindowClosed { window } => return self.on_window_closed(window),
			HostEvent::Visibility { window, visible } => {
				if !self.windows.set_window_visible(window, visible) {
					tracing::debug!(%window, "visibility change for unknown window");
				}
			}
			HostEvent::Touch(point) => self.on_touch(&point),
		}
		Flow::Continue
	}

	fn on_window_closed(&mut self, window: WindowId) -> Flow {
		if self.windows.is_default_window(window) {
			return Flow::Quit;
		}
		let requests = self.windows.host_window_closed(window);
		if !requests.is_empty() {
			self.lift_fingers();
		}
		self.requests(requests);
		Flow::Continue
	}

	fn on_touch(&mut self, point: &TouchPoint) {
		if !self.windows.host_focused() {
			tracing::trace!("touch without host focus, dropping");
			return;
		}
		let surface = self.windows.focused_surface();
		let (width, height) = (surface.width(), surface.height());
		if let Err(e) = self.touch.handle(point, width, height) {
			tracing::warn!("failed to inject touch: {e}");
		}
	}

	fn lift_fingers(&mut self) {
		if let Err(e) = self.touch.lift_all() {
			tracing::warn!("failed to lift fingers: {e}");
		}
	}

	fn request(&mut self, request: ControlRequest) {
		if let Err(e) = self.control.send(request) {
			tracing::warn!("control request failed: {e}");
		}
	}

	fn requests(&mut self, requests: Vec<ControlRequest>) {
		for request in requests {
			self.request(request);
		}
	}

	pub fn shutdown(mut self) {
		self.lift_fingers();
		self.windows.shutdown();
	}
}
