use std::collections::{HashMap, HashSet};

use sfbridge_protocol::{AppNotice, Lifecycle};

use crate::control::ControlRequest;
use crate::rendering_layer::{RenderError, Surface, SurfaceBackend, WindowId};

/// Which surface receives frames and touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Focus {
	Default,
	App(String),
}

#[derive(Debug)]
pub struct WindowEntry<S> {
	pub activity: Option<String>,
	pub surface: S,
}

pub struct WindowManager<B: SurfaceBackend> {
	backend: B,
	default_surface: B::Surface,
	windows: HashMap<String, WindowEntry<B::Surface>>,
	focus: Focus,
	host_focused: bool,
	reserved: HashSet<String>,
}

impl<B: SurfaceBackend> WindowManager<B> {
	pub fn new(mut backend: B, reserved: impl IntoIterator<Item = String>) -> Result<Self, RenderError> {
		let mut default_surface = backend.create_surface("default")?;
		default_surface.gained_focus();
		Ok(Self {
			backend,
			default_surface,
			windows: HashMap::new(),
			focus: Focus::Default,
			host_focused: true,
			reserved: reserved.into_iter().collect(),
		})
	}

	pub fn focus(&self) -> &Focus {
		&self.focus
	}

	pub fn host_focused(&self) -> bool {
		self.host_focused
	}

	pub fn contains(&self, app: &str) -> bool {
		self.windows.contains_key(app)
	}

	pub fn window_count(&self) -> usize {
		self.windows.len()
	}

	pub fn entry(&self, app: &str) -> Option<&WindowEntry<B::Surface>> {
		self.windows.get(app)
	}

	pub fn default_surface(&self) -> &B::Surface {
		&self.default_surface
	}

	pub fn is_reserved(&self, app: &str) -> bool {
		self.reserved.contains(app)
	}

	/// The surface frames and touches currently go to.
	pub fn focused_surface_mut(&mut self) -> &mut B::Surface {
		match &self.focus {
			Focus::App(app) => match self.windows.get_mut(app) {
				Some(entry) => &mut entry.surface,
				None => &mut self.default_surface,
			},
			Focus::Default => &mut self.default_surface,
		}
	}

	pub fn focused_surface(&self) -> &B::Surface {
		match &self.focus {
			Focus::App(app) => self
				.windows
				.get(app)
				.map_or(&self.default_surface, |entry| &entry.surface),
			Focus::Default => &self.default_surface,
		}
	}

	/// Applies an app-lifecycle notice from the mobile OS.
	#[tracing::instrument(level = "info", skip_all, fields(app = %notice.target, lifecycle = ?notice.lifecycle))]
	pub fn handle_notice(&mut self, notice: &AppNotice) -> Result<(), RenderError> {
		let app = notice.target.app_id.as_str();
		if self.is_reserved(app) {
			tracing::debug!("reserved app, ignoring");
			return Ok(());
		}
		match notice.lifecycle {
			Lifecycle::Open => self.open(app, notice.target.activity.clone()),
			Lifecycle::Close => {
				self.close(app);
				Ok(())
			}
		}
	}

	fn open(&mut self, app: &str, activity: Option<String>) -> Result<(), RenderError> {
		if let Some(entry) = self.windows.get_mut(app) {
			if activity.is_some() {
				entry.activity = activity;
			}
			if self.focus != Focus::App(app.to_string()) {
				tracing::info!("refocusing existing window");
				self.set_focus(Focus::App(app.to_string()));
			}
			return Ok(());
		}
		let surface = self.backend.create_surface(app)?;
		tracing::info!(window = %surface.window_id(), "window created");
		self.windows.insert(app.to_string(), WindowEntry { activity, surface });
		self.set_focus(Focus::App(app.to_string()));
		Ok(())
	}

	fn close(&mut self, app: &str) {
		let Some(entry) = self.windows.remove(app) else {
			tracing::debug!("close for unknown app");
			return;
		};
		tracing::info!(window = %entry.surface.window_id(), "window closed");
		self.backend.destroy_surface(entry.surface);
		if self.focus == Focus::App(app.to_string()) {
			self.focus = Focus::Default;
			self.default_surface.gained_focus();
		}
	}

	fn set_focus(&mut self, focus: Focus) {
		if self.focus == focus {
			return;
		}
		let previous = std::mem::replace(&mut self.focus, focus);
		match previous {
			Focus::Default => self.default_surface.lost_focus(),
			Focus::App(app) => {
				if let Some(entry) = self.windows.get_mut(&app) {
					entry.surface.lost_focus();
				}
			}
		}
		self.focused_surface_mut().gained_focus();
	}

	fn app_for_window(&self, window: WindowId) -> Option<&str> {
		self.windows
			.iter()
			.find(|(_, entry)| entry.surface.window_id() == window)
			.map(|(app, _)| app.as_str())
	}

	fn surface_for_window_mut(&mut self, window: WindowId) -> Option<&mut B::Surface> {
		if self.default_surface.window_id() == window {
			return Some(&mut self.default_surface);
		}
		self.windows
			.values_mut()
			.map(|entry| &mut entry.surface)
			.find(|surface| surface.window_id() == window)
	}

	/// Marks a host window as shown or hidden. Returns `false` for windows we
	/// do not own.
	pub fn set_window_visible(&mut self, window: WindowId, visible: bool) -> bool {
		match self.surface_for_window_mut(window) {
			Some(surface) => {
				surface.set_active(visible);
				true
			}
			None => false,
		}
	}

	pub fn is_default_window(&self, window: WindowId) -> bool {
		self.default_surface.window_id() == window
	}

	/// The user focused one of our host windows.
	#[tracing::instrument(level = "debug", skip(self))]
	pub fn host_focus_gained(&mut self, window: WindowId) -> Vec<ControlRequest> {
		if self.is_default_window(window) {
			self.host_focused = true;
			self.set_focus(Focus::Default);
			self.default_surface.gained_focus();
			return vec![ControlRequest::GoHome];
		}
		let Some(app) = self.app_for_window(window).map(str::to_string) else {
			tracing::debug!("focus for unknown window");
			return Vec::new();
		};
		self.host_focused = true;
		self.set_focus(Focus::App(app.clone()));
		self.focused_surface_mut().gained_focus();
		let activity = self.windows.get(&app).and_then(|entry| entry.activity.clone());
		vec![ControlRequest::StartApp { app, activity }]
	}

	/// One of our host windows lost focus to something else.
	#[tracing::instrument(level = "debug", skip(self))]
	pub fn host_focus_lost(&mut self, window: WindowId) -> Vec<ControlRequest> {
		if self.focused_surface().window_id() != window {
			return Vec::new();
		}
		self.host_focused = false;
		self.focused_surface_mut().lost_focus();
		match &self.focus {
			Focus::App(app) => vec![ControlRequest::AppLostFocus { app: app.clone() }],
			Focus::Default => Vec::new(),
		}
	}

	/// The user closed an app's host window. Closing the default window is
	/// left to the caller, which treats it as a request to quit.
	#[tracing::instrument(level = "debug", skip(self))]
	pub fn host_window_closed(&mut self, window: WindowId) -> Vec<ControlRequest> {
		let Some(app) = self.app_for_window(window).map(str::to_string) else {
			return Vec::new();
		};
		let was_focused = self.focus == Focus::App(app.clone());
		self.close(&app);
		let mut requests = vec![ControlRequest::StopApp { app }];
		if was_focused {
			requests.push(ControlRequest::GoHome);
		}
		requests
	}

	/// Destroys every surface, app windows first.
	pub fn shutdown(mut self) {
		for (_, entry) in self.windows.drain() {
			self.backend.destroy_surface(entry.surface);
		}
		self.backend.destroy_surface(self.default_surface);
	}
}
