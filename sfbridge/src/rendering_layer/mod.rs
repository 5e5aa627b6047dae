//! Renderer collaborator: one surface per host window.

pub mod headless;

use std::fmt;

use sfbridge_protocol::{NativeBuffer, PixelFormat};
use thiserror::Error;

pub use headless::{HeadlessBackend, HeadlessSurface};

/// Host window identifier as reported by the windowing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "window#{}", self.0)
	}
}

#[derive(Debug, Error)]
pub enum RenderError {
	#[error("failed to create surface: {0}")]
	CreateSurface(String),
	#[error("invalid buffer: {0}")]
	InvalidBuffer(String),
	#[error("unsupported pixel format {0}")]
	UnsupportedFormat(PixelFormat),
	#[error("no frame to save")]
	NothingToSave,
	#[error("surface is not active")]
	Inactive,
}

pub trait Surface {
	/// Presents `buffer`. The buffer is only borrowed for the call.
	fn render(&mut self, buffer: &NativeBuffer) -> Result<(), RenderError>;
	/// Redraws the saved frame, or a blank one, without consuming a buffer.
	fn dummy_draw(&mut self) -> Result<(), RenderError>;
	/// Keeps the frame currently on screen for later dummy draws.
	fn save_screen(&mut self, format: PixelFormat) -> Result<(), RenderError>;
	/// Whether the host window is shown. Inactive surfaces are not drawn to.
	fn is_active(&self) -> bool;
	fn set_active(&mut self, active: bool);
	fn lost_focus(&mut self);
	fn gained_focus(&mut self);
	fn window_id(&self) -> WindowId;
	fn width(&self) -> u32;
	fn height(&self) -> u32;
}

pub trait SurfaceBackend {
	type Surface: Surface;

	fn create_surface(&mut self, title: &str) -> Result<Self::Surface, RenderError>;
	fn destroy_surface(&mut self, surface: Self::Surface);
}
