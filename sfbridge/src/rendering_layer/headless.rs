use sfbridge_protocol::{BufferInfo, NativeBuffer, PixelFormat};

use super::{RenderError, Surface, SurfaceBackend, WindowId};

/// Backend without a display server: validates and accounts for frames.
#[derive(Debug)]
pub struct HeadlessBackend {
	width: u32,
	height: u32,
	next_id: u32,
}

impl HeadlessBackend {
	pub fn new(width: u32, height: u32) -> Self {
		Self {
			width,
			height,
			next_id: 1,
		}
	}
}

impl SurfaceBackend for HeadlessBackend {
	type Surface = HeadlessSurface;

	#[tracing::instrument(level = "debug", skip(self))]
	fn create_surface(&mut self, title: &str) -> Result<HeadlessSurface, RenderError> {
		if self.width == 0 || self.height == 0 {
			return Err(RenderError::CreateSurface(format!(
				"{}x{} is not a usable size",
				self.width, self.height
			)));
		}
		let id = WindowId(self.next_id);
		self.next_id += 1;
		tracing::debug!(window = %id, "surface created");
		Ok(HeadlessSurface {
			id,
			title: title.to_string(),
			width: self.width,
			height: self.height,
			active: true,
			focused: false,
			frames: 0,
			heartbeats: 0,
			last_frame: None,
			saved_frame: None,
		})
	}

	fn destroy_surface(&mut self, surface: HeadlessSurface) {
		tracing::debug!(
			window = %surface.id,
			title = %surface.title,
			frames = surface.frames,
			"surface destroyed"
		);
	}
}

#[derive(Debug)]
pub struct HeadlessSurface {
	id: WindowId,
	title: String,
	width: u32,
	height: u32,
	active: bool,
	focused: bool,
	frames: u64,
	heartbeats: u64,
	last_frame: Option<BufferInfo>,
	saved_frame: Option<BufferInfo>,
}

impl HeadlessSurface {
	pub fn frames(&self) -> u64 {
		self.frames
	}

	pub fn heartbeats(&self) -> u64 {
		self.heartbeats
	}

	pub fn is_focused(&self) -> bool {
		self.focused
	}

	pub fn saved_frame(&self) -> Option<&BufferInfo> {
		self.saved_frame.as_ref()
	}
}

fn validate(buffer: &NativeBuffer) -> Result<(), RenderError> {
	let info = &buffer.info;
	if info.width <= 0 || info.height <= 0 {
		return Err(RenderError::InvalidBuffer(format!(
			"size {}x{}",
			info.width, info.height
		)));
	}
	if info.stride < info.width {
		return Err(RenderError::InvalidBuffer(format!(
			"stride {} below width {}",
			info.stride, info.width
		)));
	}
	if info.format.bytes_per_pixel().is_none() {
		return Err(RenderError::UnsupportedFormat(info.format));
	}
	if buffer.handle.num_fds() == 0 {
		return Err(RenderError::InvalidBuffer("no memory descriptors".into()));
	}
	Ok(())
}

impl Surface for HeadlessSurface {
	fn render(&mut self, buffer: &NativeBuffer) -> Result<(), RenderError> {
		if !self.active {
			return Err(RenderError::Inactive);
		}
		validate(buffer)?;
		self.last_frame = Some(buffer.info);
		self.frames += 1;
		Ok(())
	}

	fn dummy_draw(&mut self) -> Result<(), RenderError> {
		if !self.active {
			return Err(RenderError::Inactive);
		}
		self.heartbeats += 1;
		match &self.saved_frame {
			Some(frame) => tracing::trace!(window = %self.id, format = %frame.format, "redrawing saved frame"),
			None => tracing::trace!(window = %self.id, "drawing blank frame"),
		}
		Ok(())
	}

	fn save_screen(&mut self, format: PixelFormat) -> Result<(), RenderError> {
		let frame = self.last_frame.ok_or(RenderError::NothingToSave)?;
		self.saved_frame = Some(BufferInfo { format, ..frame });
		Ok(())
	}

	fn is_active(&self) -> bool {
		self.active
	}

	fn set_active(&mut self, active: bool) {
		if self.active != active {
			tracing::debug!(window = %self.id, active, "surface activity changed");
		}
		self.active = active;
	}

	fn lost_focus(&mut self) {
		self.focused = false;
	}

	fn gained_focus(&mut self) {
		self.focused = true;
	}

	fn window_id(&self) -> WindowId {
		self.id
	}

	fn width(&self) -> u32 {
		self.width
	}

	fn height(&self) -> u32 {
		self.height
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sfbridge_protocol::NativeHandle;
	use std::fs::File;
	use std::os::fd::OwnedFd;

	fn buffer(width: i32, format: PixelFormat, fds: usize) -> NativeBuffer {
		let fds = (0..fds)
			.map(|_| OwnedFd::from(File::open("/dev/null").unwrap()))
			.collect();
		NativeBuffer {
			info: BufferInfo {
				width,
				height: 4,
				stride: width,
				format,
			},
			handle: NativeHandle::new(fds, vec![]),
		}
	}

	#[test]
	fn surfaces_get_distinct_ids() {
		let mut backend = HeadlessBackend::new(720, 1280);
		let a = backend.create_surface("default").unwrap();
		let b = backend.create_surface("com.a").unwrap();
		assert_ne!(a.window_id(), b.window_id());
		assert_eq!((b.width(), b.height()), (720, 1280));
	}

	#[test]
	fn render_validates_descriptors() {
		let mut surface = HeadlessBackend::new(4, 4).create_surface("t").unwrap();
		assert!(surface.render(&buffer(4, PixelFormat::RGBA_8888, 1)).is_ok());
		assert!(matches!(
			surface.render(&buffer(4, PixelFormat(99), 1)),
			Err(RenderError::UnsupportedFormat(_))
		));
		assert!(surface.render(&buffer(0, PixelFormat::RGBA_8888, 1)).is_err());
		assert!(surface.render(&buffer(4, PixelFormat::RGBA_8888, 0)).is_err());
		assert_eq!(surface.frames(), 1);
	}

	#[test]
	fn save_screen_needs_a_frame() {
		let mut surface = HeadlessBackend::new(4, 4).create_surface("t").unwrap();
		assert!(matches!(
			surface.save_screen(PixelFormat::RGBA_8888),
			Err(RenderError::NothingToSave)
		));
		surface.render(&buffer(4, PixelFormat::RGBX_8888, 1)).unwrap();
		surface.save_screen(PixelFormat::RGBA_8888).unwrap();
		assert_eq!(surface.saved_frame().unwrap().format, PixelFormat::RGBA_8888);
		surface.dummy_draw().unwrap();
		assert_eq!(surface.heartbeats(), 1);
		assert_eq!(surface.frames(), 1);
	}

	#[test]
	fn inactive_surface_refuses_to_draw() {
		let mut surface = HeadlessBackend::new(4, 4).create_surface("t").unwrap();
		surface.set_active(false);
		assert!(matches!(
			surface.render(&buffer(4, PixelFormat::RGBA_8888, 1)),
			Err(RenderError::Inactive)
		));
		assert!(matches!(surface.dummy_draw(), Err(RenderError::Inactive)));
		surface.set_active(true);
		assert!(surface.render(&buffer(4, PixelFormat::RGBA_8888, 1)).is_ok());
		assert_eq!(surface.frames(), 1);
		assert_eq!(surface.heartbeats(), 0);
	}

	#[test]
	fn zero_sized_backend_cannot_create_surfaces() {
		assert!(HeadlessBackend::new(0, 10).create_surface("t").is_err());
	}
}
