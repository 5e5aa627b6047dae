//! Host touch reflection: finger ids are mapped onto multi-touch slots and
//! written to the virtual input device.

pub mod slots;
pub mod uinput;

pub use slots::{FingerId, SlotError, SlotTable};
pub use uinput::{EvdevWriter, InputError, InputSink, NullSink};

use uinput::{
	ABS_MT_POSITION_X, ABS_MT_POSITION_Y, ABS_MT_PRESSURE, ABS_MT_SLOT, ABS_MT_TRACKING_ID, EV_ABS,
	EV_SYN, SYN_REPORT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
	Down,
	Motion,
	Up,
}

/// One host touch update. Coordinates and pressure are normalised to `0..=1`.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchPoint {
	pub phase: TouchPhase,
	pub finger: FingerId,
	pub x: f32,
	pub y: f32,
	pub pressure: f32,
}

/// Owns the slot table and the input sink; only the dispatch loop holds one.
pub struct TouchInjector<I> {
	sink: I,
	slots: SlotTable,
	max_pressure: i32,
}

impl<I: InputSink> TouchInjector<I> {
	pub fn new(sink: I, max_pressure: i32) -> Self {
		Self {
			sink,
			slots: SlotTable::new(),
			max_pressure,
		}
	}

	pub fn slots(&self) -> &SlotTable {
		&self.slots
	}

	pub fn sink(&self) -> &I {
		&self.sink
	}

	/// Injects one touch update scaled to a `width` x `height` surface.
	pub fn handle(&mut self, point: &TouchPoint, width: u32, height: u32) -> Result<(), InputError> {
		match point.phase {
			TouchPhase::Down | TouchPhase::Motion => {
				let slot = self.slots.allocate(point.finger);
				self.emit_abs(ABS_MT_SLOT, slot as i32)?;
				self.emit_abs(ABS_MT_TRACKING_ID, point.finger.tracking_id())?;
				self.emit_abs(ABS_MT_POSITION_X, scale(point.x, width))?;
				self.emit_abs(ABS_MT_POSITION_Y, scale(point.y, height))?;
				let pressure = (point.pressure.clamp(0.0, 1.0) * self.max_pressure as f32).round();
				self.emit_abs(ABS_MT_PRESSURE, pressure as i32)?;
				self.sync()
			}
			TouchPhase::Up => match self.slots.release(point.finger) {
				Ok(slot) => self.lift(slot),
				Err(e) => {
					tracing::error!("touch bookkeeping bug, skipping finger up: {e}");
					Ok(())
				}
			},
		}
	}

	/// Lifts every finger still down, e.g. when host focus goes away.
	pub fn lift_all(&mut self) -> Result<(), InputError> {
		let bound: Vec<_> = self.slots.bound().collect();
		for (_, finger) in bound {
			if let Ok(slot) = self.slots.release(finger) {
				self.lift(slot)?;
			}
		}
		Ok(())
	}

	fn lift(&mut self, slot: usize) -> Result<(), InputError> {
		self.emit_abs(ABS_MT_SLOT, slot as i32)?;
		self.emit_abs(ABS_MT_TRACKING_ID, -1)?;
		self.sync()
	}

	fn emit_abs(&mut self, code: u16, value: i32) -> Result<(), InputError> {
		self.sink.send_event(EV_ABS, code, value)
	}

	fn sync(&mut self) -> Result<(), InputError> {
		self.sink.send_event(EV_SYN, SYN_REPORT, 0)
	}
}

fn scale(normalised: f32, extent: u32) -> i32 {
	let max = extent.saturating_sub(1) as f32;
	(normalised.clamp(0.0, 1.0) * max).round() as i32
}
