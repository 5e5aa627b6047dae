use std::fmt;

use thiserror::Error;

/// Host-side finger identifier, unique among the fingers currently down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerId(pub i64);

impl FingerId {
	/// Value for `ABS_MT_TRACKING_ID`; never `-1`, which means "lifted".
	pub fn tracking_id(self) -> i32 {
		(self.0 & 0x7fff_ffff) as i32
	}
}

impl fmt::Display for FingerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "finger#{}", self.0)
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotError {
	#[error("{0} is not bound to a slot")]
	Unbound(FingerId),
}

/// Multi-touch slot table: index is the slot, `None` a free slot.
///
/// Bound fingers are unique. The table only grows by appending when no slot
/// is free and only shrinks by trimming free slots off its tail.
#[derive(Debug, Default, Clone)]
pub struct SlotTable {
	slots: Vec<Option<FingerId>>,
}

impl SlotTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the finger's slot, binding the lowest free one if needed.
	pub fn allocate(&mut self, finger: FingerId) -> usize {
		if let Some(slot) = self.slot_of(finger) {
			return slot;
		}
		match self.slots.iter().position(Option::is_none) {
			Some(free) => {
				self.slots[free] = Some(finger);
				free
			}
			None => {
				self.slots.push(Some(finger));
				self.slots.len() - 1
			}
		}
	}

	/// Frees the finger's slot and returns it. Trailing free slots are
	/// trimmed only when the freed slot was the last one.
	pub fn release(&mut self, finger: FingerId) -> Result<usize, SlotError> {
		let slot = self.slot_of(finger).ok_or(SlotError::Unbound(finger))?;
		self.slots[slot] = None;
		if slot + 1 == self.slots.len() {
			while matches!(self.slots.last(), Some(None)) {
				self.slots.pop();
			}
		}
		Ok(slot)
	}

	pub fn slot_of(&self, finger: FingerId) -> Option<usize> {
		self.slots.iter().position(|bound| *bound == Some(finger))
	}

	pub fn len(&self) -> usize {
		self.slots.len()
	}

	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Currently bound `(slot, finger)` pairs in slot order.
	pub fn bound(&self) -> impl Iterator<Item = (usize, FingerId)> + '_ {
		self.slots
			.iter()
			.enumerate()
			.filter_map(|(slot, finger)| finger.map(|finger| (slot, finger)))
	}
}
