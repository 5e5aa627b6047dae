use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, Thread};
use std::time::Duration;

const PARK_SLICE: Duration = Duration::from_millis(50);

/// Single-slot handoff between a link thread and the dispatch loop.
///
/// At most one event per link is outstanding: the link thread stages an
/// event, posts it, then parks until the [`Consumed`] token travelling with
/// the event is dropped.
#[derive(Debug, Default)]
pub struct Handoff {
	staged: AtomicBool,
	waiter: Mutex<Option<Thread>>,
}

impl Handoff {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Registers the calling thread as the one parked while an event is staged.
	pub fn register_waiter(&self) {
		if let Ok(mut waiter) = self.waiter.lock() {
			*waiter = Some(thread::current());
		}
	}

	pub fn stage(self: &Arc<Self>) -> Consumed {
		let was_staged = self.staged.swap(true, Ordering::AcqRel);
		debug_assert!(!was_staged, "staged a second event before the first was consumed");
		Consumed {
			handoff: Some(Arc::clone(self)),
		}
	}

	pub fn is_staged(&self) -> bool {
		self.staged.load(Ordering::Acquire)
	}

	/// Parks until the staged event is consumed. Returns `false` if `running`
	/// was cleared first.
	pub fn wait_consumed(&self, running: &AtomicBool) -> bool {
		while self.is_staged() {
			if !running.load(Ordering::Acquire) {
				return false;
			}
			thread::park_timeout(PARK_SLICE);
		}
		true
	}

	/// Clears the slot without waiting for the consumer, used when posting failed.
	pub fn cancel(&self) {
		self.staged.store(false, Ordering::Release);
	}

	pub fn wake(&self) {
		if let Ok(waiter) = self.waiter.lock()
			&& let Some(waiter) = waiter.as_ref()
		{
			waiter.unpark();
		}
	}
}

/// Token that frees the handoff slot when dropped.
#[derive(Debug)]
pub struct Consumed {
	handoff: Option<Arc<Handoff>>,
}

impl Consumed {
	#[cfg(test)]
	pub(crate) fn detached() -> Self {
		Self { handoff: None }
	}
}

impl Drop for Consumed {
	fn drop(&mut self) {
		if let Some(handoff) = self.handoff.take() {
			handoff.staged.store(false, Ordering::Release);
			handoff.wake();
		}
	}
}
