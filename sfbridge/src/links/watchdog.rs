use std::time::Duration;

/// Accumulates producer idle time and fires once per threshold crossing.
///
/// Only the time the display link actually spent waiting is counted, so the
/// threshold holds regardless of how the per-read timeout is tuned.
#[derive(Debug, Clone)]
pub struct StallWatchdog {
	threshold: Duration,
	idle: Duration,
}

impl StallWatchdog {
	pub fn new(threshold: Duration) -> Self {
		Self {
			threshold,
			idle: Duration::ZERO,
		}
	}

	/// Adds one idle period. Returns `true` when the accumulated idle time
	/// reached the threshold, in which case the counter starts over.
	pub fn record_idle(&mut self, waited: Duration) -> bool {
		self.idle = self.idle.saturating_add(waited);
		if self.idle >= self.threshold {
			self.idle = Duration::ZERO;
			return true;
		}
		false
	}

	/// A real frame arrived: the producer is alive.
	pub fn reset(&mut self) {
		self.idle = Duration::ZERO;
	}

	pub fn idle(&self) -> Duration {
		self.idle
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fires_exactly_once_per_crossing() {
		let mut watchdog = StallWatchdog::new(Duration::from_millis(1000));
		let fired: Vec<bool> = (0..10)
			.map(|_| watchdog.record_idle(Duration::from_millis(250)))
			.collect();
		assert_eq!(
			fired,
			[false, false, false, true, false, false, false, true, false, false]
		);
		assert_eq!(watchdog.idle(), Duration::from_millis(500));
	}

	#[test]
	fn uneven_waits_count_actual_time() {
		let mut watchdog = StallWatchdog::new(Duration::from_secs(1));
		assert!(!watchdog.record_idle(Duration::from_millis(900)));
		assert!(watchdog.record_idle(Duration::from_millis(100)));
		assert_eq!(watchdog.idle(), Duration::ZERO);
	}

	#[test]
	fn real_frame_resets_the_count() {
		let mut watchdog = StallWatchdog::new(Duration::from_secs(1));
		assert!(!watchdog.record_idle(Duration::from_millis(800)));
		watchdog.reset();
		assert!(!watchdog.record_idle(Duration::from_millis(800)));
	}
}
