//! Time source for the retention and reupload windows

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of UTC Unix timestamps in seconds
pub trait Clock: Send + Sync {
	fn now(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> u64 {
		SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
	}
}

/// Settable clock for tests and dry runs
#[derive(Debug, Default)]
pub struct ManualClock {
	now: AtomicU64,
}

impl ManualClock {
	pub fn new(start: u64) -> Self {
		ManualClock { now: AtomicU64::new(start) }
	}

	pub fn set(&self, now: u64) {
		self.now.store(now, Ordering::SeqCst);
	}

	pub fn advance(&self, secs: u64) {
		self.now.fetch_add(secs, Ordering::SeqCst);
	}
}

impl Clock for ManualClock {
	fn now(&self) -> u64 {
		self.now.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_manual_clock() {
		let clock = ManualClock::new(1_000);
		assert_eq!(clock.now(), 1_000);
		clock.advance(59);
		assert_eq!(clock.now(), 1_059);
		clock.set(5);
		assert_eq!(clock.now(), 5);
	}

	#[test]
	fn test_system_clock_is_after_2020() {
		assert!(SystemClock.now() > 1_577_836_800);
	}
}

// vim: ts=4
