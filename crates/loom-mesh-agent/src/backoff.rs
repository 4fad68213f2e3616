// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

/// Exponential backoff with jitter for transient control-plane fetch
/// failures. The delay doubles per failure up to a cap; a successful
/// fetch resets it.
#[derive(Debug)]
pub struct Backoff {
	base: Duration,
	max: Duration,
	current: Duration,
}

impl Backoff {
	pub fn new(base: Duration, max: Duration) -> Self {
		Self {
			base,
			max,
			current: base,
		}
	}

	/// Returns the next delay and advances the schedule. Jitter of up
	/// to half the delay is added so a fleet of agents does not
	/// stampede a recovering control plane.
	pub fn next_delay(&mut self) -> Duration {
		let delay = self.current;
		self.current = (self.current * 2).min(self.max);

		let jitter_ms = fastrand::u64(0..=delay.as_millis() as u64 / 2);
		delay + Duration::from_millis(jitter_ms)
	}

	pub fn reset(&mut self) {
		self.current = self.base;
	}
}

impl Default for Backoff {
	fn default() -> Self {
		Self::new(Duration::from_secs(1), Duration::from_secs(60))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_backoff_doubles_up_to_cap() {
		let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(8));

		let first = backoff.next_delay();
		assert!(first >= Duration::from_secs(1));
		assert!(first < Duration::from_secs(2));

		let second = backoff.next_delay();
		assert!(second >= Duration::from_secs(2));
		assert!(second < Duration::from_secs(3));

		for _ in 0..10 {
			backoff.next_delay();
		}
		let capped = backoff.next_delay();
		assert!(capped >= Duration::from_secs(8));
		assert!(capped <= Duration::from_secs(12));
	}

	#[test]
	fn test_backoff_reset() {
		let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
		backoff.next_delay();
		backoff.next_delay();
		backoff.reset();

		let delay = backoff.next_delay();
		assert!(delay < Duration::from_secs(2));
	}
}
