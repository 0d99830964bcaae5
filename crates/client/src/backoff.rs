//! Reconnect delay schedule.

use std::time::Duration;

use serde::Deserialize;

/// Lower bound on any reconnect delay, whatever the configured values.
pub const MIN_DELAY: Duration = Duration::from_millis(100);

/// Exponential backoff between reconnection attempts.
///
/// Attempt `n` (zero-based) waits `initial * factor^n`, capped at `max` and
/// never shorter than [`MIN_DELAY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffPolicy {
	/// Delay before the first retry, in milliseconds.
	pub initial_ms: u64,
	/// Upper bound on any delay, in milliseconds.
	pub max_ms: u64,
	/// Growth factor per consecutive failure.
	pub factor: u32,
}

impl Default for BackoffPolicy {
	fn default() -> Self {
		Self {
			initial_ms: 1_000,
			max_ms: 30_000,
			factor: 2,
		}
	}
}

impl BackoffPolicy {
	/// Delay before retry number `attempt`.
	pub fn delay(&self, attempt: u32) -> Duration {
		let floor = MIN_DELAY.as_millis() as u64;
		let initial = self.initial_ms.max(floor);
		let factor = u64::from(self.factor.max(1));
		let cap = self.max_ms.max(initial);
		let ms = factor
			.checked_pow(attempt)
			.and_then(|m| initial.checked_mul(m))
			.map_or(cap, |ms| ms.min(cap));
		Duration::from_millis(ms)
	}
}
