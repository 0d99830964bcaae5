//! Trailing-edge debounce for buffer edits.
//!
//! Every edit restarts the quiet period. When it elapses without further
//! edits, the controller sends the buffer as it is at that moment, so a burst
//! of keystrokes costs one request.

use std::time::Duration;

use tokio::time::Instant;

/// Tracks whether an edit is waiting to be sent.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PendingEdit {
	last_edit_at: Option<Instant>,
}

impl PendingEdit {
	/// Records an edit at `now`.
	pub(crate) fn touch(&mut self, now: Instant) {
		self.last_edit_at = Some(now);
	}

	/// When the pending edit becomes due, if any.
	pub(crate) fn deadline(&self, debounce: Duration) -> Option<Instant> {
		self.last_edit_at.map(|at| at + debounce)
	}

	pub(crate) fn is_due(&self, now: Instant, debounce: Duration) -> bool {
		self.deadline(debounce).is_some_and(|deadline| now >= deadline)
	}

	pub(crate) fn is_pending(&self) -> bool {
		self.last_edit_at.is_some()
	}

	pub(crate) fn clear(&mut self) {
		self.last_edit_at = None;
	}
}
