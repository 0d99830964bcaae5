//! Vocabulary size holder.

use tokio::sync::watch;
use toksync_proto::VocabCount;

/// Last known size of the service vocabulary.
///
/// Writes replace the value; there is no merging. Subscribers are only woken
/// when the value actually changes.
#[derive(Debug)]
pub struct VocabState {
	tx: watch::Sender<VocabCount>,
}

impl Default for VocabState {
	fn default() -> Self {
		Self::new()
	}
}

impl VocabState {
	/// Starts at zero, meaning "not yet known".
	pub fn new() -> Self {
		let (tx, _) = watch::channel(VocabCount::default());
		Self { tx }
	}

	/// Replaces the stored size. Returns true if it changed.
	pub fn set(&self, count: VocabCount) -> bool {
		self.tx.send_if_modified(|current| {
			if *current == count {
				return false;
			}
			*current = count;
			true
		})
	}

	/// Current size.
	pub fn get(&self) -> VocabCount {
		*self.tx.borrow()
	}

	/// Subscribes to changes.
	pub fn subscribe(&self) -> watch::Receiver<VocabCount> {
		self.tx.subscribe()
	}
}
