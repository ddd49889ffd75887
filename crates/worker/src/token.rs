use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic id allocator shared by clones.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	next: Arc<AtomicU64>,
}

impl GenerationClock {
	/// Creates a new clock whose first id is 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next id.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// Liveness flag for a session or any other closable owner.
///
/// Work that outlives its owner (queued renders, late command results) checks
/// [`is_live`](Self::is_live) before acting and drops itself otherwise.
#[derive(Debug, Clone, Default)]
pub struct LivenessToken {
	cancel: CancellationToken,
}

impl LivenessToken {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns true until [`close`](Self::close) is called on this token or a clone.
	pub fn is_live(&self) -> bool {
		!self.cancel.is_cancelled()
	}

	/// Marks the owner closed. Idempotent.
	pub fn close(&self) {
		self.cancel.cancel();
	}

	/// Future resolving once the owner is closed.
	pub async fn closed(&self) {
		self.cancel.cancelled().await;
	}
}
