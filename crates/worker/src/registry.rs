use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::TaskClass;

/// Snapshot for one registered work queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
	pub name: String,
	pub class: TaskClass,
	pub submitted: u64,
	pub completed: u64,
	pub panicked: u64,
	pub last_panic: Option<String>,
}

impl WorkerRecord {
	/// Jobs submitted but not yet finished.
	pub fn pending(&self) -> u64 {
		self.submitted.saturating_sub(self.completed + self.panicked)
	}
}

/// In-memory registry of work queue status snapshots.
#[derive(Debug, Default, Clone)]
pub struct WorkerRegistry {
	inner: Arc<RwLock<HashMap<String, WorkerRecord>>>,
}

impl WorkerRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Upserts one record.
	pub fn upsert(&self, record: WorkerRecord) {
		if let Ok(mut guard) = self.inner.write() {
			guard.insert(record.name.clone(), record);
		}
	}

	/// Removes one record.
	pub fn remove(&self, name: &str) {
		if let Ok(mut guard) = self.inner.write() {
			guard.remove(name);
		}
	}

	/// Returns the record for `name`, if registered.
	pub fn get(&self, name: &str) -> Option<WorkerRecord> {
		self.inner.read().ok()?.get(name).cloned()
	}

	/// Returns snapshots sorted by name.
	pub fn snapshots(&self) -> Vec<WorkerRecord> {
		let Ok(guard) = self.inner.read() else {
			return Vec::new();
		};
		let mut records: Vec<_> = guard.values().cloned().collect();
		records.sort_by(|a, b| a.name.cmp(&b.name));
		records
	}
}
