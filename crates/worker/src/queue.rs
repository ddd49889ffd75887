//! Single-threaded FIFO work queue.
//!
//! A [`WorkQueue`] owns one dedicated OS thread that runs submitted jobs one
//! at a time, in exactly the order they were submitted. Submission never
//! blocks, so producers may submit while holding their own locks to pin down
//! delivery order.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::registry::{WorkerRecord, WorkerRegistry};
use crate::{TaskClass, panic_message, spawn_named_thread};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
	Job(Job),
	/// Acknowledged once every earlier message has been processed. Not counted as a job.
	Barrier(std::sync::mpsc::SyncSender<()>),
}

/// Work queue failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
	/// The queue was shut down.
	#[error("work queue is closed")]
	Closed,
	/// A flush was requested from a job running on the queue itself.
	#[error("cannot flush a work queue from its own thread")]
	FlushFromQueue,
}

#[derive(Debug, Default)]
struct QueueStats {
	submitted: AtomicU64,
	completed: AtomicU64,
	panicked: AtomicU64,
	last_panic: Mutex<Option<String>>,
}

struct QueueInner {
	name: String,
	class: TaskClass,
	tx: Mutex<Option<mpsc::UnboundedSender<Message>>>,
	thread: Mutex<Option<JoinHandle<()>>>,
	thread_id: ThreadId,
	stats: Arc<QueueStats>,
	registry: Option<WorkerRegistry>,
}

/// Handle to a single-threaded FIFO job runner. Clones share the same queue.
#[derive(Clone)]
pub struct WorkQueue {
	inner: Arc<QueueInner>,
}

impl std::fmt::Debug for WorkQueue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorkQueue")
			.field("name", &self.inner.name)
			.field("class", &self.inner.class)
			.field("closed", &self.is_closed())
			.finish()
	}
}

impl WorkQueue {
	/// Starts a queue thread named `name`.
	pub fn new(name: impl Into<String>, class: TaskClass) -> std::io::Result<Self> {
		Self::start(name.into(), class, None)
	}

	/// Starts a queue thread that publishes its counters into `registry`.
	pub fn with_registry(name: impl Into<String>, class: TaskClass, registry: WorkerRegistry) -> std::io::Result<Self> {
		Self::start(name.into(), class, Some(registry))
	}

	fn start(name: String, class: TaskClass, registry: Option<WorkerRegistry>) -> std::io::Result<Self> {
		let (tx, rx) = mpsc::unbounded_channel();
		let stats = Arc::new(QueueStats::default());

		let thread = {
			let name = name.clone();
			let stats = Arc::clone(&stats);
			let registry = registry.clone();
			spawn_named_thread(class, name.clone(), move || run_queue(name, class, rx, stats, registry))?
		};
		let thread_id = thread.thread().id();

		tracing::debug!(queue = %name, worker_class = class.as_str(), "worker.queue.start");
		let queue = Self {
			inner: Arc::new(QueueInner {
				name,
				class,
				tx: Mutex::new(Some(tx)),
				thread: Mutex::new(Some(thread)),
				thread_id,
				stats,
				registry,
			}),
		};
		queue.publish();
		Ok(queue)
	}

	/// Returns the queue name.
	pub fn name(&self) -> &str {
		&self.inner.name
	}

	/// Enqueues a job. Never blocks.
	pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), QueueError> {
		let guard = self.inner.tx.lock();
		let Some(tx) = guard.as_ref() else {
			return Err(QueueError::Closed);
		};
		let submitted = self.inner.stats.submitted.fetch_add(1, Ordering::AcqRel) + 1;
		if tx.send(Message::Job(Box::new(job))).is_err() {
			self.inner.stats.submitted.fetch_sub(1, Ordering::AcqRel);
			return Err(QueueError::Closed);
		}
		tracing::trace!(queue = %self.inner.name, submitted, "worker.queue.submit");
		Ok(())
	}

	/// Returns true when called from a job running on this queue.
	pub fn is_current(&self) -> bool {
		std::thread::current().id() == self.inner.thread_id
	}

	/// Blocks until every job submitted before this call has finished.
	///
	/// Must not be called from inside an async runtime worker or from a job on
	/// this queue.
	pub fn flush_blocking(&self) -> Result<(), QueueError> {
		if self.is_current() {
			return Err(QueueError::FlushFromQueue);
		}
		let (ack_tx, ack_rx) = std::sync::mpsc::sync_channel(1);
		{
			let guard = self.inner.tx.lock();
			let Some(tx) = guard.as_ref() else {
				return Err(QueueError::Closed);
			};
			tx.send(Message::Barrier(ack_tx)).map_err(|_| QueueError::Closed)?;
		}
		ack_rx.recv().map_err(|_| QueueError::Closed)
	}

	/// Closes the queue and waits for already submitted jobs to finish.
	///
	/// Later submissions fail with [`QueueError::Closed`]. Idempotent. When
	/// called from the queue's own thread the queue is closed without joining.
	pub fn shutdown(&self) {
		let tx = self.inner.tx.lock().take();
		if tx.is_none() {
			return;
		}
		drop(tx);
		tracing::debug!(queue = %self.inner.name, "worker.queue.shutdown");
		if self.is_current() {
			return;
		}
		let handle = self.inner.thread.lock().take();
		if let Some(handle) = handle
			&& handle.join().is_err()
		{
			tracing::error!(queue = %self.inner.name, "worker.queue.thread_panicked");
		}
	}

	/// Returns true once [`shutdown`](Self::shutdown) has been called.
	pub fn is_closed(&self) -> bool {
		self.inner.tx.lock().is_none()
	}

	/// Returns a snapshot of the queue counters.
	pub fn record(&self) -> WorkerRecord {
		snapshot(&self.inner.name, self.inner.class, &self.inner.stats)
	}

	fn publish(&self) {
		if let Some(registry) = &self.inner.registry {
			registry.upsert(self.record());
		}
	}
}

fn snapshot(name: &str, class: TaskClass, stats: &QueueStats) -> WorkerRecord {
	WorkerRecord {
		name: name.to_string(),
		class,
		submitted: stats.submitted.load(Ordering::Acquire),
		completed: stats.completed.load(Ordering::Acquire),
		panicked: stats.panicked.load(Ordering::Acquire),
		last_panic: stats.last_panic.lock().clone(),
	}
}

fn run_queue(name: String, class: TaskClass, mut rx: mpsc::UnboundedReceiver<Message>, stats: Arc<QueueStats>, registry: Option<WorkerRegistry>) {
	while let Some(message) = rx.blocking_recv() {
		match message {
			Message::Job(job) => {
				match catch_unwind(AssertUnwindSafe(job)) {
					Ok(()) => {
						stats.completed.fetch_add(1, Ordering::AcqRel);
					}
					Err(payload) => {
						let message = panic_message(payload.as_ref());
						tracing::error!(queue = %name, panic = %message, "worker.queue.job_panicked");
						*stats.last_panic.lock() = Some(message);
						stats.panicked.fetch_add(1, Ordering::AcqRel);
					}
				}
				if let Some(registry) = &registry {
					registry.upsert(snapshot(&name, class, &stats));
				}
			}
			Message::Barrier(ack) => {
				let _ = ack.send(());
			}
		}
	}
	tracing::debug!(queue = %name, "worker.queue.stopped");
}
