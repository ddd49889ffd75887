use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use vitrine_primitives::EntityKey;
use vitrine_worker::WorkQueue;

use crate::record::{FieldSet, PartialState, StateRecord};
use crate::subscription::{Disposer, Scope, SubscriptionRegistry};

/// Builds the default record for an entity seen for the first time.
pub type InitialState = Arc<dyn Fn(&EntityKey) -> StateRecord + Send + Sync>;

/// How an update's notification reaches subscribers.
#[derive(Debug, Clone)]
pub enum Dispatch {
	/// Run callbacks on the updating thread once the merge is done.
	///
	/// Updates from other threads wait until the fan-out finished, so
	/// callbacks must be quick and must not wait on other updaters. An update
	/// made from inside a callback is merged at once, but its fan-out runs
	/// after the current one completes.
	Inline,
	/// Hand the fan-out to a FIFO work queue, enqueued while the store lock is held.
	Queued(WorkQueue),
}

/// Fan-outs waiting behind the one running on the delivering thread.
#[derive(Default)]
struct InlineDelivery {
	draining: bool,
	pending: VecDeque<(EntityKey, FieldSet, Arc<StateRecord>)>,
}

/// Process-wide keyed state with change notification.
pub struct StateStore {
	records: Mutex<HashMap<EntityKey, Arc<StateRecord>>>,
	/// Serializes merge plus fan-out for [`Dispatch::Inline`]. Reentrant so
	/// callbacks may update the store again.
	delivery: ReentrantMutex<RefCell<InlineDelivery>>,
	initial: InitialState,
	subscriptions: SubscriptionRegistry,
	dispatch: Dispatch,
}

impl std::fmt::Debug for StateStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StateStore")
			.field("entities", &self.len())
			.field("subscriptions", &self.subscriptions.len())
			.field("dispatch", &self.dispatch)
			.finish()
	}
}

impl Default for StateStore {
	fn default() -> Self {
		Self::new()
	}
}

impl StateStore {
	/// Creates a store with empty default records and inline dispatch.
	pub fn new() -> Self {
		Self::builder().build()
	}

	pub fn builder() -> StateStoreBuilder {
		StateStoreBuilder::default()
	}

	/// Merges `partial` into the record for `key` and notifies matching subscribers.
	///
	/// The record is created from the initial state first if `key` was never
	/// seen. Subscribers receive the snapshot taken right after this merge and
	/// the names of the fields `partial` carried.
	pub fn update(&self, key: &EntityKey, partial: PartialState) {
		let updated = partial.field_set();
		tracing::trace!(entity = %key, fields = updated.len(), "store.update");

		match &self.dispatch {
			Dispatch::Inline => {
				let delivery = self.delivery.lock();
				let snapshot = {
					let mut records = self.records.lock();
					self.merge_locked(&mut records, key, partial)
				};
				{
					let mut state = delivery.borrow_mut();
					state.pending.push_back((key.clone(), updated, snapshot));
					if state.draining {
						tracing::trace!(entity = %key, "store.notify_deferred");
						return;
					}
					state.draining = true;
				}
				loop {
					let next = delivery.borrow_mut().pending.pop_front();
					let Some((entity, fields, snapshot)) = next else {
						break;
					};
					self.subscriptions.notify(&entity, &fields, &snapshot);
				}
				delivery.borrow_mut().draining = false;
			}
			Dispatch::Queued(queue) => {
				let mut records = self.records.lock();
				let snapshot = self.merge_locked(&mut records, key, partial);
				let subscriptions = self.subscriptions.clone();
				let entity = key.clone();
				let submitted = queue.submit(move || {
					subscriptions.notify(&entity, &updated, &snapshot);
				});
				drop(records);
				if let Err(err) = submitted {
					tracing::warn!(entity = %key, queue = queue.name(), error = %err, "store.notify_dropped");
				}
			}
		}
	}

	/// Returns the current record for `key`, materializing the default record if absent.
	pub fn current(&self, key: &EntityKey) -> Arc<StateRecord> {
		let mut records = self.records.lock();
		Arc::clone(self.entry_locked(&mut records, key))
	}

	/// Registers a subscription; see [`SubscriptionRegistry::subscribe`].
	pub fn subscribe<F>(&self, scope: impl Into<Scope>, fields: impl Into<FieldSet>, callback: F) -> Disposer
	where
		F: Fn(&EntityKey, &Arc<StateRecord>) -> anyhow::Result<()> + Send + Sync + 'static,
	{
		self.subscriptions.subscribe(scope, fields, callback)
	}

	pub fn subscriptions(&self) -> &SubscriptionRegistry {
		&self.subscriptions
	}

	/// Returns the dispatch policy the store was built with.
	pub fn dispatch(&self) -> &Dispatch {
		&self.dispatch
	}

	/// Returns true if a record exists for `key`.
	pub fn contains(&self, key: &EntityKey) -> bool {
		self.records.lock().contains_key(key)
	}

	/// Returns the number of materialized records.
	pub fn len(&self) -> usize {
		self.records.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn merge_locked(&self, records: &mut HashMap<EntityKey, Arc<StateRecord>>, key: &EntityKey, partial: PartialState) -> Arc<StateRecord> {
		let entry = self.entry_locked(records, key);
		// Copy-on-write: snapshots handed out earlier stay untouched.
		Arc::make_mut(entry).merge(partial);
		Arc::clone(entry)
	}

	fn entry_locked<'a>(&self, records: &'a mut HashMap<EntityKey, Arc<StateRecord>>, key: &EntityKey) -> &'a mut Arc<StateRecord> {
		records.entry(key.clone()).or_insert_with(|| {
			tracing::debug!(entity = %key, "store.materialize");
			Arc::new((self.initial)(key))
		})
	}
}

/// Builder for [`StateStore`].
pub struct StateStoreBuilder {
	initial: Option<InitialState>,
	dispatch: Dispatch,
}

impl Default for StateStoreBuilder {
	fn default() -> Self {
		Self {
			initial: None,
			dispatch: Dispatch::Inline,
		}
	}
}

impl StateStoreBuilder {
	/// Sets the factory for records of entities seen for the first time.
	pub fn initial_state(mut self, initial: impl Fn(&EntityKey) -> StateRecord + Send + Sync + 'static) -> Self {
		self.initial = Some(Arc::new(initial));
		self
	}

	pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
		self.dispatch = dispatch;
		self
	}

	/// Shorthand for `dispatch(Dispatch::Queued(queue))`.
	pub fn queued(self, queue: WorkQueue) -> Self {
		self.dispatch(Dispatch::Queued(queue))
	}

	pub fn build(self) -> StateStore {
		let initial: InitialState = match self.initial {
			Some(initial) => initial,
			None => Arc::new(|_: &EntityKey| StateRecord::new()),
		};
		StateStore {
			records: Mutex::new(HashMap::new()),
			delivery: ReentrantMutex::new(RefCell::new(InlineDelivery::default())),
			initial,
			subscriptions: SubscriptionRegistry::new(),
			dispatch: self.dispatch,
		}
	}
}

#[cfg(test)]
mod tests;
