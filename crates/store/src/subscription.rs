use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use vitrine_primitives::{EntityKey, SubscriptionId};
use vitrine_worker::panic_message;

use crate::record::{FieldSet, StateRecord};

/// Scope string matching every entity.
pub const WILDCARD: &str = "*";

/// Subscriber callback, invoked with the updated entity and its post-update snapshot.
pub type Callback = Arc<dyn Fn(&EntityKey, &Arc<StateRecord>) -> anyhow::Result<()> + Send + Sync>;

/// Which entities a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
	/// Updates to one entity.
	Entity(EntityKey),
	/// Updates to any entity.
	Any,
}

impl Scope {
	pub fn matches(&self, key: &EntityKey) -> bool {
		match self {
			Self::Entity(scoped) => scoped == key,
			Self::Any => true,
		}
	}
}

impl From<EntityKey> for Scope {
	fn from(key: EntityKey) -> Self {
		Self::Entity(key)
	}
}

impl From<&EntityKey> for Scope {
	fn from(key: &EntityKey) -> Self {
		Self::Entity(key.clone())
	}
}

/// `"*"` maps to [`Scope::Any`], anything else to that entity.
impl From<&str> for Scope {
	fn from(key: &str) -> Self {
		if key == WILDCARD { Self::Any } else { Self::Entity(EntityKey::from(key)) }
	}
}

struct Entry {
	scope: Scope,
	fields: FieldSet,
	callback: Callback,
	active: Arc<AtomicBool>,
}

#[derive(Default)]
struct RegistryInner {
	entries: RwLock<IndexMap<SubscriptionId, Entry>>,
}

/// Registry of live subscriptions. Clones share the same registry.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
	inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for SubscriptionRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SubscriptionRegistry").field("len", &self.len()).finish()
	}
}

impl SubscriptionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `callback` for updates in `scope` touching any of `fields`.
	///
	/// An empty `fields` set never fires.
	pub fn subscribe<F>(&self, scope: impl Into<Scope>, fields: impl Into<FieldSet>, callback: F) -> Disposer
	where
		F: Fn(&EntityKey, &Arc<StateRecord>) -> anyhow::Result<()> + Send + Sync + 'static,
	{
		let id = SubscriptionId::new();
		let active = Arc::new(AtomicBool::new(true));
		let entry = Entry {
			scope: scope.into(),
			fields: fields.into(),
			callback: Arc::new(callback),
			active: Arc::clone(&active),
		};
		tracing::debug!(subscription = %id, scope = ?entry.scope, fields = entry.fields.len(), "subscription.add");
		self.inner.entries.write().insert(id, entry);

		Disposer {
			id,
			registry: Arc::downgrade(&self.inner),
			active,
		}
	}

	/// Invokes every live subscription matching `key` whose fields intersect `updated`.
	///
	/// Callbacks run sequentially on the calling thread, outside the registry
	/// lock. A failing or panicking callback is logged and skipped. Returns the
	/// number of callbacks that completed successfully.
	pub fn notify(&self, key: &EntityKey, updated: &FieldSet, snapshot: &Arc<StateRecord>) -> usize {
		let matching: Vec<(SubscriptionId, Callback, Arc<AtomicBool>)> = self
			.inner
			.entries
			.read()
			.iter()
			.filter(|(_, entry)| entry.scope.matches(key) && entry.fields.intersects(updated))
			.map(|(id, entry)| (*id, Arc::clone(&entry.callback), Arc::clone(&entry.active)))
			.collect();

		tracing::trace!(entity = %key, matching = matching.len(), "store.notify");

		let mut delivered = 0;
		for (id, callback, active) in matching {
			// Disposed while earlier callbacks ran.
			if !active.load(Ordering::Acquire) {
				continue;
			}
			match catch_unwind(AssertUnwindSafe(|| callback(key, snapshot))) {
				Ok(Ok(())) => delivered += 1,
				Ok(Err(err)) => {
					tracing::error!(subscription = %id, entity = %key, error = %format!("{err:#}"), "subscription.callback_failed");
				}
				Err(payload) => {
					tracing::error!(
						subscription = %id,
						entity = %key,
						panic = %panic_message(payload.as_ref()),
						"subscription.callback_panicked"
					);
				}
			}
		}
		delivered
	}

	/// Returns the number of live subscriptions.
	pub fn len(&self) -> usize {
		self.inner.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// One-shot handle removing a subscription.
///
/// Dropping the disposer leaves the subscription in place; only
/// [`dispose`](Self::dispose) removes it.
#[must_use = "a subscription can only be removed through its disposer"]
#[derive(Debug)]
pub struct Disposer {
	id: SubscriptionId,
	registry: Weak<RegistryInner>,
	active: Arc<AtomicBool>,
}

impl Disposer {
	pub fn id(&self) -> SubscriptionId {
		self.id
	}

	/// Returns true until the subscription is disposed.
	pub fn is_active(&self) -> bool {
		self.active.load(Ordering::Acquire)
	}

	/// Removes the subscription. Calling this more than once is a no-op.
	pub fn dispose(&self) {
		if !self.active.swap(false, Ordering::AcqRel) {
			return;
		}
		if let Some(inner) = self.registry.upgrade() {
			inner.entries.write().shift_remove(&self.id);
		}
		tracing::debug!(subscription = %self.id, "subscription.remove");
	}
}
