#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Reactive per-entity state store.
//!
//! A [`StateStore`] maps an [`EntityKey`] (usually a repository path) to a
//! schemaless [`StateRecord`]. Records are created lazily, merged atomically
//! with [`StateStore::update`], and every update is fanned out to the
//! subscriptions whose scope and watched fields match it.
//!
//! # Delivery
//!
//! ```text
//! update(key, partial)
//!   ├── merge under the store lock, snapshot the record
//!   └── Dispatch::Queued → WorkQueue (FIFO) → SubscriptionRegistry::notify
//!       Dispatch::Inline → SubscriptionRegistry::notify on the caller
//! ```
//!
//! Notifications for one entity are always delivered in update order.

mod cache;
mod error;
mod record;
mod store;
mod subscription;

pub use cache::{CacheStats, DEFAULT_CACHE_CAPACITY, MemoCache};
pub use error::{Result, StoreError};
pub use record::{FieldSet, FieldValue, PartialState, StateRecord};
pub use store::{Dispatch, InitialState, StateStore, StateStoreBuilder};
pub use subscription::{Callback, Disposer, Scope, SubscriptionRegistry, WILDCARD};
pub use vitrine_primitives::{EntityKey, SubscriptionId};
