//! Bounded memo cache for values derived from state.
//!
//! Dashboards use it to remember expensive lookups (commit details, diff
//! stats) keyed by something stable such as a hash. Least recently used
//! entries are evicted once the cache is full.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// Default number of entries kept by a [`MemoCache`].
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// Hit and miss counters of a [`MemoCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
	pub hits: u64,
	pub misses: u64,
	pub size: usize,
	pub capacity: usize,
}

struct Inner<K: Hash + Eq, V> {
	entries: LruCache<K, V>,
	hits: u64,
	misses: u64,
}

/// Thread-safe LRU cache. Values are cloned out on lookup.
pub struct MemoCache<K: Hash + Eq, V> {
	inner: Mutex<Inner<K, V>>,
}

impl<K: Hash + Eq, V> std::fmt::Debug for MemoCache<K, V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let stats = self.stats();
		f.debug_struct("MemoCache").field("size", &stats.size).field("capacity", &stats.capacity).finish()
	}
}

impl<K: Hash + Eq, V> Default for MemoCache<K, V> {
	fn default() -> Self {
		Self::new(DEFAULT_CACHE_CAPACITY)
	}
}

impl<K: Hash + Eq, V> MemoCache<K, V> {
	/// Creates a cache holding at most `capacity` entries. Zero is treated as one.
	pub fn new(capacity: usize) -> Self {
		let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
		Self {
			inner: Mutex::new(Inner {
				entries: LruCache::new(capacity),
				hits: 0,
				misses: 0,
			}),
		}
	}

	/// Stores `value` under `key`, returning the value it replaced.
	pub fn insert(&self, key: K, value: V) -> Option<V> {
		self.inner.lock().entries.put(key, value)
	}

	pub fn remove(&self, key: &K) -> Option<V> {
		self.inner.lock().entries.pop(key)
	}

	pub fn contains(&self, key: &K) -> bool {
		self.inner.lock().entries.contains(key)
	}

	pub fn clear(&self) {
		let mut inner = self.inner.lock();
		inner.entries.clear();
		inner.hits = 0;
		inner.misses = 0;
	}

	pub fn len(&self) -> usize {
		self.inner.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn capacity(&self) -> usize {
		self.inner.lock().entries.cap().get()
	}

	pub fn stats(&self) -> CacheStats {
		let inner = self.inner.lock();
		CacheStats {
			hits: inner.hits,
			misses: inner.misses,
			size: inner.entries.len(),
			capacity: inner.entries.cap().get(),
		}
	}
}

impl<K: Hash + Eq, V: Clone> MemoCache<K, V> {
	/// Returns a clone of the value under `key` and marks it most recently used.
	pub fn get(&self, key: &K) -> Option<V> {
		let mut inner = self.inner.lock();
		let found = inner.entries.get(key).cloned();
		if found.is_some() {
			inner.hits += 1;
		} else {
			inner.misses += 1;
		}
		found
	}

	/// Returns the cached value for `key`, computing and storing it on a miss.
	///
	/// `compute` runs without the cache lock held, so two threads missing on
	/// the same key may both compute; the later insert wins.
	pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
		if let Some(value) = self.get(&key) {
			return value;
		}
		let value = compute();
		self.insert(key, value.clone());
		value
	}

	/// Like [`get_or_insert_with`](Self::get_or_insert_with), but failures are
	/// returned and nothing is cached.
	pub fn try_get_or_insert_with<E>(&self, key: K, compute: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
		if let Some(value) = self.get(&key) {
			return Ok(value);
		}
		let value = compute()?;
		self.insert(key, value.clone());
		Ok(value)
	}
}
