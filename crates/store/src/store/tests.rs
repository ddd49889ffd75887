use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::json;
use vitrine_worker::{TaskClass, WorkQueue};

use super::*;

fn key() -> EntityKey {
	EntityKey::from("/repo")
}

fn queued_store(name: &str) -> (StateStore, WorkQueue) {
	let queue = WorkQueue::new(name, TaskClass::Notify).expect("queue thread");
	(StateStore::builder().queued(queue.clone()).build(), queue)
}

#[test]
fn current_materializes_default_record() {
	let store = StateStore::builder()
		.initial_state(|_| StateRecord::new().with("last_branches", json!([null, null])))
		.build();
	assert!(!store.contains(&key()));

	let record = store.current(&key());
	assert_eq!(record.get("last_branches"), Some(&json!([null, null])));
	assert!(store.contains(&key()));
	assert_eq!(store.len(), 1);
}

#[test]
fn update_creates_record_from_initial_state() {
	let store = StateStore::builder().initial_state(|key| StateRecord::new().with("path", key.as_str())).build();
	store.update(&key(), PartialState::new().set("status", "clean"));

	let record = store.current(&key());
	assert_eq!(record.get("path"), Some(&json!("/repo")));
	assert_eq!(record.get("status"), Some(&json!("clean")));
}

#[test]
fn earlier_snapshots_are_not_mutated() {
	let store = StateStore::new();
	store.update(&key(), PartialState::new().set("a", 1));
	let before = store.current(&key());
	store.update(&key(), PartialState::new().set("a", 2));

	assert_eq!(before.get("a"), Some(&json!(1)));
	assert_eq!(store.current(&key()).get("a"), Some(&json!(2)));
}

#[test]
fn inline_subscriber_sees_post_merge_snapshot() {
	let store = StateStore::new();
	let seen = Arc::new(Mutex::new(Vec::new()));
	let out = Arc::clone(&seen);
	let _sub = store.subscribe(&key(), ["a"], move |_: &EntityKey, record: &Arc<StateRecord>| {
		out.lock().push(record.get("a").cloned());
		Ok(())
	});

	store.update(&key(), PartialState::new().set("a", 1));
	store.update(&key(), PartialState::new().set("b", 1));
	store.update(&key(), PartialState::new().set("a", 2));

	assert_eq!(*seen.lock(), vec![Some(json!(1)), Some(json!(2))]);
}

#[test]
fn inline_reentrant_update_does_not_deadlock() {
	let store = Arc::new(StateStore::new());
	let inner = Arc::clone(&store);
	let _chain = store.subscribe(&key(), ["a"], move |key: &EntityKey, record: &Arc<StateRecord>| {
		let a = record.get_as::<i64>("a")?.unwrap_or_default();
		inner.update(key, PartialState::new().set("b", a * 10));
		Ok(())
	});
	let b_hits = Arc::new(AtomicUsize::new(0));
	let hits = Arc::clone(&b_hits);
	let _watch_b = store.subscribe(&key(), ["b"], move |_: &EntityKey, _: &Arc<StateRecord>| {
		hits.fetch_add(1, Ordering::SeqCst);
		Ok(())
	});

	store.update(&key(), PartialState::new().set("a", 4));

	assert_eq!(store.current(&key()).get("b"), Some(&json!(40)));
	assert_eq!(b_hits.load(Ordering::SeqCst), 1);
}

#[test]
fn inline_reentrant_update_reaches_later_subscribers_in_order() {
	let store = Arc::new(StateStore::new());
	let inner = Arc::clone(&store);
	let _bump = store.subscribe(&key(), ["n"], move |key: &EntityKey, record: &Arc<StateRecord>| {
		if record.get_as::<i64>("n")? == Some(1) {
			inner.update(key, PartialState::new().set("n", 2));
		}
		Ok(())
	});
	let seen = Arc::new(Mutex::new(Vec::new()));
	let out = Arc::clone(&seen);
	let _watch = store.subscribe(&key(), ["n"], move |_: &EntityKey, record: &Arc<StateRecord>| {
		out.lock().push(record.get_as::<i64>("n")?.unwrap_or_default());
		Ok(())
	});

	store.update(&key(), PartialState::new().set("n", 1));

	assert_eq!(*seen.lock(), vec![1, 2]);
	assert_eq!(store.current(&key()).get("n"), Some(&json!(2)));
}

#[test]
fn queued_delivery_preserves_update_order() {
	let (store, queue) = queued_store("test-store-fifo");
	let seen = Arc::new(Mutex::new(Vec::new()));
	let out = Arc::clone(&seen);
	let _sub = store.subscribe(&key(), ["n"], move |_: &EntityKey, record: &Arc<StateRecord>| {
		out.lock().push(record.get_as::<u32>("n")?.unwrap_or_default());
		Ok(())
	});

	for n in 0..200u32 {
		store.update(&key(), PartialState::new().set("n", n));
	}
	queue.flush_blocking().unwrap();

	assert_eq!(*seen.lock(), (0..200).collect::<Vec<_>>());
	queue.shutdown();
}

#[test]
fn queued_reentrant_update_is_delivered_later() {
	let (store, queue) = queued_store("test-store-reentrant");
	let store = Arc::new(store);
	let inner = Arc::clone(&store);
	let _chain = store.subscribe(&key(), ["a"], move |key: &EntityKey, _: &Arc<StateRecord>| {
		inner.update(key, PartialState::new().set("b", true));
		Ok(())
	});
	let seen = Arc::new(Mutex::new(Vec::new()));
	let out = Arc::clone(&seen);
	let _watch = store.subscribe(Scope::Any, ["a", "b"], move |_: &EntityKey, record: &Arc<StateRecord>| {
		out.lock().push(record.contains("b"));
		Ok(())
	});

	store.update(&key(), PartialState::new().set("a", 1));
	queue.flush_blocking().unwrap();
	queue.flush_blocking().unwrap();

	assert_eq!(*seen.lock(), vec![false, true]);
	queue.shutdown();
}

#[test]
fn update_after_queue_shutdown_still_merges() {
	let (store, queue) = queued_store("test-store-closed");
	queue.shutdown();
	store.update(&key(), PartialState::new().set("a", 1));
	assert_eq!(store.current(&key()).get("a"), Some(&json!(1)));
}

fn assert_per_writer_order(store: StateStore, flush: impl FnOnce()) {
	const WRITERS: usize = 4;
	const UPDATES: i64 = 50;

	let store = Arc::new(store);
	let observed: Arc<Mutex<Vec<Arc<StateRecord>>>> = Arc::new(Mutex::new(Vec::new()));
	let out = Arc::clone(&observed);
	let fields: Vec<String> = (0..WRITERS).map(|w| format!("w{w}")).collect();
	let _sub = store.subscribe(&key(), fields.iter().map(String::as_str).collect::<FieldSet>(), move |_: &EntityKey, record: &Arc<StateRecord>| {
		out.lock().push(Arc::clone(record));
		Ok(())
	});

	let handles: Vec<_> = fields
		.iter()
		.cloned()
		.map(|field| {
			let store = Arc::clone(&store);
			std::thread::spawn(move || {
				for n in 0..UPDATES {
					store.update(&key(), PartialState::new().set(field.clone(), n));
				}
			})
		})
		.collect();
	for handle in handles {
		handle.join().unwrap();
	}
	flush();

	let observed = observed.lock();
	assert_eq!(observed.len(), WRITERS * UPDATES as usize);
	for field in &fields {
		let values: Vec<i64> = observed.iter().map(|r| r.get_as::<i64>(field).unwrap().unwrap_or(-1)).collect();
		assert!(values.windows(2).all(|w| w[0] <= w[1]), "{field} observed out of order: {values:?}");
	}
}

#[test]
fn concurrent_writers_are_delivered_in_merge_order_inline() {
	assert_per_writer_order(StateStore::new(), || {});
}

#[test]
fn concurrent_writers_are_delivered_in_merge_order_queued() {
	let (store, queue) = queued_store("test-store-concurrent");
	let flush = queue.clone();
	assert_per_writer_order(store, move || flush.flush_blocking().unwrap());
	queue.shutdown();
}

proptest! {
	/// The record after a sequence of updates equals the left fold of the partials.
	#[test]
	fn prop_current_is_left_fold(updates in prop::collection::vec(prop::collection::vec((0usize..4, any::<i32>()), 0..4), 0..20)) {
		let store = StateStore::new();
		let mut expected = BTreeMap::new();
		for update in &updates {
			let mut partial = PartialState::new();
			for (field, value) in update {
				partial.insert(format!("f{field}"), *value);
				expected.insert(format!("f{field}"), json!(*value));
			}
			store.update(&key(), partial);
		}

		let record = store.current(&key());
		let actual: BTreeMap<String, serde_json::Value> = record.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
		prop_assert_eq!(actual, expected);
	}
}
