//! The dashboard trait and what a render pass hands to it.

use std::sync::{Arc, Weak};

use serde::de::DeserializeOwned;
use vitrine_compose::{SectionError, SectionRegistry, Template};
use vitrine_primitives::EntityKey;
use vitrine_store::{FieldSet, MemoCache, PartialState, StateRecord, StateStore};
use vitrine_worker::{GenerationClock, LivenessToken, TaskClass, WorkQueue, WorkerRegistry};

use crate::config::DashboardOptions;
use crate::runner::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use crate::session::{RenderRequest, SessionInner};
use crate::view::ViewLayer;
use crate::{DashboardSession, Result};

/// A kind of dashboard: its template, sections and the state it reacts to.
///
/// One value serves every session of that kind; per-entity data comes from
/// the [`RenderContext`].
pub trait Dashboard: Send + Sync + 'static {
	/// Stable kind name, unique per dashboard type.
	fn kind(&self) -> &str;

	fn title(&self, key: &EntityKey) -> String;

	fn template(&self) -> &Template;

	/// State fields whose updates re-render the dashboard.
	fn watched_fields(&self) -> FieldSet;

	/// Declares the sections of one render pass.
	fn sections(&self, ctx: &RenderContext) -> SectionRegistry;

	/// Section the cursor is kept in across refreshes.
	fn cursor_section(&self) -> Option<&str> {
		None
	}

	fn on_first_render(&self, _ctx: &RenderContext) {}

	fn on_close(&self, _key: &EntityKey) {}
}

/// Shared collaborators of all dashboard sessions in a host.
#[derive(Clone)]
pub struct DashboardEnv {
	pub store: Arc<StateStore>,
	pub view: Arc<dyn ViewLayer>,
	pub runner: Arc<dyn CommandRunner>,
	pub options: Arc<DashboardOptions>,
	/// Memoized command output, keyed by command line.
	pub cache: Arc<MemoCache<String, CommandOutput>>,
	render_queue: WorkQueue,
	workers: WorkerRegistry,
	session_ids: GenerationClock,
}

impl std::fmt::Debug for DashboardEnv {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DashboardEnv")
			.field("store", &self.store)
			.field("options", &self.options)
			.field("render_queue", &self.render_queue)
			.finish_non_exhaustive()
	}
}

impl DashboardEnv {
	/// Creates an environment with its own `dashboard-render` queue.
	pub fn new(store: Arc<StateStore>, view: Arc<dyn ViewLayer>, runner: Arc<dyn CommandRunner>, options: DashboardOptions) -> Result<Self> {
		Self::with_workers(store, view, runner, options, WorkerRegistry::new())
	}

	/// Like [`new`](Self::new), with the render queue reporting into the host's `workers`.
	pub fn with_workers(store: Arc<StateStore>, view: Arc<dyn ViewLayer>, runner: Arc<dyn CommandRunner>, options: DashboardOptions, workers: WorkerRegistry) -> Result<Self> {
		let render_queue = WorkQueue::with_registry("dashboard-render", TaskClass::Render, workers.clone())?;
		let cache = Arc::new(MemoCache::new(options.cache_capacity));
		Ok(Self {
			store,
			view,
			runner,
			options: Arc::new(options),
			cache,
			render_queue,
			workers,
			session_ids: GenerationClock::new(),
		})
	}

	pub fn render_queue(&self) -> &WorkQueue {
		&self.render_queue
	}

	/// Status snapshots of the queues serving this environment.
	pub fn workers(&self) -> &WorkerRegistry {
		&self.workers
	}

	pub(crate) fn next_session_id(&self) -> u64 {
		self.session_ids.next()
	}
}

/// Requests another render of a session from outside the current pass.
///
/// Holds the session weakly; requests after close are dropped.
#[derive(Clone)]
pub struct RerenderHandle {
	session: Weak<SessionInner>,
	liveness: LivenessToken,
}

impl std::fmt::Debug for RerenderHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RerenderHandle").field("live", &self.is_live()).finish()
	}
}

impl RerenderHandle {
	pub(crate) fn new(session: Weak<SessionInner>, liveness: LivenessToken) -> Self {
		Self { session, liveness }
	}

	pub fn is_live(&self) -> bool {
		self.liveness.is_live()
	}

	pub fn liveness(&self) -> &LivenessToken {
		&self.liveness
	}

	/// Queues a render. Returns false if the session is gone or the queue refused it.
	pub fn request(&self) -> bool {
		if !self.is_live() {
			return false;
		}
		let Some(inner) = self.session.upgrade() else {
			return false;
		};
		match DashboardSession::from_inner(inner).request_render(RenderRequest::refresh()) {
			Ok(()) => true,
			Err(err) => {
				tracing::warn!(error = %err, "session.rerender_failed");
				false
			}
		}
	}
}

/// Everything a dashboard sees during one render pass.
#[derive(Clone)]
pub struct RenderContext {
	key: EntityKey,
	snapshot: Arc<StateRecord>,
	env: DashboardEnv,
	rerender: RerenderHandle,
}

impl std::fmt::Debug for RenderContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RenderContext").field("key", &self.key).field("snapshot", &self.snapshot).finish_non_exhaustive()
	}
}

impl RenderContext {
	pub(crate) fn new(key: EntityKey, snapshot: Arc<StateRecord>, env: DashboardEnv, rerender: RerenderHandle) -> Self {
		Self { key, snapshot, env, rerender }
	}

	pub fn key(&self) -> &EntityKey {
		&self.key
	}

	/// State of the entity as of the start of this render.
	pub fn snapshot(&self) -> &Arc<StateRecord> {
		&self.snapshot
	}

	/// Decodes a snapshot field for a section, mapping shape mismatches to [`SectionError`].
	pub fn field<T: DeserializeOwned>(&self, name: &str) -> std::result::Result<Option<T>, SectionError> {
		self.snapshot.get_as(name).map_err(|err| SectionError::Other(err.into()))
	}

	pub fn options(&self) -> &DashboardOptions {
		&self.env.options
	}

	pub fn store(&self) -> &Arc<StateStore> {
		&self.env.store
	}

	pub fn rerender(&self) -> &RerenderHandle {
		&self.rerender
	}

	pub fn is_live(&self) -> bool {
		self.rerender.is_live()
	}

	/// Runs `spec` synchronously through the host's command runner.
	pub fn run(&self, spec: &CommandSpec) -> std::result::Result<CommandOutput, CommandError> {
		self.env.runner.run(spec)
	}

	/// Like [`run`](Self::run), but reuses output of an earlier identical command line.
	pub fn run_cached(&self, spec: &CommandSpec) -> std::result::Result<CommandOutput, CommandError> {
		let key = match &spec.cwd {
			Some(dir) => format!("{}\0{spec}", dir.display()),
			None => spec.to_string(),
		};
		self.env.cache.try_get_or_insert_with(key, || self.env.runner.run(spec))
	}

	/// Runs `fetch` on a worker and merges its result into this entity's state.
	///
	/// Watched fields in the result trigger a fresh render through the normal
	/// subscription path. Results arriving after the session closed are dropped.
	pub fn fetch_into_store<F>(&self, label: &'static str, fetch: F)
	where
		F: FnOnce(&dyn CommandRunner) -> std::result::Result<PartialState, CommandError> + Send + 'static,
	{
		let key = self.key.clone();
		let store = Arc::clone(&self.env.store);
		let runner = Arc::clone(&self.env.runner);
		let liveness = self.rerender.liveness().clone();
		let entity = key.clone();
		let handle = vitrine_worker::spawn_blocking(TaskClass::Fetch, move || {
			if !liveness.is_live() {
				return;
			}
			match fetch(runner.as_ref()) {
				Ok(partial) if liveness.is_live() => store.update(&key, partial),
				Ok(_) => tracing::trace!(entity = %key, fetch = label, "session.fetch_discarded"),
				Err(err) => tracing::warn!(entity = %key, fetch = label, error = %err, "session.fetch_failed"),
			}
		});
		drop(vitrine_worker::spawn(TaskClass::Fetch, async move {
			if let Err(err) = handle.await
				&& let Some(panic) = vitrine_worker::join_error_panic_message(err)
			{
				tracing::error!(entity = %entity, fetch = label, %panic, "session.fetch_panicked");
			}
		}));
	}
}
