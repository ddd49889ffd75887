//! Live dashboard sessions.
//!
//! A session binds one [`Dashboard`] to one entity. It subscribes to the
//! dashboard's watched fields, and every matching state change queues a
//! render on the host's render queue. Renders of one session never overlap:
//! a request arriving mid-render marks the session dirty and the running
//! render loops once more.
//!
//! ```text
//! StateStore::update ─► subscription ─► request_render ─► render queue
//!                                                            │
//!                            ViewLayer ◄─ compose ◄─ render ◄┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use vitrine_compose::{Composer, RenderedDocument};
use vitrine_primitives::{EntityKey, Region, SessionId};
use vitrine_store::Disposer;
use vitrine_worker::LivenessToken;

use crate::dashboard::{Dashboard, DashboardEnv, RenderContext, RerenderHandle};
use crate::{DashboardError, Result};

/// Options of a single render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderRequest {
	/// Move the cursor to the start of the dashboard's cursor section afterwards,
	/// or to the top if that section rendered empty.
	pub reset_cursor: bool,
}

impl RenderRequest {
	/// Plain refresh keeping the cursor where it is.
	pub const fn refresh() -> Self {
		Self { reset_cursor: false }
	}

	pub const fn with_cursor_reset() -> Self {
		Self { reset_cursor: true }
	}

	fn merge(self, other: Self) -> Self {
		Self {
			reset_cursor: self.reset_cursor || other.reset_cursor,
		}
	}
}

#[derive(Debug, Default)]
struct Pending {
	running: bool,
	request: Option<RenderRequest>,
}

#[derive(Debug, Default)]
struct Shown {
	document: Option<RenderedDocument>,
	renders: u64,
}

pub(crate) struct SessionInner {
	id: SessionId,
	key: EntityKey,
	dashboard: Arc<dyn Dashboard>,
	env: DashboardEnv,
	composer: Composer,
	liveness: LivenessToken,
	closed: AtomicBool,
	subscription: Mutex<Option<Disposer>>,
	pending: Mutex<Pending>,
	shown: Mutex<Shown>,
}

/// A session dropped without [`DashboardSession::close`] still releases its
/// subscription and stops pending work.
impl Drop for SessionInner {
	fn drop(&mut self) {
		self.liveness.close();
		if let Some(subscription) = self.subscription.get_mut().take() {
			subscription.dispose();
			tracing::debug!(session = %self.id, "session.dropped");
		}
	}
}

/// Handle to a live dashboard. Clones share the session.
#[derive(Clone)]
pub struct DashboardSession {
	inner: Arc<SessionInner>,
}

impl std::fmt::Debug for DashboardSession {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DashboardSession")
			.field("id", &self.inner.id)
			.field("kind", &self.inner.dashboard.kind())
			.field("key", &self.inner.key)
			.field("live", &self.is_live())
			.finish()
	}
}

impl DashboardSession {
	/// Opens a session for `key`: subscribes to the watched fields and renders once.
	///
	/// The first render happens on the calling thread, followed by
	/// [`Dashboard::on_first_render`].
	pub fn open(env: &DashboardEnv, dashboard: Arc<dyn Dashboard>, key: EntityKey) -> Result<Self> {
		let id = SessionId(env.next_session_id());
		let options = Arc::clone(&env.options);
		let composer = Composer::with_fallback(move |_, err| options.fallback_text(err));
		let session = Self {
			inner: Arc::new(SessionInner {
				id,
				key: key.clone(),
				dashboard: Arc::clone(&dashboard),
				env: env.clone(),
				composer,
				liveness: LivenessToken::new(),
				closed: AtomicBool::new(false),
				subscription: Mutex::new(None),
				pending: Mutex::new(Pending::default()),
				shown: Mutex::new(Shown::default()),
			}),
		};
		tracing::debug!(session = %id, kind = dashboard.kind(), entity = %key, "session.open");

		let weak = Arc::downgrade(&session.inner);
		let disposer = env.store.subscribe(&key, dashboard.watched_fields(), move |_, _| {
			match weak.upgrade() {
				Some(inner) => DashboardSession::from_inner(inner).request_render(RenderRequest::refresh())?,
				None => tracing::trace!(session = %id, "session.notify_after_drop"),
			}
			Ok(())
		});
		*session.inner.subscription.lock() = Some(disposer);

		if let Err(err) = session.render(RenderRequest::with_cursor_reset()) {
			session.close();
			return Err(err);
		}
		dashboard.on_first_render(&session.context());
		Ok(session)
	}

	pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
		Self { inner }
	}

	pub fn id(&self) -> SessionId {
		self.inner.id
	}

	pub fn key(&self) -> &EntityKey {
		&self.inner.key
	}

	pub fn kind(&self) -> &str {
		self.inner.dashboard.kind()
	}

	pub fn title(&self) -> String {
		self.inner.dashboard.title(&self.inner.key)
	}

	pub fn is_live(&self) -> bool {
		self.inner.liveness.is_live()
	}

	/// Token closed together with this session, for work that outlives a render.
	pub fn liveness(&self) -> LivenessToken {
		self.inner.liveness.clone()
	}

	/// Returns the document shown last, if any.
	pub fn document(&self) -> Option<RenderedDocument> {
		self.inner.shown.lock().document.clone()
	}

	/// Number of completed renders.
	pub fn render_count(&self) -> u64 {
		self.inner.shown.lock().renders
	}

	/// Renders the dashboard now, on the calling thread.
	///
	/// If another thread is rendering this session, the request is folded
	/// into a follow-up pass of that render and this call returns at once.
	pub fn render(&self, request: RenderRequest) -> Result<()> {
		if !self.is_live() {
			return Err(DashboardError::Closed(self.inner.id));
		}
		{
			let mut pending = self.inner.pending.lock();
			pending.request = Some(pending.request.map_or(request, |queued| queued.merge(request)));
			if pending.running {
				tracing::trace!(session = %self.inner.id, "session.render_coalesced");
				return Ok(());
			}
			pending.running = true;
		}

		let mut result = Ok(());
		loop {
			let request = {
				let mut pending = self.inner.pending.lock();
				match pending.request.take() {
					Some(request) if self.is_live() => request,
					_ => {
						pending.running = false;
						break;
					}
				}
			};
			if let Err(err) = self.render_pass(request) {
				tracing::error!(session = %self.inner.id, error = %err, "session.render_failed");
				result = Err(err);
			}
		}
		result
	}

	/// Queues a render on the host's render queue.
	///
	/// Requests for a closed session are ignored.
	pub fn request_render(&self, request: RenderRequest) -> Result<()> {
		if !self.is_live() {
			tracing::trace!(session = %self.inner.id, "session.render_ignored");
			return Ok(());
		}
		let session = self.clone();
		self.inner.env.render_queue().submit(move || {
			if !session.is_live() {
				return;
			}
			// Failures are already logged by the render loop.
			let _ = session.render(request);
		})?;
		Ok(())
	}

	/// Replaces one section of the shown document in place and re-sends it to the view.
	///
	/// Returns false if the session is closed, nothing was rendered yet, or
	/// the section has no region.
	pub fn update_section(&self, name: &str, content: &str) -> bool {
		if !self.is_live() {
			return false;
		}
		let mut shown = self.inner.shown.lock();
		let Some(document) = shown.document.as_mut() else {
			return false;
		};
		let previous = document.regions().clone();
		if !document.replace_section(name, content) {
			return false;
		}
		self.inner.env.view.apply_document(self.inner.id, document, &previous);
		tracing::trace!(session = %self.inner.id, section = name, "session.update_section");
		true
	}

	/// Closes the session. Later notifications and async results are ignored.
	pub fn close(&self) {
		if self.inner.closed.swap(true, Ordering::AcqRel) {
			return;
		}
		let inner = &self.inner;
		inner.liveness.close();
		if let Some(subscription) = inner.subscription.lock().take() {
			subscription.dispose();
		}
		inner.shown.lock().document = None;
		inner.dashboard.on_close(&inner.key);
		inner.env.view.on_close(inner.id);
		tracing::debug!(session = %inner.id, kind = inner.dashboard.kind(), entity = %inner.key, "session.close");
	}

	fn context(&self) -> RenderContext {
		let inner = &self.inner;
		let rerender = RerenderHandle::new(Arc::downgrade(inner), inner.liveness.clone());
		RenderContext::new(inner.key.clone(), inner.env.store.current(&inner.key), inner.env.clone(), rerender)
	}

	fn render_pass(&self, request: RenderRequest) -> Result<()> {
		let inner = &self.inner;
		let ctx = self.context();
		let sections = inner.dashboard.sections(&ctx);
		let document = inner.composer.compose(inner.dashboard.template().as_str(), &sections)?;

		let mut shown = inner.shown.lock();
		if !self.is_live() {
			tracing::trace!(session = %inner.id, "session.render_discarded");
			return Ok(());
		}
		let previous = shown.document.as_ref().map(|doc| doc.regions().clone()).unwrap_or_default();
		let view = &inner.env.view;
		let cursor_section = inner.dashboard.cursor_section();
		let was_inside = self.cursor_inside(cursor_section.and_then(|name| previous.get(name)));

		view.apply_document(inner.id, &document, &previous);

		let target = cursor_section.and_then(|name| document.region(name));
		let move_to = if request.reset_cursor || inner.env.options.reset_cursor_on_refresh {
			cursor_section.map(|_| target.map_or(0, |region| region.start))
		} else {
			target.filter(|region| was_inside && !self.cursor_inside(Some(region))).map(|region| region.start)
		};
		if let Some(pos) = move_to {
			view.set_cursor(inner.id, pos);
		}

		shown.renders += 1;
		tracing::debug!(
			session = %inner.id,
			render = shown.renders,
			sections = document.regions().len(),
			chars = document.char_len(),
			"session.render"
		);
		shown.document = Some(document);
		Ok(())
	}

	/// Returns true if a cursor of the view lies inside `region`.
	fn cursor_inside(&self, region: Option<&Region>) -> bool {
		let Some(region) = region else {
			return false;
		};
		let selection = self.inner.env.view.selection(self.inner.id);
		selection.iter().any(|cursor| region_holds(region, cursor.start))
	}
}

/// A cursor at the very end of a region still counts as inside it.
fn region_holds(region: &Region, pos: usize) -> bool {
	region.start <= pos && pos <= region.end
}

#[cfg(test)]
mod tests;
