use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use vitrine_compose::{RenderedDocument, SectionError, SectionRegistry, Template};
use vitrine_primitives::{CharIdx, Region, RegionMap};
use vitrine_store::{FieldSet, PartialState, StateStore};

use super::*;
use crate::config::DashboardOptions;
use crate::runner::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use crate::view::ViewLayer;

#[derive(Debug, Clone, PartialEq)]
enum ViewEvent {
	Applied { text: String, previous: RegionMap },
	Cursor(CharIdx),
	Closed,
}

#[derive(Default)]
struct RecordingView {
	events: Mutex<Vec<ViewEvent>>,
	selection: Mutex<Vec<Region>>,
}

impl RecordingView {
	fn texts(&self) -> Vec<String> {
		self.events
			.lock()
			.iter()
			.filter_map(|event| match event {
				ViewEvent::Applied { text, .. } => Some(text.clone()),
				_ => None,
			})
			.collect()
	}

	fn cursors(&self) -> Vec<CharIdx> {
		self.events
			.lock()
			.iter()
			.filter_map(|event| match event {
				ViewEvent::Cursor(pos) => Some(*pos),
				_ => None,
			})
			.collect()
	}

	fn closed(&self) -> usize {
		self.events.lock().iter().filter(|event| **event == ViewEvent::Closed).count()
	}
}

impl ViewLayer for RecordingView {
	fn apply_document(&self, _session: SessionId, document: &RenderedDocument, previous: &RegionMap) {
		self.events.lock().push(ViewEvent::Applied {
			text: document.text().to_string(),
			previous: previous.clone(),
		});
	}

	fn selection(&self, _session: SessionId) -> Vec<Region> {
		self.selection.lock().clone()
	}

	fn set_cursor(&self, _session: SessionId, pos: CharIdx) {
		*self.selection.lock() = vec![Region::point(pos)];
		self.events.lock().push(ViewEvent::Cursor(pos));
	}

	fn on_close(&self, _session: SessionId) {
		self.events.lock().push(ViewEvent::Closed);
	}
}

struct NoCommands;

impl CommandRunner for NoCommands {
	fn run(&self, spec: &CommandSpec) -> std::result::Result<CommandOutput, CommandError> {
		Err(CommandError::new(spec, "commands are disabled"))
	}
}

type SectionsFn = dyn Fn(&RenderContext) -> SectionRegistry + Send + Sync;

struct TestDashboard {
	template: Template,
	fields: Vec<&'static str>,
	cursor: Option<&'static str>,
	sections: Box<SectionsFn>,
	first_renders: AtomicUsize,
	closes: AtomicUsize,
}

impl TestDashboard {
	fn new(template: &str, fields: Vec<&'static str>, sections: impl Fn(&RenderContext) -> SectionRegistry + Send + Sync + 'static) -> Self {
		Self {
			template: Template::raw(template),
			fields,
			cursor: None,
			sections: Box::new(sections),
			first_renders: AtomicUsize::new(0),
			closes: AtomicUsize::new(0),
		}
	}

	fn with_cursor(mut self, section: &'static str) -> Self {
		self.cursor = Some(section);
		self
	}
}

impl Dashboard for TestDashboard {
	fn kind(&self) -> &str {
		"test"
	}

	fn title(&self, key: &EntityKey) -> String {
		format!("TEST: {key}")
	}

	fn template(&self) -> &Template {
		&self.template
	}

	fn watched_fields(&self) -> FieldSet {
		self.fields.iter().copied().collect()
	}

	fn sections(&self, ctx: &RenderContext) -> SectionRegistry {
		(self.sections)(ctx)
	}

	fn cursor_section(&self) -> Option<&str> {
		self.cursor
	}

	fn on_first_render(&self, _ctx: &RenderContext) {
		self.first_renders.fetch_add(1, Ordering::SeqCst);
	}

	fn on_close(&self, _key: &EntityKey) {
		self.closes.fetch_add(1, Ordering::SeqCst);
	}
}

/// Section `name` showing state field `name` as text.
fn field_section(ctx: &RenderContext, builder: vitrine_compose::SectionRegistryBuilder, name: &'static str) -> vitrine_compose::SectionRegistryBuilder {
	let ctx = ctx.clone();
	builder.section(name, move || Ok::<_, SectionError>(ctx.field::<String>(name)?.unwrap_or_default()))
}

fn branch_dashboard() -> TestDashboard {
	TestDashboard::new("HEAD: {head}\n{files}", vec!["head", "files"], |ctx| {
		let builder = SectionRegistry::builder();
		let builder = field_section(ctx, builder, "head");
		field_section(ctx, builder, "files").build()
	})
}

struct Fixture {
	env: DashboardEnv,
	view: Arc<RecordingView>,
	key: EntityKey,
}

impl Fixture {
	fn new(options: DashboardOptions) -> Self {
		let view = Arc::new(RecordingView::default());
		let env = DashboardEnv::new(Arc::new(StateStore::new()), view.clone(), Arc::new(NoCommands), options).unwrap();
		Self {
			env,
			view,
			key: EntityKey::from("/repo"),
		}
	}

	fn update(&self, partial: PartialState) {
		self.env.store.update(&self.key, partial);
		self.env.render_queue().flush_blocking().unwrap();
	}
}

impl Drop for Fixture {
	fn drop(&mut self) {
		self.env.render_queue().shutdown();
	}
}

#[test]
fn open_renders_synchronously() {
	let fx = Fixture::new(DashboardOptions::default());
	fx.env.store.update(&fx.key, PartialState::new().set("head", "main").set("files", "M a.rs"));
	let dashboard = Arc::new(branch_dashboard());

	let session = DashboardSession::open(&fx.env, dashboard.clone(), fx.key.clone()).unwrap();

	assert_eq!(fx.view.texts(), ["HEAD: main\nM a.rs"]);
	assert_eq!(session.render_count(), 1);
	assert_eq!(dashboard.first_renders.load(Ordering::SeqCst), 1);
	assert_eq!(session.title(), "TEST: /repo");
	let document = session.document().unwrap();
	assert_eq!(document.slice("head"), Some("main"));
	assert_eq!(document.slice("files"), Some("M a.rs"));
}

#[test]
fn watched_update_rerenders_with_previous_regions() {
	let fx = Fixture::new(DashboardOptions::default());
	fx.env.store.update(&fx.key, PartialState::new().set("head", "main"));
	let session = DashboardSession::open(&fx.env, Arc::new(branch_dashboard()), fx.key.clone()).unwrap();
	let first_regions = session.document().unwrap().regions().clone();

	fx.update(PartialState::new().set("head", "feature"));

	assert_eq!(fx.view.texts(), ["HEAD: main\n", "HEAD: feature\n"]);
	let events = fx.view.events.lock().clone();
	let last_previous = events.iter().rev().find_map(|event| match event {
		ViewEvent::Applied { previous, .. } => Some(previous.clone()),
		_ => None,
	});
	assert_eq!(last_previous, Some(first_regions));
	assert_eq!(session.render_count(), 2);
}

#[test]
fn render_queue_reports_into_worker_registry() {
	let fx = Fixture::new(DashboardOptions::default());
	let _session = DashboardSession::open(&fx.env, Arc::new(branch_dashboard()), fx.key.clone()).unwrap();

	fx.update(PartialState::new().set("head", "feature"));

	let record = fx.env.workers().get("dashboard-render").unwrap();
	assert_eq!(record.class, vitrine_worker::TaskClass::Render);
	assert_eq!(record.completed, 1);
	assert_eq!(record.pending(), 0);
}

#[test]
fn unwatched_update_does_not_rerender() {
	let fx = Fixture::new(DashboardOptions::default());
	let session = DashboardSession::open(&fx.env, Arc::new(branch_dashboard()), fx.key.clone()).unwrap();

	fx.update(PartialState::new().set("last_remote_used", "origin"));
	fx.env.store.update(&EntityKey::from("/other"), PartialState::new().set("head", "x"));
	fx.env.render_queue().flush_blocking().unwrap();

	assert_eq!(session.render_count(), 1);
}

#[test]
fn failed_section_renders_fallback_text() {
	let fx = Fixture::new(DashboardOptions::default());
	let dashboard = TestDashboard::new("[{remote}]\n{help}", vec![], |_| {
		SectionRegistry::builder()
			.section("remote", || Err::<String, _>(SectionError::failed("no upstream configured")))
			.section("help", || Ok::<_, SectionError>("?"))
			.build()
	});

	let session = DashboardSession::open(&fx.env, Arc::new(dashboard), fx.key.clone()).unwrap();

	let document = session.document().unwrap();
	assert_eq!(document.text(), "[  ! no upstream configured]\n?");
	assert_eq!(document.slice("remote"), Some("  ! no upstream configured"));
}

#[test]
fn command_failure_is_shown_in_place() {
	let fx = Fixture::new(DashboardOptions {
		fallback_prefix: "E: ".into(),
		..DashboardOptions::default()
	});
	let dashboard = TestDashboard::new("tags:\n{tags}", vec![], |ctx| {
		let ctx = ctx.clone();
		SectionRegistry::builder()
			.section("tags", move || Ok::<_, SectionError>(ctx.run(&CommandSpec::new("git").arg("tag"))?.stdout))
			.build()
	});

	let session = DashboardSession::open(&fx.env, Arc::new(dashboard), fx.key.clone()).unwrap();
	assert_eq!(session.document().unwrap().text(), "tags:\nE: commands are disabled");
}

#[test]
fn close_is_idempotent_and_ignores_later_updates() {
	let fx = Fixture::new(DashboardOptions::default());
	let dashboard = Arc::new(branch_dashboard());
	let session = DashboardSession::open(&fx.env, dashboard.clone(), fx.key.clone()).unwrap();
	assert_eq!(fx.env.store.subscriptions().len(), 1);

	session.close();
	session.close();

	assert!(!session.is_live());
	assert_eq!(fx.view.closed(), 1);
	assert_eq!(dashboard.closes.load(Ordering::SeqCst), 1);
	assert_eq!(fx.env.store.subscriptions().len(), 0);
	assert!(session.document().is_none());

	fx.update(PartialState::new().set("head", "after-close"));
	assert_eq!(session.render_count(), 1);
	assert!(matches!(session.render(RenderRequest::refresh()), Err(DashboardError::Closed(_))));
	assert!(!session.update_section("head", "x"));
	session.request_render(RenderRequest::refresh()).unwrap();
	fx.env.render_queue().flush_blocking().unwrap();
	assert_eq!(fx.view.texts().len(), 1);
}

#[test]
fn dropping_last_handle_releases_subscription() {
	let fx = Fixture::new(DashboardOptions::default());
	let session = DashboardSession::open(&fx.env, Arc::new(branch_dashboard()), fx.key.clone()).unwrap();
	let liveness = session.liveness();
	let copy = session.clone();
	assert_eq!(fx.env.store.subscriptions().len(), 1);

	drop(session);
	assert_eq!(fx.env.store.subscriptions().len(), 1);
	drop(copy);

	assert_eq!(fx.env.store.subscriptions().len(), 0);
	assert!(!liveness.is_live());
	fx.update(PartialState::new().set("head", "after-drop"));
	assert_eq!(fx.view.texts().len(), 1);
}

#[test]
fn queued_render_after_close_is_dropped() {
	let fx = Fixture::new(DashboardOptions::default());
	let session = DashboardSession::open(&fx.env, Arc::new(branch_dashboard()), fx.key.clone()).unwrap();

	let gate = Arc::new(std::sync::Barrier::new(2));
	let release = Arc::new(std::sync::Barrier::new(2));
	{
		let gate = Arc::clone(&gate);
		let release = Arc::clone(&release);
		fx.env.render_queue().submit(move || {
			gate.wait();
			release.wait();
		})
		.unwrap();
	}
	gate.wait();
	fx.env.store.update(&fx.key, PartialState::new().set("head", "late"));
	session.close();
	release.wait();
	fx.env.render_queue().flush_blocking().unwrap();

	assert_eq!(session.render_count(), 1);
	assert_eq!(fx.view.texts().len(), 1);
}

#[test]
fn update_section_replaces_text_in_place() {
	let fx = Fixture::new(DashboardOptions::default());
	fx.env.store.update(&fx.key, PartialState::new().set("head", "main").set("files", "M a.rs"));
	let session = DashboardSession::open(&fx.env, Arc::new(branch_dashboard()), fx.key.clone()).unwrap();

	assert!(session.update_section("head", "main (fetching...)"));
	assert!(!session.update_section("stashes", "none"));

	let document = session.document().unwrap();
	assert_eq!(document.text(), "HEAD: main (fetching...)\nM a.rs");
	assert_eq!(document.slice("files"), Some("M a.rs"));
	assert_eq!(fx.view.texts().last().map(String::as_str), Some("HEAD: main (fetching...)\nM a.rs"));
}

#[test]
fn open_moves_cursor_to_cursor_section() {
	let fx = Fixture::new(DashboardOptions::default());
	fx.env.store.update(&fx.key, PartialState::new().set("head", "main").set("files", "M a.rs"));
	DashboardSession::open(&fx.env, Arc::new(branch_dashboard().with_cursor("files")), fx.key.clone()).unwrap();

	assert_eq!(fx.view.cursors(), [11]);
}

#[test]
fn cursor_follows_moved_section() {
	let fx = Fixture::new(DashboardOptions::default());
	fx.env.store.update(&fx.key, PartialState::new().set("head", "main").set("files", "M a.rs"));
	let _session = DashboardSession::open(&fx.env, Arc::new(branch_dashboard().with_cursor("files")), fx.key.clone()).unwrap();
	*fx.view.selection.lock() = vec![Region::point(12)];

	fx.update(PartialState::new().set("head", "feature/long-name"));
	assert_eq!(fx.view.cursors(), [11, 24]);

	// Still inside the section after a refresh: left alone.
	*fx.view.selection.lock() = vec![Region::point(26)];
	fx.update(PartialState::new().set("files", "M a.rs\nA b.rs"));
	assert_eq!(fx.view.cursors(), [11, 24]);
}

#[test]
fn cursor_outside_section_is_left_alone() {
	let fx = Fixture::new(DashboardOptions::default());
	fx.env.store.update(&fx.key, PartialState::new().set("head", "main").set("files", "M a.rs"));
	let _session = DashboardSession::open(&fx.env, Arc::new(branch_dashboard().with_cursor("files")), fx.key.clone()).unwrap();
	*fx.view.selection.lock() = vec![Region::point(2)];

	fx.update(PartialState::new().set("head", "feature/long-name"));
	assert_eq!(fx.view.cursors(), [11]);
}

#[test]
fn reset_on_refresh_option_always_moves_cursor() {
	let fx = Fixture::new(DashboardOptions {
		reset_cursor_on_refresh: true,
		..DashboardOptions::default()
	});
	fx.env.store.update(&fx.key, PartialState::new().set("files", "M a.rs"));
	let session = DashboardSession::open(&fx.env, Arc::new(branch_dashboard().with_cursor("files")), fx.key.clone()).unwrap();
	*fx.view.selection.lock() = vec![Region::point(0)];

	fx.update(PartialState::new().set("head", "dev"));
	session.render(RenderRequest::refresh()).unwrap();
	assert_eq!(fx.view.cursors(), [7, 10, 10]);
}

#[test]
fn renders_never_overlap() {
	let fx = Fixture::new(DashboardOptions::default());
	let active = Arc::new(AtomicUsize::new(0));
	let overlaps = Arc::new(AtomicUsize::new(0));
	let (a, o) = (Arc::clone(&active), Arc::clone(&overlaps));
	let dashboard = TestDashboard::new("{slow}", vec![], move |_| {
		let (active, overlaps) = (Arc::clone(&a), Arc::clone(&o));
		SectionRegistry::builder()
			.section("slow", move || {
				if active.fetch_add(1, Ordering::SeqCst) > 0 {
					overlaps.fetch_add(1, Ordering::SeqCst);
				}
				std::thread::sleep(std::time::Duration::from_millis(1));
				active.fetch_sub(1, Ordering::SeqCst);
				Ok::<_, SectionError>("done")
			})
			.build()
	});
	let session = DashboardSession::open(&fx.env, Arc::new(dashboard), fx.key.clone()).unwrap();

	let threads: Vec<_> = (0..4)
		.map(|_| {
			let session = session.clone();
			std::thread::spawn(move || {
				for _ in 0..10 {
					session.render(RenderRequest::refresh()).unwrap();
				}
			})
		})
		.collect();
	for thread in threads {
		thread.join().unwrap();
	}

	assert_eq!(overlaps.load(Ordering::SeqCst), 0);
	assert!(session.render_count() >= 2);
	assert_eq!(session.document().unwrap().text(), "done");
}

#[test]
fn state_fields_decode_through_context() {
	let fx = Fixture::new(DashboardOptions::default());
	fx.env.store.update(&fx.key, PartialState::new().set("ahead", json!(3)));
	let dashboard = TestDashboard::new("ahead {ahead}", vec!["ahead"], |ctx| {
		let ctx = ctx.clone();
		SectionRegistry::builder()
			.section("ahead", move || Ok::<_, SectionError>(ctx.field::<u32>("ahead")?.map_or_else(String::new, |n| format!("{n}"))))
			.build()
	});
	let session = DashboardSession::open(&fx.env, Arc::new(dashboard), fx.key.clone()).unwrap();
	assert_eq!(session.document().unwrap().text(), "ahead 3");

	fx.update(PartialState::new().set("ahead", "many"));
	assert!(session.document().unwrap().text().starts_with("ahead   ! cannot decode field `ahead`"));
}
