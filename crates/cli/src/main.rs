//! Vitrine command-line host.
//!
//! Loads a dashboard declared in TOML, opens it for one entity, optionally
//! pushes field values into the state store, and prints the rendered
//! document once every pending notification and render has settled.

mod logging;
mod shell;
mod stdout_view;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use serde_json::Value;
use tracing::info;
use vitrine_dashboard::{Config, DashboardEnv, NotifyMode, ProcessRunner, SessionRegistry};
use vitrine_primitives::EntityKey;
use vitrine_store::{PartialState, StateStore};
use vitrine_worker::{TaskClass, WorkQueue, WorkerRegistry};

use crate::shell::ShellDashboard;
use crate::stdout_view::StdoutView;

/// Render a configured dashboard to stdout.
#[derive(Parser, Debug)]
#[command(name = "vitrine", version)]
struct Args {
	/// Dashboard configuration file
	#[arg(short, long, value_name = "PATH")]
	config: PathBuf,

	/// Entity the dashboard shows (defaults to the current directory)
	#[arg(short, long, value_name = "KEY")]
	entity: Option<String>,

	/// Set a state field before printing; VALUE is JSON or a bare string
	#[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
	set: Vec<(String, Value)>,

	/// Print the section regions after the document
	#[arg(long)]
	regions: bool,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

fn parse_assignment(input: &str) -> Result<(String, Value), String> {
	let Some((field, value)) = input.split_once('=') else {
		return Err(format!("expected FIELD=VALUE, got `{input}`"));
	};
	let field = field.trim();
	if field.is_empty() {
		return Err(format!("empty field name in `{input}`"));
	}
	let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
	Ok((field.to_string(), value))
}

/// Starts the store's notification queue when updates are delivered in the background.
fn notify_queue(mode: NotifyMode, workers: &WorkerRegistry) -> io::Result<Option<WorkQueue>> {
	match mode {
		NotifyMode::Queued => WorkQueue::with_registry("store-notify", TaskClass::Notify, workers.clone()).map(Some),
		NotifyMode::Inline => Ok(None),
	}
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	logging::init(args.verbose);

	let config = Config::load(&args.config).with_context(|| format!("loading {}", args.config.display()))?;
	let Some(spec) = config.dashboard.clone() else {
		bail!("{} declares no [dashboard]", args.config.display());
	};

	let workers = WorkerRegistry::new();
	let notify = notify_queue(config.options.notify, &workers)?;
	let store = Arc::new(match &notify {
		Some(queue) => StateStore::builder().queued(queue.clone()).build(),
		None => StateStore::new(),
	});
	let view = Arc::new(StdoutView::new());
	let env = DashboardEnv::with_workers(Arc::clone(&store), view.clone(), Arc::new(ProcessRunner::new()), config.options.clone(), workers.clone())?;

	let key = match &args.entity {
		Some(entity) => EntityKey::from(entity.as_str()),
		None => EntityKey::from(std::env::current_dir().context("reading current directory")?.as_path()),
	};
	info!(entity = %key, kind = %spec.kind, "cli.open");

	let registry = SessionRegistry::new();
	let session = registry.open_or_refresh(&env, Arc::new(ShellDashboard::new(spec)), key.clone())?;

	if !args.set.is_empty() {
		let mut partial = PartialState::new();
		for (field, value) in args.set {
			partial.insert(field, value);
		}
		store.update(&key, partial);
	}
	if let Some(queue) = &notify {
		queue.flush_blocking()?;
	}
	env.render_queue().flush_blocking()?;

	let written = view.write_document(session.id(), &mut io::stdout().lock(), args.regions)?;
	if !written {
		tracing::warn!(session = %session.id(), "cli.nothing_rendered");
	}

	for record in workers.snapshots() {
		tracing::debug!(queue = %record.name, submitted = record.submitted, completed = record.completed, panicked = record.panicked, "cli.worker");
	}
	registry.close_all();
	env.render_queue().shutdown();
	if let Some(queue) = notify {
		queue.shutdown();
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn args_are_well_formed() {
		Args::command().debug_assert();
	}

	#[test]
	fn assignment_values_parse_as_json_or_text() {
		assert_eq!(parse_assignment("ahead=2"), Ok(("ahead".into(), json!(2))));
		assert_eq!(parse_assignment("branches=[\"main\",null]"), Ok(("branches".into(), json!(["main", null]))));
		assert_eq!(parse_assignment("head=main"), Ok(("head".into(), json!("main"))));
		assert_eq!(parse_assignment("note=a=b"), Ok(("note".into(), json!("a=b"))));
		assert!(parse_assignment("head").is_err());
		assert!(parse_assignment(" =1").is_err());
	}

	#[test]
	fn queued_notify_registers_its_queue() {
		let workers = WorkerRegistry::new();
		assert!(notify_queue(NotifyMode::Inline, &workers).unwrap().is_none());
		assert!(workers.snapshots().is_empty());

		let queue = notify_queue(NotifyMode::Queued, &workers).unwrap().unwrap();
		queue.submit(|| {}).unwrap();
		queue.flush_blocking().unwrap();
		let record = workers.get("store-notify").unwrap();
		assert_eq!((record.class, record.completed), (TaskClass::Notify, 1));
		queue.shutdown();
	}

	#[test]
	fn set_accepts_repeated_assignments() {
		let args = Args::try_parse_from(["vitrine", "-c", "dash.toml", "--set", "a=1", "--set", "b=x"]).unwrap();
		assert_eq!(args.set, vec![("a".to_string(), json!(1)), ("b".to_string(), json!("x"))]);
		assert_eq!(args.entity, None);
	}
}
