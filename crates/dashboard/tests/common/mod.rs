#![allow(dead_code)]

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use vitrine_compose::RenderedDocument;
use vitrine_dashboard::{CommandError, CommandOutput, CommandRunner, CommandSpec, ViewLayer};
use vitrine_primitives::{RegionMap, SessionId};

/// View remembering the last document of every session.
#[derive(Default)]
pub struct MemoryView {
	pub documents: Mutex<HashMap<SessionId, RenderedDocument>>,
	pub applied: Mutex<Vec<SessionId>>,
	pub closed: Mutex<Vec<SessionId>>,
}

impl MemoryView {
	pub fn text(&self, session: SessionId) -> Option<String> {
		self.documents.lock().get(&session).map(|doc| doc.text().to_string())
	}
}

impl ViewLayer for MemoryView {
	fn apply_document(&self, session: SessionId, document: &RenderedDocument, _previous: &RegionMap) {
		self.documents.lock().insert(session, document.clone());
		self.applied.lock().push(session);
	}

	fn on_close(&self, session: SessionId) {
		self.documents.lock().remove(&session);
		self.closed.lock().push(session);
	}
}

/// Runner answering from a fixed table of command lines.
#[derive(Default)]
pub struct ScriptedRunner {
	pub responses: Mutex<HashMap<String, Result<String, String>>>,
	pub calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
	pub fn respond(self, command: &str, stdout: &str) -> Self {
		self.responses.lock().insert(command.to_string(), Ok(stdout.to_string()));
		self
	}

	pub fn fail(self, command: &str, message: &str) -> Self {
		self.responses.lock().insert(command.to_string(), Err(message.to_string()));
		self
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().clone()
	}
}

impl CommandRunner for ScriptedRunner {
	fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
		let line = spec.to_string();
		self.calls.lock().push(line.clone());
		match self.responses.lock().get(&line) {
			Some(Ok(stdout)) => Ok(CommandOutput {
				stdout: stdout.clone(),
				..CommandOutput::default()
			}),
			Some(Err(message)) => Err(CommandError::new(spec, message.clone())),
			None => Err(CommandError::new(spec, format!("unexpected command `{line}`"))),
		}
	}
}

/// Polls `check` until it holds or five seconds pass.
pub fn wait_until(mut check: impl FnMut() -> bool) -> bool {
	let deadline = Instant::now() + Duration::from_secs(5);
	while Instant::now() < deadline {
		if check() {
			return true;
		}
		std::thread::sleep(Duration::from_millis(5));
	}
	check()
}
