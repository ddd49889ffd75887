//! View layer that keeps the latest document per session and prints it on demand.

use std::collections::HashMap;
use std::io::{self, Write};

use parking_lot::Mutex;
use vitrine_compose::{RenderedDocument, diff_regions};
use vitrine_dashboard::ViewLayer;
use vitrine_primitives::{RegionMap, SessionId};

const PREVIEW_CHARS: usize = 24;

#[derive(Debug, Default)]
pub struct StdoutView {
	documents: Mutex<HashMap<SessionId, RenderedDocument>>,
}

impl StdoutView {
	pub fn new() -> Self {
		Self::default()
	}

	/// Writes the last document shown for `session`, followed by its region
	/// table when `with_regions` is set. Returns false if nothing was shown.
	pub fn write_document(&self, session: SessionId, out: &mut impl Write, with_regions: bool) -> io::Result<bool> {
		let documents = self.documents.lock();
		let Some(document) = documents.get(&session) else {
			return Ok(false);
		};
		out.write_all(document.text().as_bytes())?;
		if with_regions {
			if !document.text().ends_with('\n') {
				writeln!(out)?;
			}
			writeln!(out, "---")?;
			for (name, region) in document.regions() {
				let preview = region.slice(document.text()).map(preview).unwrap_or_default();
				writeln!(out, "{name:<16} {:>5}..{:<5} {preview:?}", region.start, region.end)?;
			}
		}
		out.flush()?;
		Ok(true)
	}
}

fn preview(text: &str) -> String {
	let mut chars = text.chars();
	let mut out: String = chars.by_ref().take(PREVIEW_CHARS).collect();
	if chars.next().is_some() {
		out.push('…');
	}
	out
}

impl ViewLayer for StdoutView {
	fn apply_document(&self, session: SessionId, document: &RenderedDocument, previous: &RegionMap) {
		let diff = diff_regions(previous, document.regions());
		tracing::debug!(
			%session,
			chars = document.char_len(),
			regions = diff.upserted.len(),
			removed = diff.removed.len(),
			"view.apply"
		);
		self.documents.lock().insert(session, document.clone());
	}

	fn on_close(&self, session: SessionId) {
		self.documents.lock().remove(&session);
	}
}
