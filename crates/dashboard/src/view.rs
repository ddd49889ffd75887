use vitrine_compose::RenderedDocument;
use vitrine_primitives::{CharIdx, Region, RegionMap, SessionId};

/// Surface that displays dashboard documents.
///
/// Calls for one session never overlap. Implementations must not call back
/// into the session that is invoking them.
pub trait ViewLayer: Send + Sync {
	/// Replaces the visible content of `session` with `document`.
	///
	/// `previous` holds the regions of the document shown before, so the view
	/// can erase highlights of sections that disappeared.
	fn apply_document(&self, session: SessionId, document: &RenderedDocument, previous: &RegionMap);

	/// Current cursor positions of `session`, as character ranges.
	fn selection(&self, _session: SessionId) -> Vec<Region> {
		Vec::new()
	}

	fn set_cursor(&self, _session: SessionId, _pos: CharIdx) {}

	/// The session was closed; release anything held for it.
	fn on_close(&self, session: SessionId);
}
