use vitrine_primitives::region::char_to_byte;
use vitrine_primitives::{CharLen, Region, RegionMap, shift_regions};

/// Output of a composition pass: the final text and where each section landed.
///
/// Regions are character ranges into `text`. Sections that rendered empty,
/// or whose placeholder never appeared, have no region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocument {
	text: String,
	regions: RegionMap,
}

impl RenderedDocument {
	pub fn new(text: String, regions: RegionMap) -> Self {
		Self { text, regions }
	}

	pub fn text(&self) -> &str {
		&self.text
	}

	pub fn regions(&self) -> &RegionMap {
		&self.regions
	}

	pub fn region(&self, name: &str) -> Option<Region> {
		self.regions.get(name).copied()
	}

	/// Returns the text currently covered by section `name`.
	pub fn slice(&self, name: &str) -> Option<&str> {
		self.regions.get(name)?.slice(&self.text)
	}

	/// Length of the text in characters.
	pub fn char_len(&self) -> CharLen {
		self.text.chars().count()
	}

	pub fn into_parts(self) -> (String, RegionMap) {
		(self.text, self.regions)
	}

	/// Replaces the text of section `name` in place and shifts the other regions.
	///
	/// Returns `false`, leaving the document untouched, if `name` has no region.
	pub fn replace_section(&mut self, name: &str, content: &str) -> bool {
		let Some(region) = self.regions.get(name).copied() else {
			return false;
		};
		let (Some(start), Some(end)) = (char_to_byte(&self.text, region.start), char_to_byte(&self.text, region.end)) else {
			tracing::warn!(section = name, ?region, "compose.region_out_of_bounds");
			return false;
		};
		self.text.replace_range(start..end, content);
		shift_regions(&mut self.regions, region.start, region.len(), content.chars().count());
		true
	}
}

/// Region changes between two renders of the same view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionDiff {
	/// Every region of the new document; the view re-applies all of them.
	pub upserted: Vec<(String, Region)>,
	/// Names present before and absent now.
	pub removed: Vec<String>,
}

pub fn diff_regions(previous: &RegionMap, next: &RegionMap) -> RegionDiff {
	RegionDiff {
		upserted: next.iter().map(|(name, region)| (name.clone(), *region)).collect(),
		removed: previous.keys().filter(|name| !next.contains_key(*name)).cloned().collect(),
	}
}
