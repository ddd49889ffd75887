use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A position in a rendered document, measured in characters (not bytes).
pub type CharIdx = usize;

/// A length or count in a rendered document, measured in characters (not bytes).
///
/// This is distinct from CharIdx to avoid accidentally passing an index
/// where a length is expected or vice versa.
pub type CharLen = usize;

/// Named regions of one rendered document, in the order they were first recorded.
pub type RegionMap = IndexMap<String, Region>;

/// A half-open character range `[start, end)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
	/// First character covered by the region.
	pub start: CharIdx,
	/// One past the last character covered by the region.
	pub end: CharIdx,
}

impl Region {
	/// Creates a region from `start` to `end`.
	///
	/// `start` must not be greater than `end`.
	pub fn new(start: CharIdx, end: CharIdx) -> Self {
		debug_assert!(start <= end, "region start {start} is after end {end}");
		Self { start, end }
	}

	/// Creates a zero-width region at the given position.
	pub fn point(pos: CharIdx) -> Self {
		Self::new(pos, pos)
	}

	/// Creates a region starting at `start` covering `len` characters.
	pub fn with_len(start: CharIdx, len: CharLen) -> Self {
		Self::new(start, start + len)
	}

	/// Returns the length of the region in characters.
	#[inline]
	pub fn len(&self) -> CharLen {
		self.end - self.start
	}

	/// Returns true if the region covers no characters.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}

	/// Returns true if the position is within the region (exclusive of end).
	pub fn contains(&self, pos: CharIdx) -> bool {
		pos >= self.start && pos < self.end
	}

	/// Returns true if `other` lies entirely within this region.
	pub fn contains_region(&self, other: &Region) -> bool {
		other.start >= self.start && other.end <= self.end
	}

	/// Returns the region as a `start..end` range.
	pub fn as_range(&self) -> std::ops::Range<CharIdx> {
		self.start..self.end
	}

	/// Returns the region as a `(start, end)` pair.
	pub fn as_tuple(&self) -> (CharIdx, CharIdx) {
		(self.start, self.end)
	}

	/// Returns this region adjusted for a splice at `idx` that changed the text length by `shift`.
	///
	/// A region starting strictly after the splice site moves as a whole. A
	/// region that spans the site, or starts exactly on it, only has its end
	/// moved. Anything left of the site is untouched. The first matching rule
	/// wins, which decides the outcome for regions sharing a boundary with the
	/// site.
	pub fn adjusted(self, idx: CharIdx, shift: isize) -> Self {
		if self.start > idx {
			Self {
				start: self.start.saturating_add_signed(shift),
				end: self.end.saturating_add_signed(shift),
			}
		} else if self.end > idx || self.start == idx {
			Self {
				start: self.start,
				end: self.end.saturating_add_signed(shift).max(self.start),
			}
		} else {
			self
		}
	}

	/// Extracts the text covered by this region from `text`.
	///
	/// Returns `None` if the region reaches past the end of `text`.
	pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
		let start = char_to_byte(text, self.start)?;
		let end = char_to_byte(text, self.end)?;
		text.get(start..end)
	}
}

impl From<std::ops::Range<CharIdx>> for Region {
	fn from(range: std::ops::Range<CharIdx>) -> Self {
		Self::new(range.start, range.end)
	}
}

impl From<(CharIdx, CharIdx)> for Region {
	fn from((start, end): (CharIdx, CharIdx)) -> Self {
		Self::new(start, end)
	}
}

/// Adjusts every region in `regions` for a splice that replaced `orig_len`
/// characters at `idx` with `new_len` characters.
pub fn shift_regions(regions: &mut RegionMap, idx: CharIdx, orig_len: CharLen, new_len: CharLen) {
	let shift = new_len as isize - orig_len as isize;
	if shift == 0 {
		return;
	}
	for region in regions.values_mut() {
		*region = region.adjusted(idx, shift);
	}
}

/// Converts a character index into a byte offset within `text`.
///
/// Returns `None` when `idx` is past the end of `text`. An index equal to the
/// character count maps to `text.len()`.
pub fn char_to_byte(text: &str, idx: CharIdx) -> Option<usize> {
	if idx == 0 {
		return Some(0);
	}
	let mut chars = 0;
	for (byte, _) in text.char_indices() {
		if chars == idx {
			return Some(byte);
		}
		chars += 1;
	}
	(chars == idx).then_some(text.len())
}
