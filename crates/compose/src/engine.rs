use std::collections::VecDeque;
use std::sync::Arc;

use vitrine_primitives::{Region, RegionMap, shift_regions};

use crate::template::{PlaceholderPattern, placeholder_names};
use crate::{RenderResult, RenderedDocument, Result, Section, SectionError, SectionRegistry};

/// Turns a failed section into the text shown in its place.
pub type FallbackFn = Arc<dyn Fn(&str, &SectionError) -> String + Send + Sync>;

/// Resolves section placeholders in a template.
#[derive(Clone)]
pub struct Composer {
	fallback: FallbackFn,
}

impl std::fmt::Debug for Composer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Composer").finish_non_exhaustive()
	}
}

impl Default for Composer {
	/// Failed sections render as empty text.
	fn default() -> Self {
		Self::with_fallback(|_, _| String::new())
	}
}

impl Composer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_fallback(fallback: impl Fn(&str, &SectionError) -> String + Send + Sync + 'static) -> Self {
		Self { fallback: Arc::new(fallback) }
	}

	/// Renders every section of `registry` into `template`.
	///
	/// Sections are processed in registration order, each render function
	/// exactly once, even when its placeholder does not occur. Every
	/// occurrence of a section's placeholder is replaced; its region covers
	/// the last non-empty insertion. Child sections of an expansion are queued
	/// after everything already pending and never enter `registry`.
	pub fn compose(&self, template: &str, registry: &SectionRegistry) -> Result<RenderedDocument> {
		let mut text = template.to_string();
		let mut regions = RegionMap::new();
		let mut pending: VecDeque<Section> = registry.iter().cloned().collect();

		while let Some(section) = pending.pop_front() {
			let content = match section.render() {
				Ok(RenderResult::Plain(content)) => content,
				Ok(RenderResult::Expansion { template, sections }) => {
					tracing::trace!(section = section.name(), children = sections.len(), "compose.expand");
					pending.extend(sections);
					template
				}
				Err(err) => {
					tracing::warn!(section = section.name(), error = %err, "compose.section_failed");
					(self.fallback)(section.name(), &err)
				}
			};
			let occurrences = splice_section(&mut text, &mut regions, section.name(), &content)?;
			tracing::trace!(section = section.name(), occurrences, "compose.section");
		}

		let unresolved = placeholder_names(&text);
		if !unresolved.is_empty() {
			tracing::debug!(?unresolved, "compose.unresolved");
		}
		Ok(RenderedDocument::new(text, regions))
	}
}

/// Replaces every placeholder of `name` in `text` with `content`, returning
/// the number of occurrences.
///
/// Searching resumes after each insertion, so content that happens to contain
/// its own placeholder is left alone.
fn splice_section(text: &mut String, regions: &mut RegionMap, name: &str, content: &str) -> Result<usize> {
	let pattern = PlaceholderPattern::new(name)?;
	let new_len = content.chars().count();
	let mut from = 0;
	let mut occurrences = 0;

	while let Some(found) = pattern.find_at(text, from) {
		let start = backspace(text, found.start, found.backspaces);
		let idx = text[..start].chars().count();
		let orig_len = text[start..found.end].chars().count();

		text.replace_range(start..found.end, content);
		shift_regions(regions, idx, orig_len, new_len);
		if new_len > 0 {
			regions.insert(name.to_string(), Region::with_len(idx, new_len));
		}

		from = start + content.len();
		occurrences += 1;
	}
	Ok(occurrences)
}

/// Moves byte offset `at` back by `count` characters, stopping at the start of `text`.
fn backspace(text: &str, at: usize, count: usize) -> usize {
	if count == 0 {
		return at;
	}
	text[..at].char_indices().rev().nth(count - 1).map_or(0, |(byte, _)| byte)
}
