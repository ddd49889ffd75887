//! Placeholder syntax and template text helpers.
//!
//! A placeholder is `{name}`, optionally prefixed with backspace markers:
//! `{< name}` or `{<<< name}`. Each `<` removes one character of the output
//! right before the placeholder, which lets a template drop a separator line
//! when the section renders empty.

use std::sync::LazyLock;

use regex::Regex;

use crate::{ComposeError, Result};

static ANY_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(?:<+ )?([^{}\s<]+)\}").expect("placeholder regex is valid"));

/// One placeholder occurrence, in byte offsets of the searched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderMatch {
	pub start: usize,
	pub end: usize,
	/// Number of `<` markers.
	pub backspaces: usize,
}

/// Finds the placeholders of one section name.
#[derive(Debug, Clone)]
pub struct PlaceholderPattern {
	regex: Regex,
}

impl PlaceholderPattern {
	pub fn new(name: &str) -> Result<Self> {
		let regex = Regex::new(&format!(r"\{{(<+ )?{}\}}", regex::escape(name))).map_err(|source| ComposeError::Pattern {
			name: name.to_string(),
			source,
		})?;
		Ok(Self { regex })
	}

	/// Returns the first occurrence starting at or after byte offset `from`.
	pub fn find_at(&self, text: &str, from: usize) -> Option<PlaceholderMatch> {
		let captures = self.regex.captures_at(text, from)?;
		let whole = captures.get(0)?;
		let backspaces = captures.get(1).map_or(0, |markers| markers.as_str().matches('<').count());
		Some(PlaceholderMatch {
			start: whole.start(),
			end: whole.end(),
			backspaces,
		})
	}

	pub fn find(&self, text: &str) -> Option<PlaceholderMatch> {
		self.find_at(text, 0)
	}
}

/// Returns the names of all placeholders left in `text`, in order of appearance.
pub fn placeholder_names(text: &str) -> Vec<&str> {
	ANY_PLACEHOLDER
		.captures_iter(text)
		.filter_map(|captures| captures.get(1))
		.map(|name| name.as_str())
		.collect()
}

/// Removes the leading whitespace common to every non-blank line.
///
/// Lines holding only whitespace are emptied and do not count towards the
/// common margin. Line endings are kept.
pub fn dedent(text: &str) -> String {
	let mut margin: Option<&str> = None;
	for line in text.lines() {
		let content = line.trim_start();
		if content.is_empty() {
			continue;
		}
		let indent = &line[..line.len() - content.len()];
		margin = Some(match margin {
			None => indent,
			Some(current) => common_prefix(current, indent),
		});
	}
	let margin = margin.unwrap_or("");

	let mut out = String::with_capacity(text.len());
	for line in text.split_inclusive('\n') {
		let (body, ending) = match line.strip_suffix('\n') {
			Some(body) => (body, "\n"),
			None => (line, ""),
		};
		if body.trim().is_empty() {
			out.push_str(ending);
		} else {
			out.push_str(body.strip_prefix(margin).unwrap_or(body));
			out.push_str(ending);
		}
	}
	out
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
	let len = a.char_indices().zip(b.chars()).find(|((_, ca), cb)| ca != cb).map_or_else(|| a.len().min(b.len()), |((idx, _), _)| idx);
	&a[..len]
}

/// Dashboard template text, dedented once on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
	text: String,
}

impl Template {
	pub fn new(text: &str) -> Self {
		Self { text: dedent(text) }
	}

	/// Wraps `text` without dedenting it.
	pub fn raw(text: impl Into<String>) -> Self {
		Self { text: text.into() }
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}
}

impl AsRef<str> for Template {
	fn as_ref(&self) -> &str {
		&self.text
	}
}
