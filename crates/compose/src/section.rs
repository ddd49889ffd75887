use std::sync::Arc;

use crate::SectionError;

/// Render function of a section.
pub type RenderFn = Arc<dyn Fn() -> Result<RenderResult, SectionError> + Send + Sync>;

/// Output of a section's render function.
pub enum RenderResult {
	/// Final text for the placeholder.
	Plain(String),
	/// A sub-template spliced in verbatim, whose placeholders are resolved by `sections`.
	Expansion { template: String, sections: Vec<Section> },
}

impl RenderResult {
	pub fn expansion(template: impl Into<String>, sections: impl IntoIterator<Item = Section>) -> Self {
		Self::Expansion {
			template: template.into(),
			sections: sections.into_iter().collect(),
		}
	}

	/// Returns the text spliced in for the section itself.
	pub fn text(&self) -> &str {
		match self {
			Self::Plain(text) => text,
			Self::Expansion { template, .. } => template,
		}
	}
}

impl std::fmt::Debug for RenderResult {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Plain(text) => f.debug_tuple("Plain").field(text).finish(),
			Self::Expansion { template, sections } => f
				.debug_struct("Expansion")
				.field("template", template)
				.field("sections", &sections.iter().map(Section::name).collect::<Vec<_>>())
				.finish(),
		}
	}
}

impl From<String> for RenderResult {
	fn from(text: String) -> Self {
		Self::Plain(text)
	}
}

impl From<&str> for RenderResult {
	fn from(text: &str) -> Self {
		Self::Plain(text.to_string())
	}
}

/// A named, independently rendered text fragment.
#[derive(Clone)]
pub struct Section {
	name: Arc<str>,
	render: RenderFn,
}

impl std::fmt::Debug for Section {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Section").field("name", &self.name).finish_non_exhaustive()
	}
}

impl Section {
	pub fn new<F, R>(name: impl Into<Arc<str>>, render: F) -> Self
	where
		F: Fn() -> Result<R, SectionError> + Send + Sync + 'static,
		R: Into<RenderResult>,
	{
		Self {
			name: name.into(),
			render: Arc::new(move || render().map(Into::into)),
		}
	}

	/// Section that always renders `text`.
	pub fn fixed(name: impl Into<Arc<str>>, text: impl Into<String>) -> Self {
		let text = text.into();
		Self::new(name, move || Ok::<_, SectionError>(text.clone()))
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn render(&self) -> Result<RenderResult, SectionError> {
		(self.render)()
	}
}
