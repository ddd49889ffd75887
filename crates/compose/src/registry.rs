use std::sync::Arc;

use indexmap::IndexMap;

use crate::{RenderResult, Section, SectionError};

/// Ordered set of sections a dashboard declares.
///
/// Sections are resolved in registration order. Declaring a name twice
/// replaces its render function but keeps the first position.
#[derive(Debug, Clone, Default)]
pub struct SectionRegistry {
	sections: IndexMap<Arc<str>, Section>,
}

impl SectionRegistry {
	pub fn builder() -> SectionRegistryBuilder {
		SectionRegistryBuilder::default()
	}

	pub fn get(&self, name: &str) -> Option<&Section> {
		self.sections.get(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.sections.keys().map(|name| &**name)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Section> {
		self.sections.values()
	}

	pub fn len(&self) -> usize {
		self.sections.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sections.is_empty()
	}
}

/// Builder for [`SectionRegistry`].
#[derive(Debug, Default)]
pub struct SectionRegistryBuilder {
	sections: IndexMap<Arc<str>, Section>,
}

impl SectionRegistryBuilder {
	/// Declares section `name` rendered by `render`.
	pub fn section<F, R>(self, name: &str, render: F) -> Self
	where
		F: Fn() -> Result<R, SectionError> + Send + Sync + 'static,
		R: Into<RenderResult>,
	{
		self.push(Section::new(name, render))
	}

	pub fn push(mut self, section: Section) -> Self {
		let name: Arc<str> = Arc::from(section.name());
		self.sections.insert(name, section);
		self
	}

	pub fn build(self) -> SectionRegistry {
		SectionRegistry { sections: self.sections }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn redeclaring_keeps_position() {
		let registry = SectionRegistry::builder()
			.section("head", || Ok::<_, SectionError>("old"))
			.section("stashes", || Ok::<_, SectionError>(""))
			.section("head", || Ok::<_, SectionError>("new"))
			.build();

		assert_eq!(registry.names().collect::<Vec<_>>(), ["head", "stashes"]);
		let head = registry.get("head").unwrap().render().unwrap();
		assert_eq!(head.text(), "new");
	}
}
