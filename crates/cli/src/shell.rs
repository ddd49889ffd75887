//! Dashboard declared in configuration, with sections fed by shell commands
//! and state fields.

use std::path::Path;

use vitrine_compose::{SectionError, SectionRegistry, Template};
use vitrine_dashboard::{CommandSpec, Dashboard, DashboardSpec, RenderContext};
use vitrine_primitives::EntityKey;
use vitrine_store::{FieldSet, FieldValue};

pub struct ShellDashboard {
	spec: DashboardSpec,
	template: Template,
	fields: FieldSet,
}

impl ShellDashboard {
	pub fn new(spec: DashboardSpec) -> Self {
		let template = Template::new(&spec.template);
		let fields = spec.fields.iter().map(String::as_str).collect();
		Self { spec, template, fields }
	}
}

impl Dashboard for ShellDashboard {
	fn kind(&self) -> &str {
		&self.spec.kind
	}

	fn title(&self, key: &EntityKey) -> String {
		match &self.spec.title {
			Some(title) => title.clone(),
			None => format!("{}: {key}", self.spec.kind),
		}
	}

	fn template(&self) -> &Template {
		&self.template
	}

	fn watched_fields(&self) -> FieldSet {
		self.fields.clone()
	}

	fn sections(&self, ctx: &RenderContext) -> SectionRegistry {
		let mut builder = SectionRegistry::builder();
		for field in &self.spec.fields {
			let ctx = ctx.clone();
			let name = field.clone();
			builder = builder.section(field, move || Ok::<_, SectionError>(field_text(ctx.snapshot().get(&name))));
		}
		for section in &self.spec.sections {
			let ctx = ctx.clone();
			let mut spec = CommandSpec::new(&section.command).args(section.args.iter().cloned());
			if Path::new(ctx.key().as_str()).is_dir() {
				spec = spec.current_dir(ctx.key().as_str());
			}
			builder = builder.section(&section.name, move || {
				let output = ctx.run(&spec)?;
				Ok::<_, SectionError>(output.stdout.trim_end_matches('\n').to_string())
			});
		}
		builder.build()
	}

	fn cursor_section(&self) -> Option<&str> {
		self.spec.cursor_section.as_deref()
	}
}

/// Strings render bare, absent and null fields as nothing, anything else as JSON.
fn field_text(value: Option<&FieldValue>) -> String {
	match value {
		None | Some(FieldValue::Null) => String::new(),
		Some(FieldValue::String(text)) => text.clone(),
		Some(other) => other.to_string(),
	}
}
