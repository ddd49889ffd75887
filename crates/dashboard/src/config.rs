//! Dashboard options and the declarative shell dashboard, loaded from TOML.
//!
//! ```toml
//! fallback_prefix = "  ! "
//! notify = "queued"
//!
//! [dashboard]
//! kind = "status"
//! template = """
//! HEAD: {head}
//!
//! {< log}
//! """
//! fields = ["status"]
//!
//! [[dashboard.section]]
//! name = "head"
//! command = "git"
//! args = ["rev-parse", "--abbrev-ref", "HEAD"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use vitrine_compose::SectionError;
use vitrine_store::DEFAULT_CACHE_CAPACITY;

use crate::ConfigError;

/// How state changes reach dashboard sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
	/// Fan-out runs on a background FIFO queue.
	#[default]
	Queued,
	/// Fan-out runs on the updating thread.
	Inline,
}

/// Settings shared by every dashboard session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardOptions {
	/// Prepended to the message of a section that failed to render.
	pub fallback_prefix: String,
	/// Move the cursor to the cursor section on every refresh, not just on request.
	pub reset_cursor_on_refresh: bool,
	pub notify: NotifyMode,
	/// Entries kept in the shared command output cache.
	pub cache_capacity: usize,
}

impl Default for DashboardOptions {
	fn default() -> Self {
		Self {
			fallback_prefix: "  ! ".to_string(),
			reset_cursor_on_refresh: false,
			notify: NotifyMode::default(),
			cache_capacity: DEFAULT_CACHE_CAPACITY,
		}
	}
}

impl DashboardOptions {
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(input)?)
	}

	/// Text shown in place of a section that failed with `err`.
	pub fn fallback_text(&self, err: &SectionError) -> String {
		format!("{}{err}", self.fallback_prefix)
	}
}

/// A dashboard declared entirely in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSpec {
	pub kind: String,
	#[serde(default)]
	pub title: Option<String>,
	pub template: String,
	/// State fields that trigger a refresh; each is also a section of the same name.
	#[serde(default)]
	pub fields: Vec<String>,
	#[serde(default, rename = "section")]
	pub sections: Vec<SectionSpec>,
	#[serde(default)]
	pub cursor_section: Option<String>,
}

/// A section whose text is the output of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
	pub name: String,
	pub command: String,
	#[serde(default)]
	pub args: Vec<String>,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	#[serde(flatten)]
	pub options: DashboardOptions,
	pub dashboard: Option<DashboardSpec>,
}

impl Config {
	/// Parses and validates a configuration document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads configuration from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&content)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		let Some(dashboard) = &self.dashboard else {
			return Ok(());
		};
		if dashboard.kind.trim().is_empty() {
			return Err(ConfigError::Invalid("dashboard kind must not be empty".into()));
		}
		let names = dashboard.fields.iter().chain(dashboard.sections.iter().map(|section| &section.name));
		for name in names {
			if name.is_empty() || name.contains(|c: char| c.is_whitespace() || matches!(c, '{' | '}' | '<')) {
				return Err(ConfigError::Invalid(format!("`{name}` cannot be used as a section name")));
			}
		}
		if let Some(section) = dashboard.sections.iter().find(|section| section.command.trim().is_empty()) {
			return Err(ConfigError::Invalid(format!("section `{}` has no command", section.name)));
		}
		Ok(())
	}
}
