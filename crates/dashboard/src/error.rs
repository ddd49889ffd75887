use std::path::PathBuf;

use vitrine_compose::ComposeError;
use vitrine_primitives::SessionId;
use vitrine_worker::QueueError;

/// A convenient type alias for `Result` with `E` = [`DashboardError`].
pub type Result<T, E = DashboardError> = std::result::Result<T, E>;

/// Session lifecycle and rendering failures.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
	#[error(transparent)]
	Compose(#[from] ComposeError),
	/// The render queue no longer accepts work.
	#[error("render queue unavailable: {0}")]
	Queue(#[from] QueueError),
	#[error("{0} is closed")]
	Closed(SessionId),
	#[error("cannot start render queue: {0}")]
	Spawn(#[from] std::io::Error),
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		#[source]
		error: std::io::Error,
	},
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),
	/// The configuration parsed but describes something unusable.
	#[error("invalid configuration: {0}")]
	Invalid(String),
}
