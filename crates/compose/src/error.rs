/// A convenient type alias for `Result` with `E` = [`ComposeError`].
pub type Result<T, E = ComposeError> = std::result::Result<T, E>;

/// Failure of a whole composition pass.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
	/// The placeholder pattern for a section name could not be built.
	#[error("invalid placeholder pattern for section `{name}`: {source}")]
	Pattern {
		name: String,
		#[source]
		source: regex::Error,
	},
}

/// Failure of one section's render function.
///
/// The composer never aborts on these; the section renders as fallback text.
#[derive(Debug, thiserror::Error)]
pub enum SectionError {
	/// An external command the section reads from failed.
	#[error("{message}")]
	Command {
		command: String,
		message: String,
		stderr: String,
	},
	/// The section could not produce its content.
	#[error("{0}")]
	Failed(String),
	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl SectionError {
	pub fn failed(message: impl Into<String>) -> Self {
		Self::Failed(message.into())
	}
}
