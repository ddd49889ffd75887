//! External command execution for section data.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use vitrine_compose::SectionError;

/// A command to run on behalf of a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
	pub program: String,
	pub args: Vec<String>,
	pub cwd: Option<PathBuf>,
}

impl CommandSpec {
	pub fn new(program: impl Into<String>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			cwd: None,
		}
	}

	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}

	pub fn args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.args.extend(args.into_iter().map(Into::into));
		self
	}

	pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.cwd = Some(dir.into());
		self
	}
}

impl fmt::Display for CommandSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.program)?;
		for arg in &self.args {
			write!(f, " {arg}")?;
		}
		Ok(())
	}
}

/// Captured, normalized output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
	pub stdout: String,
	pub stderr: String,
	pub status: i32,
}

/// A command that could not be run or exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
	/// Human-readable summary, suitable for fallback text.
	pub message: String,
	pub command: String,
	pub stdout: String,
	pub stderr: String,
	/// Exit status, if the process ran and exited normally.
	pub status: Option<i32>,
}

impl CommandError {
	/// Error for `spec` carrying only a message.
	pub fn new(spec: &CommandSpec, message: impl Into<String>) -> Self {
		Self {
			message: message.into(),
			command: spec.to_string(),
			stdout: String::new(),
			stderr: String::new(),
			status: None,
		}
	}
}

impl From<CommandError> for SectionError {
	fn from(err: CommandError) -> Self {
		SectionError::Command {
			command: err.command,
			message: err.message,
			stderr: err.stderr,
		}
	}
}

/// Runs external commands. Implementations must be usable from worker threads.
pub trait CommandRunner: Send + Sync {
	fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as child processes and waits for them.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
	default_dir: Option<PathBuf>,
}

impl ProcessRunner {
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs commands without their own working directory in `dir`.
	pub fn in_dir(dir: impl AsRef<Path>) -> Self {
		Self {
			default_dir: Some(dir.as_ref().to_path_buf()),
		}
	}
}

impl CommandRunner for ProcessRunner {
	fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
		let mut command = Command::new(&spec.program);
		command.args(&spec.args);
		if let Some(dir) = spec.cwd.as_ref().or(self.default_dir.as_ref()) {
			command.current_dir(dir);
		}

		tracing::debug!(command = %spec, "runner.spawn");
		let output = command.output().map_err(|err| CommandError::new(spec, format!("failed to run `{spec}`: {err}")))?;

		let stdout = normalize_output(&output.stdout);
		let stderr = normalize_output(&output.stderr);
		if output.status.success() {
			return Ok(CommandOutput {
				stdout,
				stderr,
				status: output.status.code().unwrap_or_default(),
			});
		}

		let status = output.status.code();
		let reason = stderr.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("no output");
		let message = match status {
			Some(code) => format!("`{spec}` exited with status {code}: {reason}"),
			None => format!("`{spec}` was terminated: {reason}"),
		};
		tracing::debug!(command = %spec, ?status, "runner.failed");
		Err(CommandError {
			message,
			command: spec.to_string(),
			stdout,
			stderr,
			status,
		})
	}
}

/// Decodes process output, normalizes line endings to `\n` and strips ANSI escapes.
pub fn normalize_output(raw: &[u8]) -> String {
	// Line endings first: the escape stripper drops bare carriage returns.
	let text = String::from_utf8_lossy(raw).replace("\r\n", "\n").replace('\r', "\n");
	strip_ansi_escapes::strip_str(text)
}
