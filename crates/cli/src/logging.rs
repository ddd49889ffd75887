use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive, e.g. `vitrine_store=trace`.
pub const LOG_ENV: &str = "VITRINE_LOG";

/// Installs the stderr subscriber. `VITRINE_LOG` wins over `verbose`.
pub fn init(verbose: bool) {
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(true).init();
}

fn default_directive(verbose: bool) -> &'static str {
	if verbose { "vitrine=debug" } else { "vitrine=info" }
}
