//! `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use crate::settings::{LogFormat, LoggingSettings};

/// Builds the filter: `RUST_LOG` when set, else `settings.level`.
pub fn env_filter(settings: &LoggingSettings) -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		EnvFilter::try_new(&settings.level).unwrap_or_else(|err| {
			eprintln!("invalid log level '{}': {err}; using info", settings.level);
			EnvFilter::new("info")
		})
	})
}

/// Installs the global subscriber.
///
/// Returns `false` when a global subscriber already exists, in which case
/// nothing changes. Calling it more than once is harmless.
pub fn init_logging(settings: &LoggingSettings) -> bool {
	let filter = env_filter(settings);
	let registry = tracing_subscriber::registry().with(filter);

	let result = match settings.format {
		LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
		LogFormat::Compact => registry
			.with(tracing_subscriber::fmt::layer().compact().with_target(true))
			.try_init(),
		LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
	};

	match result {
		Ok(()) => {
			tracing::info!(level = %settings.level, format = ?settings.format, "logging initialised");
			true
		}
		Err(_) => false,
	}
}
