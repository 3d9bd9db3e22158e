//! Process settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sources::{ConfigSource, EnvSource, SourceError, TomlFileSource, merge_into};

/// Errors raised while assembling [`Settings`].
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	/// A source failed to load.
	#[error("{source_name}: {error}")]
	Source {
		/// Description of the failing source.
		source_name: String,
		/// Underlying error.
		error: SourceError,
	},

	/// The merged values do not deserialize into [`Settings`].
	#[error("invalid settings: {0}")]
	Invalid(#[from] serde_json::Error),
}

impl From<SettingsError> for djpcms_core::Error {
	fn from(err: SettingsError) -> Self {
		Self::ImproperlyConfigured(err.to_string())
	}
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	/// Multi-line, human oriented.
	Pretty,
	/// Single-line.
	#[default]
	Compact,
	/// Newline-delimited JSON.
	Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
	/// `EnvFilter` directive used when `RUST_LOG` is unset, e.g. `info` or
	/// `djpcms_urls=debug,info`.
	pub level: String,
	/// Output format.
	pub format: LogFormat,
}

impl Default for LoggingSettings {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			format: LogFormat::default(),
		}
	}
}

/// Settings shared by every djpcms component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// Debug mode. Reveals plugin errors in rendered pages and error detail
	/// to superusers.
	pub debug: bool,
	/// Redirect to the slash-terminated path when only that path resolves.
	pub append_slash: bool,
	/// Title appended to page titles.
	pub site_title: String,
	/// Wrapper used for content blocks that name no container.
	pub default_wrapper: String,
	/// Outer layout template for CMS pages.
	pub page_template: String,
	/// Directories loaded into the template renderer.
	pub template_dirs: Vec<PathBuf>,
	/// Logging.
	pub logging: LoggingSettings,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			debug: false,
			append_slash: true,
			site_title: "djpcms".to_string(),
			default_wrapper: String::new(),
			page_template: "djpcms/page.html".to_string(),
			template_dirs: Vec::new(),
			logging: LoggingSettings::default(),
		}
	}
}

impl Settings {
	/// Starts a [`SettingsBuilder`].
	pub fn builder() -> SettingsBuilder {
		SettingsBuilder::new()
	}

	/// Settings from an optional TOML file overlaid with `DJPCMS_*`
	/// environment variables.
	pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
		let mut builder = SettingsBuilder::new().add_source(EnvSource::default());
		if let Some(path) = path {
			builder = builder.add_source(TomlFileSource::new(path));
		}
		builder.build()
	}
}

/// Merges [`ConfigSource`]s into [`Settings`].
///
/// Sources apply in ascending priority over [`Settings::default`]; sources of
/// equal priority apply in insertion order.
#[derive(Default)]
pub struct SettingsBuilder {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl SettingsBuilder {
	/// A builder without sources.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a source.
	pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
		self.sources.push(Box::new(source));
		self
	}

	/// Loads and merges every source.
	pub fn build(mut self) -> Result<Settings, SettingsError> {
		self.sources.sort_by_key(|s| s.priority());

		let mut merged = serde_json::Map::new();
		for source in &self.sources {
			let values = source.load().map_err(|error| SettingsError::Source {
				source_name: source.description(),
				error,
			})?;
			tracing::debug!(source = %source.description(), keys = values.len(), "merging settings source");
			merge_into(&mut merged, values);
		}

		Ok(serde_json::from_value(Value::Object(merged))?)
	}
}
