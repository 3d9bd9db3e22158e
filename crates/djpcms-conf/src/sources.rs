//! Configuration sources for layered settings
//!
//! Sources are merged in priority order: environment variables over the TOML
//! file over defaults. Nested keys (`logging.level`) are nested JSON objects;
//! environment variables spell them with a double underscore
//! (`DJPCMS_LOGGING__LEVEL`).

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;

/// Prefix of the environment variables read by [`EnvSource::default`].
pub const ENV_PREFIX: &str = "DJPCMS_";

/// Trait for configuration sources
pub trait ConfigSource: Send + Sync {
	/// Load configuration from this source
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError>;

	/// Get the priority of this source (higher = more important)
	fn priority(&self) -> u8;

	/// Get a description of this source
	fn description(&self) -> String;
}

/// Error type for configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	/// Reading a file failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// A value has the wrong shape.
	#[error("Parse error: {0}")]
	Parse(String),

	/// The TOML file is malformed.
	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	/// JSON conversion failed.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Keys parsed as booleans when read from the environment.
const BOOL_KEYS: &[&str] = &["debug", "append_slash"];

/// Keys parsed as comma-separated lists when read from the environment.
const LIST_KEYS: &[&str] = &["template_dirs"];

fn parse_bool(raw: &str) -> Option<bool> {
	match raw.trim().to_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Some(true),
		"false" | "0" | "no" | "off" => Some(false),
		_ => None,
	}
}

fn insert_nested(config: &mut IndexMap<String, Value>, path: &[&str], value: Value) {
	match path {
		[] => {}
		[leaf] => {
			config.insert((*leaf).to_string(), value);
		}
		[head, rest @ ..] => {
			let entry = config
				.entry((*head).to_string())
				.or_insert_with(|| Value::Object(Map::new()));
			set_path(entry, rest, value);
		}
	}
}

fn set_path(target: &mut Value, path: &[&str], value: Value) {
	let Some((head, rest)) = path.split_first() else {
		*target = value;
		return;
	};
	if !target.is_object() {
		*target = Value::Object(Map::new());
	}
	if let Value::Object(map) = target {
		let child = map.entry((*head).to_string()).or_insert(Value::Null);
		set_path(child, rest, value);
	}
}

/// Environment variable configuration source
pub struct EnvSource {
	prefix: String,
}

impl EnvSource {
	/// Reads variables starting with `prefix`.
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_conf::sources::EnvSource;
	///
	/// let source = EnvSource::with_prefix("MYSITE_");
	/// ```
	pub fn with_prefix(prefix: impl Into<String>) -> Self {
		Self {
			prefix: prefix.into(),
		}
	}

	fn parse_value(key: &str, raw: String) -> Value {
		if BOOL_KEYS.contains(&key) {
			return match parse_bool(&raw) {
				Some(b) => Value::Bool(b),
				None => Value::String(raw),
			};
		}
		if LIST_KEYS.contains(&key) {
			return Value::Array(
				raw.split(',')
					.map(str::trim)
					.filter(|s| !s.is_empty())
					.map(|s| Value::String(s.to_string()))
					.collect(),
			);
		}
		Value::String(raw)
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::with_prefix(ENV_PREFIX)
	}
}

impl ConfigSource for EnvSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		let mut config = IndexMap::new();

		for (key, value) in std::env::vars() {
			let Some(clean_key) = key.strip_prefix(&self.prefix) else {
				continue;
			};
			let lower_key = clean_key.to_lowercase();
			let path: Vec<&str> = lower_key.split("__").filter(|s| !s.is_empty()).collect();
			let Some(leaf) = path.last() else {
				continue;
			};
			let parsed = Self::parse_value(leaf, value);
			insert_nested(&mut config, &path, parsed);
		}

		Ok(config)
	}

	fn priority(&self) -> u8 {
		100
	}

	fn description(&self) -> String {
		format!("Environment variables (prefix: {})", self.prefix)
	}
}

/// TOML file configuration source
///
/// A missing file loads as empty.
pub struct TomlFileSource {
	path: PathBuf,
}

impl TomlFileSource {
	/// Create a new TOML file configuration source
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlFileSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		if !self.path.exists() {
			tracing::debug!(path = %self.path.display(), "settings file not found, skipping");
			return Ok(IndexMap::new());
		}

		let content = fs::read_to_string(&self.path)?;
		let toml_value: toml::Value = toml::from_str(&content)?;
		let json_value = serde_json::to_value(toml_value)?;

		let map = json_value
			.as_object()
			.ok_or_else(|| SourceError::Parse("Expected table at root".to_string()))?;

		Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
	}

	fn priority(&self) -> u8 {
		50
	}

	fn description(&self) -> String {
		format!("TOML file: {}", self.path.display())
	}
}

/// Default values configuration source
pub struct DefaultSource {
	values: IndexMap<String, Value>,
}

impl DefaultSource {
	/// An empty default source.
	pub fn new() -> Self {
		Self {
			values: IndexMap::new(),
		}
	}

	/// Add a default value for a configuration key
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_conf::sources::DefaultSource;
	/// use serde_json::Value;
	///
	/// let source = DefaultSource::new()
	///     .with_value("site_title", Value::String("Docs".into()));
	/// ```
	pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
		self.values.insert(key.into(), value);
		self
	}
}

impl Default for DefaultSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for DefaultSource {
	fn load(&self) -> Result<IndexMap<String, Value>, SourceError> {
		Ok(self.values.clone())
	}

	fn priority(&self) -> u8 {
		0
	}

	fn description(&self) -> String {
		"Default values".to_string()
	}
}

/// Deep-merges `overlay` into `base`. Objects merge key by key; any other
/// value replaces.
pub(crate) fn merge_into(base: &mut Map<String, Value>, overlay: IndexMap<String, Value>) {
	for (key, value) in overlay {
		if let Value::Object(incoming) = &value
			&& let Some(Value::Object(existing)) = base.get_mut(&key)
		{
			merge_into(existing, incoming.clone().into_iter().collect());
			continue;
		}
		base.insert(key, value);
	}
}
