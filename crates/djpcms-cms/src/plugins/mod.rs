//! Content plugins and their registry.
//!
//! A plugin turns the JSON arguments stored on a
//! [`BlockContent`](crate::models::BlockContent) into HTML. Plugins are
//! registered explicitly under a name during bootstrap; the registry is then
//! handed to [`Cms`](crate::Cms) and only read while serving requests.

mod model_link;
mod navigation;
mod text;

use std::fmt;
use std::sync::Arc;

use djpcms_apps::Sites;
use djpcms_conf::Settings;
use djpcms_core::http::{AuthState, Request};
use djpcms_core::{Error, Result};
use indexmap::IndexMap;
use serde_json::Value;

use crate::models::Page;

pub use model_link::ModelLinkPlugin;
pub use navigation::NavigationPlugin;
pub use text::{TextFormat, TextPlugin};

/// What a plugin sees while rendering.
#[derive(Clone, Copy)]
pub struct PluginContext<'a> {
	/// The request being served.
	pub request: &'a Request,
	/// The site registry.
	pub sites: &'a Sites,
	/// The page being rendered.
	pub page: &'a Page,
	/// Whether the page is rendered for inline editing.
	pub editing: bool,
}

impl PluginContext<'_> {
	/// The requesting user.
	pub fn user(&self) -> &AuthState {
		&self.request.user
	}

	/// Settings.
	pub fn settings(&self) -> &Settings {
		self.sites.settings()
	}

	/// Whether plugin failures are shown instead of swallowed.
	pub fn reveal_errors(&self) -> bool {
		self.settings().debug || self.user().is_superuser
	}
}

/// Renders content from stored arguments.
pub trait Plugin: Send + Sync {
	/// Human readable description.
	fn description(&self) -> &str {
		""
	}

	/// Whether the plugin may render for this request.
	fn has_permission(&self, _ctx: &PluginContext<'_>) -> bool {
		true
	}

	/// Renders `arguments` into HTML.
	fn render(&self, ctx: &PluginContext<'_>, arguments: &Value) -> Result<String>;
}

/// Normalized registry key: trimmed and lowercase.
pub fn normalize_name(name: &str) -> String {
	name.trim().to_lowercase()
}

/// Plugins by name.
#[derive(Default)]
pub struct PluginRegistry {
	plugins: IndexMap<String, Arc<dyn Plugin>>,
}

impl fmt::Debug for PluginRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.plugins.keys()).finish()
	}
}

impl PluginRegistry {
	/// An empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// A registry holding the bundled `text`, `navigation` and `model-link`
	/// plugins.
	pub fn with_builtin() -> Self {
		let mut registry = Self::new();
		registry.plugins.insert("text".to_string(), Arc::new(TextPlugin));
		registry.plugins.insert("navigation".to_string(), Arc::new(NavigationPlugin));
		registry.plugins.insert("model-link".to_string(), Arc::new(ModelLinkPlugin));
		registry
	}

	/// Registers `plugin` under `name`.
	///
	/// # Errors
	///
	/// The empty name is reserved for "no plugin"; names are unique after
	/// normalization.
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_cms::plugins::{PluginRegistry, TextPlugin};
	///
	/// let mut registry = PluginRegistry::new();
	/// registry.register(" Text ", TextPlugin).unwrap();
	/// assert!(registry.get("TEXT").is_some());
	/// assert!(registry.register("text", TextPlugin).is_err());
	/// ```
	pub fn register(&mut self, name: &str, plugin: impl Plugin + 'static) -> Result<()> {
		let key = normalize_name(name);
		if key.is_empty() {
			return Err(Error::ImproperlyConfigured(
				"the empty plugin name is reserved".to_string(),
			));
		}
		if self.plugins.contains_key(&key) {
			return Err(Error::already_registered("plugin", key));
		}
		tracing::debug!(plugin = %key, "registered plugin");
		self.plugins.insert(key, Arc::new(plugin));
		Ok(())
	}

	/// Plugin by name, normalized.
	pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
		self.plugins.get(&normalize_name(name))
	}

	/// Whether `name` is registered.
	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	/// Registered names in registration order.
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.plugins.keys().map(String::as_str)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	struct Hello;

	impl Plugin for Hello {
		fn render(&self, _ctx: &PluginContext<'_>, _arguments: &Value) -> Result<String> {
			Ok("hello".to_string())
		}
	}

	#[rstest]
	#[case("")]
	#[case("   ")]
	fn test_empty_name_reserved(#[case] name: &str) {
		let mut registry = PluginRegistry::new();

		assert!(matches!(registry.register(name, Hello), Err(Error::ImproperlyConfigured(_))));
	}

	#[rstest]
	fn test_duplicate_after_normalization() {
		// Arrange
		let mut registry = PluginRegistry::with_builtin();

		// Act
		let err = registry.register("  NAVIGATION", Hello).unwrap_err();

		// Assert
		assert!(matches!(err, Error::AlreadyRegistered { kind: "plugin", ref name } if name == "navigation"));
	}

	#[rstest]
	fn test_builtin_names() {
		let registry = PluginRegistry::with_builtin();

		assert_eq!(registry.names().collect::<Vec<_>>(), vec!["text", "navigation", "model-link"]);
		assert!(registry.contains("Model-Link"));
		assert!(!registry.contains("__unknown_plugin__"));
	}
}
