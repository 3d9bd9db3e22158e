//! Wrappers: chrome around rendered plugin output.

use std::fmt;
use std::sync::Arc;

use djpcms_core::{Error, Result};
use indexmap::IndexMap;

use crate::models::BlockContent;
use crate::plugins::normalize_name;

/// Decorates the HTML a plugin rendered for `record`.
pub trait Wrapper: Send + Sync {
	/// The wrapped HTML.
	fn wrap(&self, record: &BlockContent, html: &str) -> String;
}

/// No chrome. Registered under the empty name.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWrapper;

impl Wrapper for NoWrapper {
	fn wrap(&self, _record: &BlockContent, html: &str) -> String {
		html.to_string()
	}
}

/// A `div` classed after the plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleWrapper;

impl Wrapper for SimpleWrapper {
	fn wrap(&self, record: &BlockContent, html: &str) -> String {
		format!(
			"<div class=\"djpcms-plugin djpcms-{}\">{html}</div>",
			html_escape::encode_double_quoted_attribute(&record.plugin_name)
		)
	}
}

/// A panel with the record title as header.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxWrapper;

impl Wrapper for BoxWrapper {
	fn wrap(&self, record: &BlockContent, html: &str) -> String {
		let header = if record.title.is_empty() {
			String::new()
		} else {
			format!(
				"<div class=\"djpcms-box-header\"><h3>{}</h3></div>",
				html_escape::encode_text(&record.title)
			)
		};
		format!("<div class=\"djpcms-box\">{header}<div class=\"djpcms-box-body\">{html}</div></div>")
	}
}

/// Wrappers by name. The empty name always maps to [`NoWrapper`].
pub struct WrapperRegistry {
	wrappers: IndexMap<String, Arc<dyn Wrapper>>,
}

impl fmt::Debug for WrapperRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.wrappers.keys()).finish()
	}
}

impl Default for WrapperRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl WrapperRegistry {
	/// A registry holding only the default wrapper.
	pub fn new() -> Self {
		let mut wrappers: IndexMap<String, Arc<dyn Wrapper>> = IndexMap::new();
		wrappers.insert(String::new(), Arc::new(NoWrapper));
		Self { wrappers }
	}

	/// A registry with the bundled `simple` and `box` wrappers.
	pub fn with_builtin() -> Self {
		let mut registry = Self::new();
		registry.wrappers.insert("simple".to_string(), Arc::new(SimpleWrapper));
		registry.wrappers.insert("box".to_string(), Arc::new(BoxWrapper));
		registry
	}

	/// Registers `wrapper` under `name`.
	pub fn register(&mut self, name: &str, wrapper: impl Wrapper + 'static) -> Result<()> {
		let key = normalize_name(name);
		if key.is_empty() {
			return Err(Error::ImproperlyConfigured(
				"the empty wrapper name is reserved".to_string(),
			));
		}
		if self.wrappers.contains_key(&key) {
			return Err(Error::already_registered("wrapper", key));
		}
		tracing::debug!(wrapper = %key, "registered wrapper");
		self.wrappers.insert(key, Arc::new(wrapper));
		Ok(())
	}

	/// Wrapper by name; unknown names fall back to the default wrapper.
	pub fn get(&self, name: &str) -> &Arc<dyn Wrapper> {
		let key = normalize_name(name);
		match self.wrappers.get(&key) {
			Some(wrapper) => wrapper,
			None => {
				tracing::debug!(wrapper = %key, "unknown wrapper, using default");
				&self.wrappers[0]
			}
		}
	}

	/// Whether `name` is registered.
	pub fn contains(&self, name: &str) -> bool {
		self.wrappers.contains_key(&normalize_name(name))
	}
}
