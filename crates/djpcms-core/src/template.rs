//! Template rendering.
//!
//! Views and error pages render through the [`TemplateRenderer`] trait so the
//! engine can be swapped. [`TeraRenderer`] is the bundled implementation; it
//! ships the `djpcms/page.html` layout and the generic `error.html` page and
//! accepts further templates as raw strings or from template directories.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;
use tera::{Context, Tera};

use crate::exception::{Error, Result};

/// Name of the bundled page layout.
pub const PAGE_TEMPLATE: &str = "djpcms/page.html";

/// Name of the bundled generic error page.
pub const ERROR_TEMPLATE: &str = "error.html";

/// Renders named templates against a JSON context.
pub trait TemplateRenderer: Send + Sync {
	/// Renders `name`. Fails with [`Error::TemplateDoesNotExist`] for unknown names.
	fn render(&self, name: &str, context: &Value) -> Result<String>;

	/// Whether `name` is known.
	fn has_template(&self, name: &str) -> bool;

	/// Renders the first existing template of `names`.
	///
	/// Only a missing template moves on to the next candidate; a template that
	/// exists but fails to render fails the call.
	fn render_first(&self, names: &[&str], context: &Value) -> Result<String> {
		for name in names {
			match self.render(name, context) {
				Err(Error::TemplateDoesNotExist(_)) => continue,
				other => return other,
			}
		}
		Err(Error::TemplateDoesNotExist(names.join(", ")))
	}
}

/// Tera-based template renderer
///
/// Files ending in `.html` are autoescaped; values that already hold markup
/// must go through the `safe` filter.
pub struct TeraRenderer {
	tera: RwLock<Tera>,
}

impl TeraRenderer {
	/// Creates a renderer holding the bundled templates.
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_core::template::{TemplateRenderer, TeraRenderer};
	/// use serde_json::json;
	///
	/// let renderer = TeraRenderer::new().unwrap();
	/// let html = renderer
	///     .render("error.html", &json!({"status": 404, "reason": "Not Found"}))
	///     .unwrap();
	/// assert!(html.contains("<h1>404 Not Found</h1>"));
	/// ```
	pub fn new() -> Result<Self> {
		let mut tera = Tera::default();
		tera.add_raw_template(PAGE_TEMPLATE, include_str!("../templates/djpcms/page.html"))?;
		tera.add_raw_template(ERROR_TEMPLATE, include_str!("../templates/error.html"))?;
		Ok(Self {
			tera: RwLock::new(tera),
		})
	}

	/// Creates a renderer with the bundled templates plus every file below
	/// `dirs`. Later directories override earlier ones; both override the
	/// bundled templates.
	pub fn with_dirs<P: AsRef<Path>>(dirs: &[P]) -> Result<Self> {
		let renderer = Self::new()?;
		for dir in dirs {
			renderer.load_dir(dir.as_ref())?;
		}
		Ok(renderer)
	}

	/// Adds or replaces a template from source.
	pub fn add_raw_template(&self, name: &str, source: &str) -> Result<()> {
		self.tera.write().add_raw_template(name, source)?;
		Ok(())
	}

	/// Loads every file below `dir`, naming each by its `/`-separated path
	/// relative to `dir`.
	pub fn load_dir(&self, dir: &Path) -> Result<()> {
		let mut files = Vec::new();
		collect_files(dir, &mut files)?;
		files.sort();
		let mut tera = self.tera.write();
		for file in files {
			let name = file
				.strip_prefix(dir)
				.map_err(|e| Error::Internal(e.to_string()))?
				.components()
				.map(|c| c.as_os_str().to_string_lossy())
				.collect::<Vec<_>>()
				.join("/");
			tracing::debug!(template = %name, path = %file.display(), "loading template");
			tera.add_template_file(&file, Some(&name))?;
		}
		Ok(())
	}
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
	let entries = fs::read_dir(dir).map_err(|e| {
		Error::ImproperlyConfigured(format!("cannot read template dir {}: {e}", dir.display()))
	})?;
	for entry in entries {
		let path = entry.map_err(|e| Error::Internal(e.to_string()))?.path();
		if path.is_dir() {
			collect_files(&path, out)?;
		} else {
			out.push(path);
		}
	}
	Ok(())
}

impl TemplateRenderer for TeraRenderer {
	fn render(&self, name: &str, context: &Value) -> Result<String> {
		let tera = self.tera.read();
		if !tera.get_template_names().any(|n| n == name) {
			return Err(Error::TemplateDoesNotExist(name.to_string()));
		}
		let ctx = Context::from_value(context.clone())?;
		Ok(tera.render(name, &ctx)?)
	}

	fn has_template(&self, name: &str) -> bool {
		self.tera.read().get_template_names().any(|n| n == name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use serde_json::json;

	#[fixture]
	fn renderer() -> TeraRenderer {
		TeraRenderer::new().unwrap()
	}

	#[rstest]
	fn test_page_template_marks_content_safe(renderer: TeraRenderer) {
		// Arrange
		let context = json!({
			"page": {"title": "About", "url": "/about/"},
			"content": "<p>Hello</p>",
			"editing": false,
			"site_title": "Example",
		});

		// Act
		let html = renderer.render(PAGE_TEMPLATE, &context).unwrap();

		// Assert
		assert!(html.contains("<p>Hello</p>"));
		assert!(html.contains("<title>About | Example</title>"));
		assert!(!html.contains("djpcms-editing"));
	}

	#[rstest]
	fn test_error_detail_is_escaped(renderer: TeraRenderer) {
		let context = json!({"status": 500, "reason": "Internal Server Error", "detail": "<b>x</b>"});

		let html = renderer.render(ERROR_TEMPLATE, &context).unwrap();

		assert!(html.contains("&lt;b&gt;x&lt;&#x2F;b&gt;"));
	}

	#[rstest]
	fn test_unknown_template(renderer: TeraRenderer) {
		let result = renderer.render("missing.html", &json!({}));

		assert!(matches!(result, Err(Error::TemplateDoesNotExist(name)) if name == "missing.html"));
	}

	#[rstest]
	fn test_render_first_skips_missing(renderer: TeraRenderer) {
		// Arrange
		renderer
			.add_raw_template("404.html", "gone: {{ status }}")
			.unwrap();
		let context = json!({"status": 404, "reason": "Not Found"});

		// Act
		let specific = renderer.render_first(&["404.html", ERROR_TEMPLATE], &context);
		let generic = renderer.render_first(&["403.html", ERROR_TEMPLATE], &context);
		let none = renderer.render_first(&["a.html", "b.html"], &context);

		// Assert
		assert_eq!(specific.unwrap(), "gone: 404");
		assert!(generic.unwrap().contains("404 Not Found"));
		assert!(matches!(none, Err(Error::TemplateDoesNotExist(_))));
	}

	#[rstest]
	fn test_load_dir_overrides_bundled() {
		// Arrange
		let dir = tempfile::tempdir().unwrap();
		fs::create_dir_all(dir.path().join("djpcms")).unwrap();
		fs::write(dir.path().join("djpcms/page.html"), "custom {{ content | safe }}").unwrap();

		// Act
		let renderer = TeraRenderer::with_dirs(&[dir.path()]).unwrap();
		let html = renderer
			.render(PAGE_TEMPLATE, &json!({"content": "<i>x</i>"}))
			.unwrap();

		// Assert
		assert_eq!(html, "custom <i>x</i>");
	}
}
