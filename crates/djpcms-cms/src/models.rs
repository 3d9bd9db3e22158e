//! Content models: pages, inner templates and block contents.

use djpcms_core::storage::{FieldValue, Record};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

static BLOCK_MARKER: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"\{\{\s*content(\d+)\s*\}\}").expect("valid block marker regex"));

/// A page stored at a unique URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
	/// Primary key.
	pub id: Option<u64>,
	/// Absolute URL.
	pub url: String,
	/// Title.
	pub title: String,
	/// Inner template laying out the blocks, if any.
	pub inner_template: Option<u64>,
	/// Outer layout template; the configured page template when `None`.
	pub template: Option<String>,
	/// Only authenticated users may see the page.
	pub requires_login: bool,
	/// Listed in navigation.
	pub in_navigation: bool,
}

impl Page {
	/// An unsaved page at `url`.
	pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
		Self {
			id: None,
			url: url.into(),
			title: title.into(),
			inner_template: None,
			template: None,
			requires_login: false,
			in_navigation: false,
		}
	}

	/// Lays the page out with an inner template.
	pub fn with_inner_template(mut self, template: &InnerTemplate) -> Self {
		self.inner_template = template.id;
		self
	}

	/// Lists the page in navigation.
	pub fn in_navigation(mut self) -> Self {
		self.in_navigation = true;
		self
	}

	/// Requires login.
	pub fn requires_login(mut self) -> Self {
		self.requires_login = true;
		self
	}
}

impl Record for Page {
	const MODEL: &'static str = "cms.page";

	fn pk(&self) -> Option<u64> {
		self.id
	}

	fn set_pk(&mut self, pk: u64) {
		self.id = Some(pk);
	}

	fn field(&self, name: &str) -> FieldValue {
		match name {
			"id" => self.id.into(),
			"url" => self.url.as_str().into(),
			"title" => self.title.as_str().into(),
			"inner_template" => self.inner_template.into(),
			"requires_login" => self.requires_login.into(),
			"in_navigation" => self.in_navigation.into(),
			_ => FieldValue::Null,
		}
	}
}

/// Template source with `{{ contentN }}` block markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnerTemplate {
	/// Primary key.
	pub id: Option<u64>,
	/// Name.
	pub name: String,
	/// Template source.
	pub template: String,
	/// Comma-separated block identifiers, by block number.
	pub blocks: String,
}

impl InnerTemplate {
	/// An unsaved template; block identifiers are scanned from `source`.
	///
	/// The marker `{{ contentN }}` always stands for block `N`, wherever it
	/// appears in the source.
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_cms::models::InnerTemplate;
	///
	/// let template = InnerTemplate::new("two", "<aside>{{content1}}</aside><main>{{ content0 }}</main>");
	/// assert_eq!(template.blocks, "content0,content1");
	/// assert_eq!(template.numblocks(), 2);
	/// ```
	pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
		let template = source.into();
		let blocks = scan_blocks(&template).join(",");
		Self {
			id: None,
			name: name.into(),
			template,
			blocks,
		}
	}

	/// Block identifiers.
	pub fn block_ids(&self) -> Vec<&str> {
		self.blocks.split(',').filter(|id| !id.is_empty()).collect()
	}

	/// Number of blocks: one past the highest block number.
	pub fn numblocks(&self) -> usize {
		self.block_ids()
			.iter()
			.filter_map(|id| block_number(id))
			.max()
			.map_or(0, |max| max + 1)
	}

	/// The template with each `{{ contentN }}` marker replaced by block `N`.
	/// Markers without a rendered block are removed.
	pub fn render(&self, blocks: &[String]) -> String {
		BLOCK_MARKER
			.replace_all(&self.template, |caps: &Captures<'_>| {
				caps[1]
					.parse::<usize>()
					.ok()
					.and_then(|n| blocks.get(n))
					.cloned()
					.unwrap_or_default()
			})
			.into_owned()
	}
}

fn block_number(id: &str) -> Option<usize> {
	id.strip_prefix("content")?.parse().ok()
}

fn scan_blocks(source: &str) -> Vec<String> {
	let mut numbers: Vec<usize> = BLOCK_MARKER
		.captures_iter(source)
		.filter_map(|caps| caps[1].parse().ok())
		.collect();
	numbers.sort_unstable();
	numbers.dedup();
	numbers.into_iter().map(|n| format!("content{n}")).collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("<p>static</p>", "", 0)]
	#[case("{{ content0 }}", "content0", 1)]
	#[case("{{content1}}{{ content0 }}{{ content1 }}", "content0,content1", 2)]
	#[case("{{ content2 }}{{ content0 }}", "content0,content2", 3)]
	fn test_block_scan(#[case] source: &str, #[case] blocks: &str, #[case] numblocks: usize) {
		let template = InnerTemplate::new("t", source);

		assert_eq!(template.blocks, blocks);
		assert_eq!(template.numblocks(), numblocks);
	}

	#[rstest]
	fn test_render_places_block_by_marker_number() {
		// Arrange
		let template = InnerTemplate::new("t", "<aside>{{ content1 }}</aside><main>{{ content0 }}</main>");

		// Act
		let html = template.render(&["first".to_string(), "second".to_string()]);

		// Assert
		assert_eq!(html, "<aside>second</aside><main>first</main>");
	}

	#[rstest]
	fn test_blank_arguments_are_empty_object() {
		let record = BlockContent::placeholder(1, 0, 0);

		assert_eq!(record.arguments_value().unwrap(), serde_json::json!({}));
		assert!(record.is_placeholder());
	}
}
