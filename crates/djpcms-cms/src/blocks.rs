//! The content block pipeline.
//!
//! Every page has `numblocks` blocks, and every block holds an ordered
//! group of [`BlockContent`] records with dense positions starting at 0.
//! The last record of a group is always a placeholder without plugin, the
//! slot where editors add new content.
//!
//! Rendering a block walks its records in position order. Each record goes
//! through its plugin and then through the wrapper named by its container
//! type. A missing plugin or a failing one never fails the page: the record
//! renders as an empty fragment, or as the escaped error text when errors
//! are revealed to the requester.
//!
//! Reading a group and writing it back happens under one lock per [`Cms`],
//! so concurrent renders of a new page create a single placeholder.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use djpcms_core::storage::{Filter, Manager, MemoryManager};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde_json::Value;

use crate::error::{CmsError, CmsResult};
use crate::models::{BlockContent, InnerTemplate, Page};
use crate::plugins::{PluginContext, PluginRegistry};
use crate::wrappers::WrapperRegistry;

/// Content storage plus the plugin and wrapper registries.
pub struct Cms {
	pages: Arc<dyn Manager<Page>>,
	templates: Arc<dyn Manager<InnerTemplate>>,
	contents: Arc<dyn Manager<BlockContent>>,
	plugins: PluginRegistry,
	wrappers: WrapperRegistry,
	groups: ReentrantMutex<()>,
}

impl std::fmt::Debug for Cms {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Cms")
			.field("plugins", &self.plugins)
			.field("wrappers", &self.wrappers)
			.finish()
	}
}

impl Cms {
	/// In-memory content with unique page URLs and unique
	/// `(page, block, position)` triples.
	pub fn new(plugins: PluginRegistry, wrappers: WrapperRegistry) -> Self {
		Self::with_managers(
			Arc::new(MemoryManager::<Page>::new().with_unique(&["url"])),
			Arc::new(MemoryManager::<InnerTemplate>::new()),
			Arc::new(MemoryManager::<BlockContent>::new().with_unique(&["page", "block", "position"])),
			plugins,
			wrappers,
		)
	}

	/// Content persisted through the given managers.
	pub fn with_managers(
		pages: Arc<dyn Manager<Page>>,
		templates: Arc<dyn Manager<InnerTemplate>>,
		contents: Arc<dyn Manager<BlockContent>>,
		plugins: PluginRegistry,
		wrappers: WrapperRegistry,
	) -> Self {
		Self {
			pages,
			templates,
			contents,
			plugins,
			wrappers,
			groups: ReentrantMutex::new(()),
		}
	}

	/// Held while a group is read and written back.
	pub(crate) fn lock_groups(&self) -> ReentrantMutexGuard<'_, ()> {
		self.groups.lock()
	}

	/// Page manager.
	pub fn pages(&self) -> &dyn Manager<Page> {
		self.pages.as_ref()
	}

	/// Inner template manager.
	pub fn templates(&self) -> &dyn Manager<InnerTemplate> {
		self.templates.as_ref()
	}

	/// Block content manager.
	pub fn contents(&self) -> &dyn Manager<BlockContent> {
		self.contents.as_ref()
	}

	/// Plugin registry.
	pub fn plugins(&self) -> &PluginRegistry {
		&self.plugins
	}

	/// Wrapper registry.
	pub fn wrappers(&self) -> &WrapperRegistry {
		&self.wrappers
	}

	/// The page stored at `url`.
	pub fn page_for_url(&self, url: &str) -> CmsResult<Option<Page>> {
		Ok(self.pages.filter(&Filter::new().eq("url", url))?.into_iter().next())
	}

	/// The inner template of `page`.
	pub fn inner_template(&self, page: &Page) -> CmsResult<Option<InnerTemplate>> {
		match page.inner_template {
			Some(pk) => Ok(Some(self.templates.get_by_pk(pk)?)),
			None => Ok(None),
		}
	}

	/// Number of blocks of `page`: one without inner template.
	pub fn numblocks(&self, page: &Page) -> CmsResult<usize> {
		Ok(self.inner_template(page)?.map_or(1, |t| t.numblocks()))
	}

	fn page_pk(page: &Page) -> CmsResult<u64> {
		page.id.ok_or_else(|| CmsError::PageNotFound(page.url.clone()))
	}

	fn check_block(&self, page: &Page, block: u32) -> CmsResult<()> {
		let numblocks = self.numblocks(page)?;
		if (block as usize) < numblocks {
			Ok(())
		} else {
			Err(CmsError::BlockOutOfRange { block, numblocks })
		}
	}

	/// Records of `(page, block)` sorted by position, without normalization.
	pub fn group(&self, page: u64, block: u32) -> CmsResult<Vec<BlockContent>> {
		let mut records = self
			.contents
			.filter(&Filter::new().eq("page", page).eq("block", block))?;
		records.sort_by_key(|r| r.position);
		Ok(records)
	}

	/// Records of block `block` of `page` in position order, ending with a
	/// placeholder.
	///
	/// Creates a placeholder when the group is empty or its last record has
	/// a plugin. Calling it again creates nothing.
	///
	/// # Errors
	///
	/// [`CmsError::BlockOutOfRange`] when `block` is not below the page's
	/// block count.
	pub fn block_contents(&self, page: &Page, block: u32) -> CmsResult<Vec<BlockContent>> {
		self.check_block(page, block)?;
		let page_pk = Self::page_pk(page)?;
		let _groups = self.lock_groups();
		let mut records = self.group(page_pk, block)?;
		let next = match records.last() {
			None => Some(0),
			Some(last) if !last.is_placeholder() => Some(last.position + 1),
			Some(_) => None,
		};
		if let Some(position) = next {
			let mut placeholder = BlockContent::placeholder(page_pk, block, position);
			self.contents.save(&mut placeholder)?;
			tracing::debug!(page = page_pk, block, position, "created placeholder");
			records.push(placeholder);
		}
		Ok(records)
	}

	/// Stores a plugin on `record`, then restores the trailing placeholder.
	///
	/// # Errors
	///
	/// [`CmsError::UnknownPlugin`] when `plugin` is not registered.
	pub fn assign_plugin(
		&self,
		record: &mut BlockContent,
		plugin: &str,
		arguments: &Value,
		container: &str,
	) -> CmsResult<()> {
		if !self.plugins.contains(plugin) {
			return Err(CmsError::UnknownPlugin(plugin.to_string()));
		}
		let _groups = self.lock_groups();
		record.plugin_name = crate::plugins::normalize_name(plugin);
		record.arguments = serde_json::to_string(arguments)?;
		record.container_type = container.to_string();
		self.contents.save(record)?;
		let page = self.pages.get_by_pk(record.page)?;
		self.block_contents(&page, record.block)?;
		Ok(())
	}

	/// Fills the placeholder of `block` with `plugin` and returns the record.
	pub fn append_content(
		&self,
		page: &Page,
		block: u32,
		plugin: &str,
		arguments: &Value,
		container: &str,
	) -> CmsResult<BlockContent> {
		let _groups = self.lock_groups();
		let mut records = self.block_contents(page, block)?;
		let Some(mut record) = records.pop() else {
			return Err(CmsError::PageNotFound(page.url.clone()));
		};
		self.assign_plugin(&mut record, plugin, arguments, container)?;
		Ok(record)
	}

	/// Renders one block inside its container element.
	pub fn render_block(&self, ctx: &PluginContext<'_>, block: u32) -> CmsResult<String> {
		let records = self.block_contents(ctx.page, block)?;
		let page_pk = Self::page_pk(ctx.page)?;
		let mut html = format!(
			"<div id=\"djpcms-block-{page_pk}-{block}\" class=\"djpcms-block\" data-block=\"{block}\">"
		);
		for record in &records {
			html.push_str(&self.render_content(ctx, record));
		}
		html.push_str("</div>");
		Ok(html)
	}

	/// Renders every block of the page, in block order.
	pub fn render_blocks(&self, ctx: &PluginContext<'_>) -> CmsResult<Vec<String>> {
		let numblocks = self.numblocks(ctx.page)?;
		(0..numblocks as u32)
			.map(|block| self.render_block(ctx, block))
			.collect()
	}

	/// Renders one record. Never fails: anything going wrong yields an empty
	/// fragment, or the escaped error when errors are revealed.
	pub fn render_content(&self, ctx: &PluginContext<'_>, record: &BlockContent) -> String {
		if record.is_placeholder() {
			return if ctx.editing {
				format!(
					"<div class=\"djpcms-placeholder\" data-content=\"{}\" data-position=\"{}\"></div>",
					record.id.unwrap_or_default(),
					record.position
				)
			} else {
				String::new()
			};
		}

		let user = ctx.user();
		if (record.requires_login && !user.is_authenticated)
			|| (record.for_not_authenticated && user.is_authenticated)
		{
			return String::new();
		}

		let Some(plugin) = self.plugins.get(&record.plugin_name) else {
			tracing::warn!(
				plugin = %record.plugin_name,
				content = ?record.id,
				"plugin not registered, rendering nothing"
			);
			return String::new();
		};
		if !plugin.has_permission(ctx) {
			return String::new();
		}

		let rendered = match record.arguments_value() {
			Ok(arguments) => {
				match panic::catch_unwind(AssertUnwindSafe(|| plugin.render(ctx, &arguments))) {
					Ok(Ok(html)) => Ok(html),
					Ok(Err(err)) => Err(err.to_string()),
					Err(payload) => Err(panic_message(payload.as_ref())),
				}
			}
			Err(err) => Err(format!("invalid arguments: {err}")),
		};
		let html = match rendered {
			Ok(html) => html,
			Err(message) => {
				tracing::warn!(
					plugin = %record.plugin_name,
					content = ?record.id,
					error = %message,
					"plugin failed to render"
				);
				if !ctx.reveal_errors() {
					return String::new();
				}
				format!(
					"<div class=\"djpcms-plugin-error\">{}</div>",
					html_escape::encode_text(&message)
				)
			}
		};
		if html.is_empty() {
			return html;
		}

		let container = if record.container_type.is_empty() {
			ctx.settings().default_wrapper.as_str()
		} else {
			record.container_type.as_str()
		};
		let wrapped = self.wrappers.get(container).wrap(record, &html);
		if ctx.editing {
			format!(
				"<div class=\"djpcms-content\" data-content=\"{}\" data-position=\"{}\">{wrapped}</div>",
				record.id.unwrap_or_default(),
				record.position
			)
		} else {
			wrapped
		}
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"plugin panicked".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::plugins::{Plugin, TextPlugin};
	use crate::wrappers::WrapperRegistry;
	use djpcms_apps::Sites;
	use djpcms_conf::Settings;
	use djpcms_core::http::{AuthState, Request};
	use djpcms_core::{Error, Result};
	use rstest::{fixture, rstest};
	use serde_json::json;

	struct Failing;

	impl Plugin for Failing {
		fn render(&self, _ctx: &PluginContext<'_>, _arguments: &Value) -> Result<String> {
			Err(Error::Internal("<boom>".to_string()))
		}
	}

	struct Panicking;

	impl Plugin for Panicking {
		fn render(&self, _ctx: &PluginContext<'_>, _arguments: &Value) -> Result<String> {
			panic!("plugin exploded")
		}
	}

	struct MembersOnly;

	impl Plugin for MembersOnly {
		fn has_permission(&self, ctx: &PluginContext<'_>) -> bool {
			ctx.user().has_perm("club.view_member")
		}

		fn render(&self, _ctx: &PluginContext<'_>, _arguments: &Value) -> Result<String> {
			Ok("members".to_string())
		}
	}

	fn registry() -> PluginRegistry {
		let mut plugins = PluginRegistry::new();
		plugins.register("text", TextPlugin).unwrap();
		plugins.register("failing", Failing).unwrap();
		plugins.register("panicking", Panicking).unwrap();
		plugins.register("members", MembersOnly).unwrap();
		plugins
	}

	struct Fixture {
		cms: Cms,
		page: Page,
		sites: Sites,
	}

	impl Fixture {
		fn record(&self, plugin: &str) -> BlockContent {
			let mut record = self.cms.block_contents(&self.page, 0).unwrap().pop().unwrap();
			record.plugin_name = plugin.to_string();
			record.arguments = r#"{"text": "hi"}"#.to_string();
			self.cms.contents().save(&mut record).unwrap();
			record
		}

		fn render(&self, record: &BlockContent, user: AuthState, editing: bool) -> String {
			let request = Request::builder().uri("/p/").user(user).build().unwrap();
			let ctx = PluginContext {
				request: &request,
				sites: &self.sites,
				page: &self.page,
				editing,
			};
			self.cms.render_content(&ctx, record)
		}
	}

	fn build(settings: Settings) -> Fixture {
		let cms = Cms::new(registry(), WrapperRegistry::with_builtin());
		let mut page = Page::new("/p/", "P");
		cms.pages().save(&mut page).unwrap();
		Fixture {
			cms,
			page,
			sites: Sites::new(settings).unwrap(),
		}
	}

	#[fixture]
	fn fixture() -> Fixture {
		build(Settings::default())
	}

	#[rstest]
	fn test_normalization_is_idempotent(fixture: Fixture) {
		// Arrange
		fixture.record("text");

		// Act
		let first = fixture.cms.block_contents(&fixture.page, 0).unwrap();
		let second = fixture.cms.block_contents(&fixture.page, 0).unwrap();

		// Assert
		assert_eq!(first, second);
		assert_eq!(first.len(), 2);
		assert!(first[1].is_placeholder());
		assert_eq!(fixture.cms.contents().all().unwrap().len(), 2);
	}

	#[rstest]
	fn test_block_out_of_range(fixture: Fixture) {
		let err = fixture.cms.block_contents(&fixture.page, 1).unwrap_err();

		assert!(matches!(err, CmsError::BlockOutOfRange { block: 1, numblocks: 1 }));
	}

	#[rstest]
	fn test_unknown_plugin_renders_nothing(fixture: Fixture) {
		// Arrange
		fixture.record("__unknown_plugin__");
		let request = Request::get("/p/").unwrap();
		let ctx = PluginContext {
			request: &request,
			sites: &fixture.sites,
			page: &fixture.page,
			editing: false,
		};

		// Act
		let html = fixture.cms.render_block(&ctx, 0).unwrap();

		// Assert
		let id = fixture.page.id.unwrap();
		assert_eq!(
			html,
			format!("<div id=\"djpcms-block-{id}-0\" class=\"djpcms-block\" data-block=\"0\"></div>")
		);
	}

	#[rstest]
	#[case("failing", AuthState::anonymous(), "")]
	#[case("failing", AuthState::superuser("1"), "<div class=\"djpcms-plugin-error\">&lt;boom&gt;</div>")]
	#[case("panicking", AuthState::anonymous(), "")]
	#[case("panicking", AuthState::superuser("1"), "<div class=\"djpcms-plugin-error\">plugin exploded</div>")]
	fn test_plugin_failures_are_contained(
		fixture: Fixture,
		#[case] plugin: &str,
		#[case] user: AuthState,
		#[case] expected: &str,
	) {
		let record = fixture.record(plugin);

		assert_eq!(fixture.render(&record, user, false), expected);
	}

	#[rstest]
	fn test_debug_reveals_errors_to_everyone() {
		let fixture = build(Settings {
			debug: true,
			..Settings::default()
		});
		let record = fixture.record("failing");

		let html = fixture.render(&record, AuthState::anonymous(), false);

		assert!(html.contains("&lt;boom&gt;"));
	}

	#[rstest]
	#[case(false, false, AuthState::anonymous(), "hi")]
	#[case(true, false, AuthState::anonymous(), "")]
	#[case(true, false, AuthState::authenticated("5"), "hi")]
	#[case(false, true, AuthState::authenticated("5"), "")]
	#[case(false, true, AuthState::anonymous(), "hi")]
	fn test_visibility_flags(
		fixture: Fixture,
		#[case] requires_login: bool,
		#[case] for_not_authenticated: bool,
		#[case] user: AuthState,
		#[case] expected: &str,
	) {
		let mut record = fixture.record("text");
		record.requires_login = requires_login;
		record.for_not_authenticated = for_not_authenticated;

		assert_eq!(fixture.render(&record, user, false), expected);
	}

	#[rstest]
	fn test_plugin_permission(fixture: Fixture) {
		let record = fixture.record("members");
		let member = AuthState::authenticated("5").with_permission("club.view_member");

		assert_eq!(fixture.render(&record, AuthState::authenticated("6"), false), "");
		assert_eq!(fixture.render(&record, member, false), "members");
	}

	#[rstest]
	#[case("", "hi")]
	#[case("unknown-chrome", "hi")]
	#[case("simple", "<div class=\"djpcms-plugin djpcms-text\">hi</div>")]
	fn test_wrapper_fallback(fixture: Fixture, #[case] container: &str, #[case] expected: &str) {
		let mut record = fixture.record("text");
		record.container_type = container.to_string();

		assert_eq!(fixture.render(&record, AuthState::anonymous(), false), expected);
	}

	#[rstest]
	fn test_default_wrapper_from_settings() {
		let fixture = build(Settings {
			default_wrapper: "simple".to_string(),
			..Settings::default()
		});
		let record = fixture.record("text");

		let html = fixture.render(&record, AuthState::anonymous(), false);

		assert_eq!(html, "<div class=\"djpcms-plugin djpcms-text\">hi</div>");
	}

	#[rstest]
	fn test_placeholder_only_rendered_when_editing(fixture: Fixture) {
		let placeholder = fixture.cms.block_contents(&fixture.page, 0).unwrap().remove(0);

		assert_eq!(fixture.render(&placeholder, AuthState::superuser("1"), false), "");
		assert!(
			fixture
				.render(&placeholder, AuthState::superuser("1"), true)
				.starts_with("<div class=\"djpcms-placeholder\"")
		);
	}

	#[rstest]
	fn test_assign_plugin_restores_placeholder(fixture: Fixture) {
		// Arrange
		let mut placeholder = fixture.cms.block_contents(&fixture.page, 0).unwrap().remove(0);

		// Act
		fixture
			.cms
			.assign_plugin(&mut placeholder, " Text ", &json!({"text": "x"}), "box")
			.unwrap();

		// Assert
		let group = fixture.cms.group(fixture.page.id.unwrap(), 0).unwrap();
		assert_eq!(group.len(), 2);
		assert_eq!(group[0].plugin_name, "text");
		assert!(group[1].is_placeholder());
		assert_eq!(group[1].position, 1);
	}

	#[rstest]
	fn test_assign_unknown_plugin(fixture: Fixture) {
		let mut placeholder = fixture.cms.block_contents(&fixture.page, 0).unwrap().remove(0);

		let err = fixture
			.cms
			.assign_plugin(&mut placeholder, "nope", &json!({}), "")
			.unwrap_err();

		assert!(matches!(err, CmsError::UnknownPlugin(_)));
	}
}
