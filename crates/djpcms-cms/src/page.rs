//! Serving stored pages.

use std::sync::Arc;

use djpcms_apps::{View, ViewContext, ViewHandler};
use djpcms_core::http::Response;
use djpcms_core::{Error, Result};
use djpcms_urls::resolver::FlatPageLookup;
use djpcms_urls::route::Route;
use serde_json::json;

use crate::blocks::Cms;
use crate::error::CmsResult;
use crate::models::Page;
use crate::plugins::PluginContext;

/// Permission required to edit pages inline.
pub const CHANGE_PAGE: &str = "cms.change_page";

impl Cms {
	/// Renders the page in `ctx` through its outer layout template.
	///
	/// Blocks are substituted into the inner template when the page has one;
	/// otherwise the single block is the content.
	pub fn render_page(&self, ctx: &PluginContext<'_>) -> CmsResult<String> {
		let blocks = self.render_blocks(ctx)?;
		let content = match self.inner_template(ctx.page)? {
			Some(template) => template.render(&blocks),
			None => blocks.concat(),
		};
		let template = ctx
			.page
			.template
			.as_deref()
			.unwrap_or(ctx.settings().page_template.as_str());
		let context = json!({
			"page": {
				"id": ctx.page.id,
				"url": ctx.page.url,
				"title": ctx.page.title,
			},
			"content": content,
			"blocks": blocks,
			"editing": ctx.editing,
			"site_title": ctx.settings().site_title,
		});
		Ok(ctx.sites.renderer().render(template, &context)?)
	}
}

/// Renders one stored page.
pub struct PageView {
	cms: Arc<Cms>,
	page: Page,
}

impl PageView {
	/// A view over `page`.
	pub fn new(cms: Arc<Cms>, page: Page) -> Self {
		Self { cms, page }
	}

	/// The page.
	pub fn page(&self) -> &Page {
		&self.page
	}

	/// A routable view at the page URL.
	pub fn into_view(self) -> Result<View> {
		let route = Route::new(&self.page.url)?;
		let title = self.page.title.clone();
		let in_navigation = self.page.in_navigation;
		let view = View::with_route("page", route, Arc::new(self)).with_model("cms.page");
		Ok(if in_navigation {
			view.in_navigation(title)
		} else {
			view.with_title(title)
		})
	}
}

impl ViewHandler for PageView {
	fn render(&self, ctx: &ViewContext<'_>) -> Result<Response> {
		let user = &ctx.request.user;
		if self.page.requires_login && !user.is_authenticated {
			return Err(Error::PermissionDenied(format!(
				"{} requires login",
				self.page.url
			)));
		}
		let editing = ctx.request.query("edit").is_some() && user.has_perm(CHANGE_PAGE);
		let plugin_ctx = PluginContext {
			request: ctx.request,
			sites: ctx.sites,
			page: &self.page,
			editing,
		};
		let html = self.cms.render_page(&plugin_ctx)?;
		Ok(Response::html(html))
	}
}

/// Resolves stored pages by URL.
pub struct CmsFlatPages {
	cms: Arc<Cms>,
}

impl CmsFlatPages {
	/// A lookup over the pages of `cms`.
	pub fn new(cms: Arc<Cms>) -> Self {
		Self { cms }
	}
}

impl FlatPageLookup<Arc<View>> for CmsFlatPages {
	fn lookup(&self, url: &str) -> Result<Option<Arc<View>>> {
		let Some(page) = self.cms.page_for_url(url)? else {
			return Ok(None);
		};
		tracing::debug!(url, page = ?page.id, "serving stored page");
		let view = PageView::new(Arc::clone(&self.cms), page).into_view()?;
		Ok(Some(Arc::new(view)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::InnerTemplate;
	use crate::plugins::PluginRegistry;
	use crate::wrappers::WrapperRegistry;
	use djpcms_apps::Sites;
	use djpcms_conf::Settings;
	use djpcms_core::http::{AuthState, Request};
	use djpcms_core::storage::Manager;
	use djpcms_core::template::TeraRenderer;
	use http::StatusCode;
	use rstest::{fixture, rstest};

	struct Fixture {
		cms: Arc<Cms>,
		sites: Sites,
	}

	#[fixture]
	fn fixture() -> Fixture {
		let cms = Arc::new(Cms::new(PluginRegistry::with_builtin(), WrapperRegistry::with_builtin()));
		let renderer = TeraRenderer::new().unwrap();
		renderer
			.add_raw_template("plain.html", "{{ page.title }}|{{ content | safe }}|{{ editing }}")
			.unwrap();
		let mut sites = Sites::with_renderer(Settings::default(), Arc::new(renderer));
		sites.set_flat_pages(Arc::new(CmsFlatPages::new(Arc::clone(&cms))));
		Fixture { cms, sites }
	}

	fn store(cms: &Cms, mut page: Page) -> Page {
		page.template = Some("plain.html".to_string());
		cms.pages().save(&mut page).unwrap();
		page
	}

	#[rstest]
	fn test_single_block_page(fixture: Fixture) {
		// Arrange
		let page = store(&fixture.cms, Page::new("/about/", "About"));
		fixture
			.cms
			.append_content(&page, 0, "text", &json!({"text": "<p>us</p>"}), "")
			.unwrap();

		// Act
		let response = fixture.sites.handle(&Request::get("/about/").unwrap());

		// Assert
		let id = page.id.unwrap();
		assert_eq!(response.status, StatusCode::OK);
		assert_eq!(
			response.text(),
			format!("About|<div id=\"djpcms-block-{id}-0\" class=\"djpcms-block\" data-block=\"0\"><p>us</p></div>|false")
		);
	}

	#[rstest]
	fn test_inner_template_layout(fixture: Fixture) {
		// Arrange
		let mut template = InnerTemplate::new("cols", "<main>{{ content0 }}</main><aside>{{ content1 }}</aside>");
		fixture.cms.templates().save(&mut template).unwrap();
		let page = store(&fixture.cms, Page::new("/cols/", "Cols").with_inner_template(&template));
		fixture.cms.append_content(&page, 1, "text", &json!({"text": "side"}), "").unwrap();

		// Act
		let text = fixture.sites.handle(&Request::get("/cols/").unwrap()).text();

		// Assert
		let id = page.id.unwrap();
		assert!(text.contains(&format!(
			"<aside><div id=\"djpcms-block-{id}-1\" class=\"djpcms-block\" data-block=\"1\">side</div></aside>"
		)));
		assert!(text.contains(&format!("<main><div id=\"djpcms-block-{id}-0\"")));
	}

	#[rstest]
	fn test_marker_number_selects_block(fixture: Fixture) {
		// Arrange
		let mut template = InnerTemplate::new("flipped", "<aside>{{ content1 }}</aside><main>{{ content0 }}</main>");
		fixture.cms.templates().save(&mut template).unwrap();
		let page = store(&fixture.cms, Page::new("/flipped/", "Flipped").with_inner_template(&template));
		fixture.cms.append_content(&page, 0, "text", &json!({"text": "body"}), "").unwrap();
		fixture.cms.append_content(&page, 1, "text", &json!({"text": "side"}), "").unwrap();

		// Act
		let text = fixture.sites.handle(&Request::get("/flipped/").unwrap()).text();

		// Assert
		assert!(text.contains("<aside><div id=\"djpcms-block-"), "{text}");
		assert!(text.contains("data-block=\"1\">side</div></aside>"), "{text}");
		assert!(text.contains("data-block=\"0\">body</div></main>"), "{text}");
	}

	#[rstest]
	#[case(AuthState::anonymous(), "false")]
	#[case(AuthState::authenticated("4"), "false")]
	#[case(AuthState::authenticated("4").with_permission(CHANGE_PAGE), "true")]
	#[case(AuthState::superuser("1"), "true")]
	fn test_editing_requires_change_permission(
		fixture: Fixture,
		#[case] user: AuthState,
		#[case] editing: &str,
	) {
		store(&fixture.cms, Page::new("/e/", "E"));
		let request = Request::builder().uri("/e/?edit").user(user).build().unwrap();

		let text = fixture.sites.handle(&request).text();

		assert!(text.ends_with(&format!("|{editing}")), "{text}");
	}

	#[rstest]
	fn test_login_required(fixture: Fixture) {
		store(&fixture.cms, Page::new("/members/", "Members").requires_login());

		let anonymous = fixture.sites.handle(&Request::get("/members/").unwrap());
		let member = Request::builder()
			.uri("/members/")
			.user(AuthState::authenticated("2"))
			.build()
			.unwrap();

		assert_eq!(anonymous.status, StatusCode::FORBIDDEN);
		assert_eq!(fixture.sites.handle(&member).status, StatusCode::OK);
	}

	#[rstest]
	fn test_stored_page_redirect_hint(fixture: Fixture) {
		store(&fixture.cms, Page::new("/admin/pages/", "Pages"));

		let response = fixture.sites.handle(&Request::get("/admin/pages").unwrap());

		assert_eq!(response.status, StatusCode::MOVED_PERMANENTLY);
		assert_eq!(response.location(), Some("/admin/pages/"));
	}
}
