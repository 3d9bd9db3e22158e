use djpcms_core::Result;
use serde_json::Value;

use super::{Plugin, PluginContext};

/// Links to the sitemap children of the current page.
///
/// Only static views flagged for navigation are listed. The optional `path`
/// argument lists the children of another node.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationPlugin;

impl Plugin for NavigationPlugin {
	fn description(&self) -> &str {
		"Navigation"
	}

	fn render(&self, ctx: &PluginContext<'_>, arguments: &Value) -> Result<String> {
		let path = arguments
			.get("path")
			.and_then(Value::as_str)
			.unwrap_or(ctx.page.url.as_str());
		let links: Vec<(String, String)> = ctx.sites.with_sitemap(|sitemap| {
			sitemap
				.children(path)
				.into_iter()
				.filter_map(|node| {
					let view = node.view()?;
					if !view.is_in_navigation() || !view.full_route().is_static() {
						return None;
					}
					let title = view.title().unwrap_or(node.path()).to_string();
					Some((node.path().to_string(), title))
				})
				.collect()
		});
		if links.is_empty() {
			return Ok(String::new());
		}

		let mut html = String::from("<ul class=\"djpcms-nav\">");
		for (href, title) in links {
			html.push_str(&format!(
				"<li><a href=\"{}\">{}</a></li>",
				html_escape::encode_double_quoted_attribute(&href),
				html_escape::encode_text(&title)
			));
		}
		html.push_str("</ul>");
		Ok(html)
	}
}
