use djpcms_apps::ModelRef;
use djpcms_core::Result;
use serde::Deserialize;
use serde_json::Value;

use super::{Plugin, PluginContext};

#[derive(Debug, Deserialize)]
struct ModelLinkArguments {
	model: String,
	#[serde(default)]
	view: Option<String>,
	#[serde(default)]
	text: Option<String>,
}

/// A link to the application serving a model.
///
/// Arguments: `{"model": "app.model", "view": "search", "text": "..."}`.
/// Renders nothing when no URL can be built.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelLinkPlugin;

impl Plugin for ModelLinkPlugin {
	fn description(&self) -> &str {
		"Link to a model"
	}

	fn render(&self, ctx: &PluginContext<'_>, arguments: &Value) -> Result<String> {
		let args: ModelLinkArguments = serde_json::from_value(arguments.clone())?;
		let Some(url) = ctx
			.sites
			.get_url(ModelRef::Class(&args.model), args.view.as_deref())
		else {
			return Ok(String::new());
		};
		let text = args.text.unwrap_or_else(|| args.model.clone());
		Ok(format!(
			"<a href=\"{}\">{}</a>",
			html_escape::encode_double_quoted_attribute(&url),
			html_escape::encode_text(&text)
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::Page;
	use djpcms_apps::{Application, Sites, View, handler_fn};
	use djpcms_conf::Settings;
	use djpcms_core::http::{Request, Response};
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(json!({"model": "shop.item", "text": "<Shop>"}), "<a href=\"/shop/\">&lt;Shop&gt;</a>")]
	#[case(json!({"model": "shop.item", "view": "detail"}), "")]
	#[case(json!({"model": "blog.post"}), "")]
	fn test_model_link(#[case] arguments: Value, #[case] expected: &str) {
		// Arrange
		let shop = Application::new("shop", "shop/")
			.unwrap()
			.with_model("shop.item")
			.with_view(View::new("search", "", handler_fn(|_| Ok(Response::ok()))).unwrap())
			.unwrap()
			.with_view(View::new("detail", "<int:id>/", handler_fn(|_| Ok(Response::ok()))).unwrap())
			.unwrap();
		let mut sites = Sites::new(Settings::default()).unwrap();
		sites.register("", shop).unwrap();
		let request = Request::get("/").unwrap();
		let page = Page::new("/", "Home");
		let ctx = PluginContext {
			request: &request,
			sites: &sites,
			page: &page,
			editing: false,
		};

		// Act
		let html = ModelLinkPlugin.render(&ctx, &arguments).unwrap();

		// Assert
		assert_eq!(html, expected);
	}
}
