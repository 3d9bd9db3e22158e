use djpcms_core::Result;
use pulldown_cmark::{Options, Parser, html};
use serde::Deserialize;
use serde_json::Value;

use super::{Plugin, PluginContext};

/// Source format of a text plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
	/// Inserted as is.
	#[default]
	Html,
	/// Converted with CommonMark plus tables and strikethrough.
	Markdown,
}

#[derive(Debug, Deserialize)]
struct TextArguments {
	#[serde(default)]
	text: String,
	#[serde(default)]
	format: TextFormat,
}

/// Editor supplied text, as HTML or markdown.
///
/// Arguments: `{"text": "...", "format": "html" | "markdown"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPlugin;

impl Plugin for TextPlugin {
	fn description(&self) -> &str {
		"Text"
	}

	fn render(&self, _ctx: &PluginContext<'_>, arguments: &Value) -> Result<String> {
		let args: TextArguments = serde_json::from_value(arguments.clone())?;
		Ok(match args.format {
			TextFormat::Html => args.text,
			TextFormat::Markdown => {
				let mut options = Options::empty();
				options.insert(Options::ENABLE_TABLES);
				options.insert(Options::ENABLE_STRIKETHROUGH);
				let mut out = String::with_capacity(args.text.len() * 3 / 2);
				html::push_html(&mut out, Parser::new_ext(&args.text, options));
				out
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::Page;
	use djpcms_apps::Sites;
	use djpcms_conf::Settings;
	use djpcms_core::Error;
	use djpcms_core::http::Request;
	use rstest::rstest;
	use serde_json::json;

	fn render(arguments: Value) -> Result<String> {
		let sites = Sites::new(Settings::default())?;
		let request = Request::get("/")?;
		let page = Page::new("/", "Home");
		let ctx = PluginContext {
			request: &request,
			sites: &sites,
			page: &page,
			editing: false,
		};
		TextPlugin.render(&ctx, &arguments)
	}

	#[rstest]
	#[case(json!({"text": "<b>bold</b>"}), "<b>bold</b>")]
	#[case(json!({"text": "*hi*", "format": "markdown"}), "<p><em>hi</em></p>\n")]
	#[case(json!({}), "")]
	fn test_render(#[case] arguments: Value, #[case] expected: &str) {
		assert_eq!(render(arguments).unwrap(), expected);
	}

	#[rstest]
	fn test_unknown_format_fails() {
		let err = render(json!({"text": "x", "format": "rst"})).unwrap_err();

		assert!(matches!(err, Error::Serialization(_)));
	}
}
