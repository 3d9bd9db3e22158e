//! A site assembled through the facade, configured from settings sources.

use std::sync::Arc;

use djpcms::conf::sources::DefaultSource;
use djpcms::prelude::*;
use http::StatusCode;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

struct Greeting;

impl Plugin for Greeting {
	fn render(&self, ctx: &PluginContext<'_>, arguments: &Value) -> Result<String> {
		let name = arguments.get("name").and_then(Value::as_str).unwrap_or("stranger");
		if ctx.user().is_authenticated {
			Ok(format!("<p>Welcome back, {name}</p>"))
		} else {
			Ok(format!("<p>Hello, {name}</p>"))
		}
	}
}

struct Broken;

impl Plugin for Broken {
	fn render(&self, _ctx: &PluginContext<'_>, _arguments: &Value) -> Result<String> {
		Err(Error::Internal("greeting service down".to_string()))
	}
}

fn build(debug: bool) -> Sites {
	let settings = SettingsBuilder::new()
		.add_source(
			DefaultSource::new()
				.with_value("debug", Value::Bool(debug))
				.with_value("default_wrapper", json!("simple"))
				.with_value("site_title", json!("Example")),
		)
		.build()
		.unwrap();

	let mut plugins = PluginRegistry::with_builtin();
	plugins.register("greeting", Greeting).unwrap();
	plugins.register("broken", Broken).unwrap();
	let cms = Arc::new(Cms::new(plugins, WrapperRegistry::with_builtin()));

	let mut home = Page::new("/", "Home");
	cms.pages().save(&mut home).unwrap();
	cms.append_content(&home, 0, "Greeting", &json!({"name": "Ada"}), "").unwrap();
	cms.append_content(&home, 0, "broken", &json!({}), "").unwrap();

	let mut sites = Sites::new(settings).unwrap();
	sites.set_flat_pages(Arc::new(CmsFlatPages::new(cms)));
	sites
}

#[fixture]
fn sites() -> Sites {
	build(false)
}

#[rstest]
fn test_default_wrapper_from_settings(sites: Sites) {
	// Act
	let response = sites.handle(&Request::get("/").unwrap());

	// Assert
	let html = response.text();
	assert_eq!(response.status, StatusCode::OK);
	assert!(html.contains("<title>Home | Example</title>"));
	assert!(html.contains("<div class=\"djpcms-plugin djpcms-greeting\"><p>Hello, Ada</p></div>"));
	assert!(!html.contains("djpcms-plugin-error"));
}

#[rstest]
fn test_plugin_sees_requesting_user(sites: Sites) {
	let request = Request::builder()
		.uri("/")
		.user(AuthState::authenticated("8"))
		.build()
		.unwrap();

	let html = sites.handle(&request).text();

	assert!(html.contains("<p>Welcome back, Ada</p>"));
}

#[rstest]
fn test_plugin_errors_revealed_in_debug() {
	// Arrange
	let sites = build(true);

	// Act
	let html = sites.handle(&Request::get("/").unwrap()).text();

	// Assert
	assert!(html.contains("<div class=\"djpcms-plugin-error\">greeting service down</div>"));
	assert!(html.contains("<p>Hello, Ada</p>"));
}

#[rstest]
fn test_unknown_path_uses_error_page(sites: Sites) {
	let response = sites.handle(&Request::get("/missing/").unwrap());

	assert_eq!(response.status, StatusCode::NOT_FOUND);
	assert!(response.text().contains("404"));
}
