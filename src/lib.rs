//! # djpcms
//!
//! A dynamic page content management system.
//!
//! djpcms routes request paths to views grouped into applications, mounts
//! applications into sites, and falls back to stored pages whose content is
//! assembled from blocks of plugins.
//!
//! ## Crates
//!
//! - [`core`]: errors, request and response, record storage, templates
//! - [`conf`]: layered settings and logging setup
//! - [`urls`]: route rules, the resolver tree and the sitemap
//! - [`apps`]: views, applications, sites and dispatch
//! - [`cms`]: pages, content blocks, plugins and wrappers (feature `cms`)
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use djpcms::prelude::*;
//! use serde_json::json;
//!
//! let blog = Application::new("blog", "blog/")
//!     .unwrap()
//!     .with_view(View::new("index", "", handler_fn(|_| Ok(Response::html("posts")))).unwrap())
//!     .unwrap();
//!
//! let cms = Arc::new(Cms::new(PluginRegistry::with_builtin(), WrapperRegistry::with_builtin()));
//! let mut about = Page::new("/about/", "About");
//! cms.pages().save(&mut about).unwrap();
//! cms.append_content(&about, 0, "text", &json!({"text": "*hi*", "format": "markdown"}), "")
//!     .unwrap();
//!
//! let mut sites = Sites::new(Settings::default()).unwrap();
//! sites.register("", blog).unwrap();
//! sites.set_flat_pages(Arc::new(CmsFlatPages::new(cms)));
//!
//! assert_eq!(sites.handle(&Request::get("/blog/").unwrap()).text(), "posts");
//! assert!(sites.handle(&Request::get("/about/").unwrap()).text().contains("<em>hi</em>"));
//! ```

pub use djpcms_apps as apps;
pub use djpcms_conf as conf;
pub use djpcms_core as core;
pub use djpcms_urls as urls;

#[cfg(feature = "cms")]
pub use djpcms_cms as cms;

pub use djpcms_core::{Error, Result};

/// Common imports for building a djpcms site.
pub mod prelude {
	pub use djpcms_apps::{
		Application, ModelInstance, ModelRef, Permission, Site, Sites, View, ViewContext, ViewHandler,
		handler_fn,
	};
	pub use djpcms_conf::{Settings, SettingsBuilder};
	pub use djpcms_core::http::{AuthState, Request, Response};
	pub use djpcms_core::storage::{Manager, MemoryManager, Record};
	pub use djpcms_core::template::{TemplateRenderer, TeraRenderer};
	pub use djpcms_core::{Error, Result};
	pub use djpcms_urls::route::{Route, UrlArgs};

	#[cfg(feature = "cms")]
	pub use djpcms_cms::prelude::*;
}
