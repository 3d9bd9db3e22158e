//! # djpcms cms
//!
//! Stored pages assembled from content blocks.
//!
//! A [`Page`] lays its content out through an optional [`InnerTemplate`]
//! declaring numbered blocks. Each block holds an ordered stack of
//! [`BlockContent`] records, every one naming a [`Plugin`] that renders it
//! and a [`Wrapper`] that decorates the result. The last record of a block
//! is always an empty placeholder, the drop target for editors.
//!
//! [`CmsFlatPages`] plugs stored pages into URL resolution, so a page is
//! served at its URL whenever no application route claims the path.
//!
//! ```
//! use std::sync::Arc;
//!
//! use djpcms_apps::Sites;
//! use djpcms_cms::prelude::*;
//! use djpcms_conf::Settings;
//! use djpcms_core::http::Request;
//! use djpcms_core::storage::Manager;
//! use serde_json::json;
//!
//! let cms = Arc::new(Cms::new(PluginRegistry::with_builtin(), WrapperRegistry::with_builtin()));
//! let mut page = Page::new("/about/", "About");
//! cms.pages().save(&mut page).unwrap();
//! cms.append_content(&page, 0, "text", &json!({"text": "<p>Hello</p>"}), "").unwrap();
//!
//! let mut sites = Sites::new(Settings::default()).unwrap();
//! sites.set_flat_pages(Arc::new(CmsFlatPages::new(Arc::clone(&cms))));
//!
//! let response = sites.handle(&Request::get("/about/").unwrap());
//! assert!(response.text().contains("<p>Hello</p>"));
//! ```

pub mod blocks;
pub mod editing;
pub mod error;
pub mod models;
pub mod page;
pub mod plugins;
pub mod wrappers;

pub use blocks::Cms;
pub use editing::Neighbor;
pub use error::{CmsError, CmsResult};
pub use models::{BlockContent, InnerTemplate, Page};
pub use page::{CmsFlatPages, PageView};
pub use plugins::{Plugin, PluginContext, PluginRegistry};
pub use wrappers::{Wrapper, WrapperRegistry};

/// Everything needed to set up and edit pages.
pub mod prelude {
	pub use crate::blocks::Cms;
	pub use crate::editing::Neighbor;
	pub use crate::error::{CmsError, CmsResult};
	pub use crate::models::{BlockContent, InnerTemplate, Page};
	pub use crate::page::{CmsFlatPages, PageView};
	pub use crate::plugins::{Plugin, PluginContext, PluginRegistry};
	pub use crate::wrappers::{Wrapper, WrapperRegistry};
}
