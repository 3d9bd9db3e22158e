//! # djpcms apps
//!
//! Views, applications and sites, and the dispatcher serving them.
//!
//! A [`View`] is a route plus a render strategy. Views are grouped into an
//! [`Application`], applications are mounted into a [`Site`], and every site
//! of a process is held by [`Sites`], which resolves request paths and turns
//! errors into responses.
//!
//! ```
//! use djpcms_apps::{Application, Sites, View, handler_fn};
//! use djpcms_conf::Settings;
//! use djpcms_core::http::{Request, Response};
//!
//! let blog = Application::new("blog", "blog/")
//!     .unwrap()
//!     .with_view(View::new("index", "", handler_fn(|_| Ok(Response::html("posts")))).unwrap())
//!     .unwrap();
//! let mut sites = Sites::new(Settings::default()).unwrap();
//! sites.register("", blog).unwrap();
//!
//! let response = sites.handle(&Request::get("/blog/").unwrap());
//! assert_eq!(response.text(), "posts");
//! ```

pub mod application;
pub mod handler;
pub mod site;
pub mod sites;
pub mod view;

pub use application::Application;
pub use site::{ModelInstance, ModelRef, Site};
pub use sites::{FlatPages, Sites};
pub use view::{Permission, RouteUrl, UrlBuilder, View, ViewContext, ViewHandler, handler_fn};
