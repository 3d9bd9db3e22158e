//! # djpcms urls
//!
//! URL routing for djpcms.
//!
//! - [`converters`]: typed path converters (`int`, `float`, `any`, `path`, ...)
//!   and the registry they are looked up in
//! - [`route`]: compiled route rules that match paths and build URLs
//! - [`resolver`]: recursive resolution of a path into a view plus its
//!   extracted arguments, with flat-page fallback and trailing-slash hints
//! - [`sitemap`]: the path tree of every routed and flat page
//!
//! ```
//! use djpcms_urls::route::Route;
//! use djpcms_urls::converters::PathValue;
//!
//! let route = Route::new("blog/<int(fixed_digits=4):year>/<slug>").unwrap();
//! let found = route.match_path("blog/2024/hello").unwrap();
//! assert_eq!(found.vars["year"], PathValue::Int(2024));
//! assert_eq!(route.build_url(&found.vars).unwrap(), "/blog/2024/hello");
//! ```

pub mod converters;
pub mod resolver;
pub mod route;
pub mod sitemap;

pub use converters::{ConversionError, Converter, ConverterRegistry, PathValue};
pub use resolver::{CandidateOrder, FlatPageLookup, Resolver, ResolverMatch, Target};
pub use route::{Route, RouteMatch, UrlArgs};
pub use sitemap::{Node, Sitemap};
