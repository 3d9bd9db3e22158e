//! The site registry.
//!
//! [`Sites`] is the value a process builds at startup: settings, the sites
//! and their applications, the template renderer and the optional flat-page
//! lookup. The root resolver and the sitemap are derived lazily from the
//! registrations and dropped whenever a registration changes them.

use std::fmt;
use std::sync::Arc;

use djpcms_conf::Settings;
use djpcms_core::template::{TemplateRenderer, TeraRenderer};
use djpcms_core::{Error, Result};
use djpcms_urls::resolver::{Candidate, CandidateOrder, FlatPageLookup, Resolver, ResolverMatch};
use djpcms_urls::route::Route;
use djpcms_urls::sitemap::Sitemap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::application::Application;
use crate::site::{ModelRef, Site};
use crate::view::View;

/// Views resolved for stored pages.
pub type FlatPages = Arc<dyn FlatPageLookup<Arc<View>>>;

/// Every site of a process.
pub struct Sites {
	settings: Settings,
	sites: Vec<Site>,
	renderer: Arc<dyn TemplateRenderer>,
	flat_pages: Option<FlatPages>,
	resolver: OnceCell<Arc<Resolver<Arc<View>>>>,
	sitemap: RwLock<Option<Sitemap<Arc<View>>>>,
}

impl fmt::Debug for Sites {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let routes: Vec<&str> = self.sites.iter().map(|s| s.route().rule()).collect();
		f.debug_struct("Sites")
			.field("sites", &routes)
			.field("flat_pages", &self.flat_pages.is_some())
			.finish()
	}
}

impl Sites {
	/// An empty registry rendering through a [`TeraRenderer`] loaded with
	/// the configured template directories.
	pub fn new(settings: Settings) -> Result<Self> {
		let renderer = TeraRenderer::with_dirs(settings.template_dirs.as_slice())?;
		Ok(Self::with_renderer(settings, Arc::new(renderer)))
	}

	/// An empty registry with a custom renderer.
	pub fn with_renderer(settings: Settings, renderer: Arc<dyn TemplateRenderer>) -> Self {
		Self {
			settings,
			sites: Vec::new(),
			renderer,
			flat_pages: None,
			resolver: OnceCell::new(),
			sitemap: RwLock::new(None),
		}
	}

	/// Adds a site.
	///
	/// # Errors
	///
	/// [`Error::AlreadyRegistered`] when a site already uses the same route.
	pub fn add_site(&mut self, site: Site) -> Result<()> {
		if self.sites.iter().any(|s| s.route() == site.route()) {
			return Err(Error::already_registered("site", site.route().path()));
		}
		tracing::info!(site = %site.route(), "added site");
		self.sites.push(site);
		self.invalidate();
		Ok(())
	}

	/// Registers `application` with the site at `site_rule`, creating the
	/// site when needed.
	pub fn register(&mut self, site_rule: &str, application: Application) -> Result<()> {
		let route = Route::new(site_rule)?;
		let index = match self.sites.iter().position(|s| s.route() == &route) {
			Some(index) => index,
			None => {
				self.add_site(Site::new(site_rule)?)?;
				self.sites.len() - 1
			}
		};
		self.sites[index].register(application)?;
		self.invalidate();
		Ok(())
	}

	/// Sets the lookup consulted when no application route matches.
	pub fn set_flat_pages(&mut self, lookup: FlatPages) {
		self.flat_pages = Some(lookup);
		self.invalidate();
	}

	fn invalidate(&mut self) {
		self.resolver = OnceCell::new();
		*self.sitemap.get_mut() = None;
	}

	/// Settings.
	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	/// Template renderer.
	pub fn renderer(&self) -> &Arc<dyn TemplateRenderer> {
		&self.renderer
	}

	/// Registered sites.
	pub fn sites(&self) -> &[Site] {
		&self.sites
	}

	/// Site mounted at `rule`.
	pub fn site(&self, rule: &str) -> Option<&Site> {
		let route = Route::new(rule).ok()?;
		self.sites.iter().find(|s| s.route() == &route)
	}

	/// The root resolver, built on first use.
	pub fn resolver(&self) -> Arc<Resolver<Arc<View>>> {
		Arc::clone(self.resolver.get_or_init(|| {
			let candidates = self
				.sites
				.iter()
				.map(|site| Candidate::resolver(site.resolver()))
				.collect();
			let resolver = Resolver::new(Route::root(), candidates, CandidateOrder::SpecificFirst);
			let resolver = match &self.flat_pages {
				Some(lookup) => resolver.with_flat_pages(Arc::clone(lookup)),
				None => resolver,
			};
			tracing::debug!(sites = self.sites.len(), "built root resolver");
			Arc::new(resolver)
		}))
	}

	/// Resolves an absolute path. Paths served by flat pages join the
	/// sitemap.
	pub fn resolve(&self, path: &str) -> Result<ResolverMatch<Arc<View>>> {
		let found = self.resolver().resolve(path)?;
		if found.target.application().is_none() {
			self.insert_into_sitemap(&found.path, Arc::clone(&found.target));
		}
		Ok(found)
	}

	/// The application serving model `label`, searching every site.
	pub fn for_model(&self, label: &str) -> Option<&Application> {
		self.sites.iter().find_map(|site| site.for_model(label))
	}

	/// Reverse URL for `model`, searching every site in order.
	pub fn get_url(&self, model: ModelRef<'_>, view_name: Option<&str>) -> Option<String> {
		let site = self.sites.iter().find(|site| site.for_model(model.label()).is_some());
		match site {
			Some(site) => site.get_url(model, view_name),
			None => {
				tracing::debug!(model = model.label(), "no application serves model");
				None
			}
		}
	}

	fn build_sitemap(&self) -> Sitemap<Arc<View>> {
		let mut sitemap = Sitemap::new();
		for view in self.sites.iter().flat_map(Site::views) {
			if view.full_route().is_static() {
				sitemap.insert(&view.full_route().path(), Some(Arc::clone(view)));
			}
		}
		sitemap
	}

	/// Runs `f` against the sitemap, building it on first use.
	///
	/// Readers share the sitemap once it is built. `f` must not call back
	/// into the sitemap.
	pub fn with_sitemap<R>(&self, f: impl FnOnce(&Sitemap<Arc<View>>) -> R) -> R {
		if let Some(sitemap) = self.sitemap.read().as_ref() {
			return f(sitemap);
		}
		let mut guard = self.sitemap.write();
		let sitemap = guard.get_or_insert_with(|| self.build_sitemap());
		f(sitemap)
	}

	/// Adds `path` to the sitemap, bound to `view`.
	pub fn insert_into_sitemap(&self, path: &str, view: Arc<View>) {
		let mut guard = self.sitemap.write();
		let sitemap = guard.get_or_insert_with(|| self.build_sitemap());
		if sitemap.insert(path, Some(view)) {
			tracing::debug!(path, "added sitemap node");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::view::handler_fn;
	use djpcms_core::http::Response;
	use rstest::rstest;

	fn app(name: &str, base: &str, views: &[(&str, &str)]) -> Application {
		let mut app = Application::new(name, base).unwrap();
		for (view, rule) in views {
			app.add_view(View::new(*view, rule, handler_fn(|_| Ok(Response::ok()))).unwrap())
				.unwrap();
		}
		app
	}

	#[rstest]
	fn test_specific_site_first() {
		// Arrange
		let mut sites = Sites::new(Settings::default()).unwrap();
		sites.register("", app("pages", "", &[("page", "<path:rest>")])).unwrap();
		sites.register("admin/", app("dash", "", &[("home", "")])).unwrap();

		// Act
		let found = sites.resolve("/admin/").unwrap();

		// Assert
		assert_eq!(found.target.name(), "home");
		assert_eq!(sites.resolve("/about").unwrap().target.name(), "page");
	}

	#[rstest]
	fn test_duplicate_site_route() {
		let mut sites = Sites::new(Settings::default()).unwrap();
		sites.add_site(Site::new("admin/").unwrap()).unwrap();

		let err = sites.add_site(Site::new("/admin/").unwrap()).unwrap_err();

		assert!(matches!(err, Error::AlreadyRegistered { kind: "site", .. }));
	}

	#[rstest]
	fn test_sitemap_holds_static_views() {
		// Arrange
		let mut sites = Sites::new(Settings::default()).unwrap();
		sites
			.register("", app("blog", "blog/", &[("index", ""), ("post", "<slug>"), ("archive", "archive/")]))
			.unwrap();

		// Act
		let children: Vec<String> =
			sites.with_sitemap(|map| map.children("/blog/").iter().map(|n| n.path().to_string()).collect());

		// Assert
		assert_eq!(children, vec!["/blog/archive/".to_string()]);
		assert!(sites.with_sitemap(|map| map.contains("/blog/")));
	}

	#[rstest]
	fn test_registration_invalidates_sitemap() {
		let mut sites = Sites::new(Settings::default()).unwrap();
		sites.register("", app("blog", "blog/", &[("index", "")])).unwrap();
		assert!(!sites.with_sitemap(|map| map.contains("/docs/")));

		sites.register("", app("docs", "docs/", &[("index", "")])).unwrap();

		assert!(sites.with_sitemap(|map| map.contains("/docs/")));
	}

	#[rstest]
	fn test_sitemap_readers_overlap() {
		// Arrange
		let mut sites = Sites::new(Settings::default()).unwrap();
		sites.register("", app("blog", "blog/", &[("index", "")])).unwrap();
		sites.with_sitemap(|_| ());
		let inside = std::sync::Barrier::new(2);

		// Act
		let found: Vec<bool> = std::thread::scope(|scope| {
			let readers: Vec<_> = (0..2)
				.map(|_| {
					scope.spawn(|| {
						sites.with_sitemap(|map| {
							inside.wait();
							map.contains("/blog/")
						})
					})
				})
				.collect();
			readers.into_iter().map(|r| r.join().unwrap()).collect()
		});

		// Assert
		assert_eq!(found, vec![true, true]);
	}
}
