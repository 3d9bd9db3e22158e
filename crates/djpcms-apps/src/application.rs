//! Applications: named groups of views under a base route.

use std::sync::Arc;

use djpcms_core::{Error, Result};
use djpcms_urls::resolver::{Candidate, CandidateOrder, Resolver};
use djpcms_urls::route::{Route, UrlArgs};
use indexmap::IndexMap;

use crate::view::View;

/// A named group of views, optionally bound to a model.
#[derive(Debug, Clone)]
pub struct Application {
	name: String,
	route: Route,
	model: Option<String>,
	views: IndexMap<String, Arc<View>>,
}

impl Application {
	/// Creates an application mounted at `base_rule` below its site.
	///
	/// # Errors
	///
	/// `base_rule` must be a non-leaf rule (empty or ending in `/`).
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_apps::application::Application;
	///
	/// assert!(Application::new("blog", "blog/").is_ok());
	/// assert!(Application::new("blog", "blog").is_err());
	/// ```
	pub fn new(name: impl Into<String>, base_rule: &str) -> Result<Self> {
		let name = name.into();
		let route = Route::new(base_rule)?;
		if route.is_leaf() {
			return Err(Error::ImproperlyConfigured(format!(
				"application '{name}' needs a base route ending in '/', got '{base_rule}'"
			)));
		}
		Ok(Self {
			name,
			route,
			model: None,
			views: IndexMap::new(),
		})
	}

	/// Binds the application to a model label, used for reverse URLs.
	pub fn with_model(mut self, label: impl Into<String>) -> Self {
		self.model = Some(label.into());
		self
	}

	/// Adds a view. Views are tried in the order they are added.
	pub fn with_view(mut self, view: View) -> Result<Self> {
		self.add_view(view)?;
		Ok(self)
	}

	/// Adds a view.
	///
	/// # Errors
	///
	/// [`Error::AlreadyRegistered`] when a view with the same name exists.
	pub fn add_view(&mut self, view: View) -> Result<()> {
		if self.views.contains_key(view.name()) {
			return Err(Error::already_registered(
				"view",
				format!("{}:{}", self.name, view.name()),
			));
		}
		let full_route = self.route.join(view.route())?;
		let view = view.mounted(full_route, &self.name, self.model.as_deref());
		self.views.insert(view.name().to_string(), Arc::new(view));
		Ok(())
	}

	/// Rebinds every view below `site_route`.
	pub(crate) fn mount(&mut self, site_route: &Route) -> Result<()> {
		let base = site_route.join(&self.route)?;
		for view in self.views.values_mut() {
			let full_route = base.join(view.route())?;
			*view = Arc::new(view.mounted(full_route, &self.name, self.model.as_deref()));
		}
		Ok(())
	}

	/// Application name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Base route relative to the site.
	pub fn route(&self) -> &Route {
		&self.route
	}

	/// Bound model label.
	pub fn model(&self) -> Option<&str> {
		self.model.as_deref()
	}

	/// View by name.
	pub fn get_view(&self, name: &str) -> Option<&Arc<View>> {
		self.views.get(name)
	}

	/// Views in registration order.
	pub fn views(&self) -> impl Iterator<Item = &Arc<View>> {
		self.views.values()
	}

	/// URL of view `name`.
	pub fn build_url(&self, name: &str, args: &UrlArgs) -> Result<String> {
		let view = self
			.get_view(name)
			.ok_or_else(|| Error::not_found(format!("{}:{name}", self.name)))?;
		view.build_url(args)
	}

	/// A resolver over the views, mounted at the application route.
	pub fn resolver(&self) -> Resolver<Arc<View>> {
		let candidates = self
			.views
			.values()
			.map(|view| Candidate::view(view.route().clone(), Arc::clone(view)))
			.collect();
		Resolver::new(self.route.clone(), candidates, CandidateOrder::Registration)
	}
}
