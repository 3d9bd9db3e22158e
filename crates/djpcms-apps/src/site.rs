//! Sites: applications mounted below a common route.

use std::collections::HashMap;
use std::sync::Arc;

use djpcms_core::{Error, Result};
use djpcms_urls::resolver::{Candidate, CandidateOrder, Resolver};
use djpcms_urls::route::{Route, UrlArgs};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use crate::application::Application;
use crate::view::View;

/// A model instance that can be reversed into a URL.
pub trait ModelInstance {
	/// `app.model` label of the instance's model.
	fn model_label(&self) -> &str;

	/// Arguments identifying the instance in URLs.
	fn url_args(&self) -> UrlArgs;
}

/// What a reverse URL is asked for.
#[derive(Clone, Copy)]
pub enum ModelRef<'a> {
	/// A model, by label. Defaults to the `search` view.
	Class(&'a str),
	/// A model instance. Defaults to the `view` view.
	Instance(&'a dyn ModelInstance),
}

impl ModelRef<'_> {
	/// The model label.
	pub fn label(&self) -> &str {
		match self {
			Self::Class(label) => label,
			Self::Instance(instance) => instance.model_label(),
		}
	}

	fn default_view(&self) -> &'static str {
		match self {
			Self::Class(_) => "search",
			Self::Instance(_) => "view",
		}
	}

	fn url_args(&self) -> UrlArgs {
		match self {
			Self::Class(_) => UrlArgs::new(),
			Self::Instance(instance) => instance.url_args(),
		}
	}
}

/// A group of applications under one route.
#[derive(Debug)]
pub struct Site {
	route: Route,
	applications: IndexMap<String, Application>,
	models: HashMap<String, String>,
	resolver: OnceCell<Arc<Resolver<Arc<View>>>>,
}

impl Site {
	/// A site mounted at `rule`. The empty rule is the root site.
	///
	/// # Errors
	///
	/// Fails for leaf rules and invalid rules.
	pub fn new(rule: &str) -> Result<Self> {
		let route = Route::new(rule)?;
		if route.is_leaf() {
			return Err(Error::ImproperlyConfigured(format!(
				"site route must end in '/', got '{rule}'"
			)));
		}
		Ok(Self {
			route,
			applications: IndexMap::new(),
			models: HashMap::new(),
			resolver: OnceCell::new(),
		})
	}

	/// Site route.
	pub fn route(&self) -> &Route {
		&self.route
	}

	/// Registers `application`, mounting its views below the site route.
	///
	/// # Errors
	///
	/// [`Error::AlreadyRegistered`] when the application name is taken or its
	/// model is already served by another application of this site.
	pub fn register(&mut self, mut application: Application) -> Result<()> {
		if self.applications.contains_key(application.name()) {
			return Err(Error::already_registered("application", application.name()));
		}
		if let Some(model) = application.model()
			&& let Some(owner) = self.models.get(model)
		{
			return Err(Error::already_registered(
				"model",
				format!("{model} (served by {owner})"),
			));
		}
		application.mount(&self.route)?;
		if let Some(model) = application.model() {
			self.models.insert(model.to_string(), application.name().to_string());
		}
		tracing::info!(
			site = %self.route,
			application = application.name(),
			views = application.views().count(),
			"registered application"
		);
		self.applications.insert(application.name().to_string(), application);
		self.resolver = OnceCell::new();
		Ok(())
	}

	/// Application by name.
	pub fn application(&self, name: &str) -> Option<&Application> {
		self.applications.get(name)
	}

	/// Applications in registration order.
	pub fn applications(&self) -> impl Iterator<Item = &Application> {
		self.applications.values()
	}

	/// The application serving model `label`.
	pub fn for_model(&self, label: &str) -> Option<&Application> {
		self.models.get(label).and_then(|name| self.applications.get(name))
	}

	/// Reverse URL of `model` through the application serving it.
	///
	/// Returns `None` when no application serves the model, the view does
	/// not exist or the URL cannot be built.
	pub fn get_url(&self, model: ModelRef<'_>, view_name: Option<&str>) -> Option<String> {
		let label = model.label();
		let application = self.for_model(label)?;
		let view_name = view_name.unwrap_or(model.default_view());
		match application.build_url(view_name, &model.url_args()) {
			Ok(url) => Some(url),
			Err(err) => {
				tracing::debug!(model = label, view = view_name, error = %err, "no url for model");
				None
			}
		}
	}

	/// The site resolver, built on first use.
	pub fn resolver(&self) -> Arc<Resolver<Arc<View>>> {
		Arc::clone(self.resolver.get_or_init(|| {
			let candidates = self
				.applications
				.values()
				.map(|application| Candidate::resolver(Arc::new(application.resolver())))
				.collect();
			Arc::new(Resolver::new(
				self.route.clone(),
				candidates,
				CandidateOrder::SpecificFirst,
			))
		}))
	}

	/// Every mounted view.
	pub fn views(&self) -> impl Iterator<Item = &Arc<View>> {
		self.applications.values().flat_map(Application::views)
	}
}
