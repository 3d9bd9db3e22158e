//! The view record.
//!
//! A [`View`] bundles everything the dispatcher needs to serve a route: the
//! accepted methods, the required [`Permission`], how to build its URL
//! ([`UrlBuilder`]) and how to render it ([`ViewHandler`]).

use std::fmt;
use std::sync::Arc;

use djpcms_core::http::{AuthState, Request, Response};
use djpcms_core::{Error, Result};
use djpcms_urls::route::{Route, UrlArgs};
use http::Method;

use crate::sites::Sites;

/// Access requirement of a view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Permission {
	/// Anyone.
	#[default]
	Public,
	/// Authenticated users.
	Authenticated,
	/// Superusers only.
	Superuser,
	/// A model permission, e.g. `Model("change")` on a `cms.page` view
	/// requires `cms.change_page`.
	Model(String),
}

impl Permission {
	/// Permission code for `action` on `model` (`app.model` label).
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_apps::view::Permission;
	///
	/// assert_eq!(Permission::code("change", Some("cms.page")), "cms.change_page");
	/// assert_eq!(Permission::code("publish", None), "publish");
	/// ```
	pub fn code(action: &str, model: Option<&str>) -> String {
		match model.and_then(|label| label.split_once('.')) {
			Some((app, name)) => format!("{app}.{action}_{name}"),
			None => match model {
				Some(label) => format!("{action}_{label}"),
				None => action.to_string(),
			},
		}
	}

	/// Whether `user` satisfies this requirement for a view bound to `model`.
	pub fn allows(&self, user: &AuthState, model: Option<&str>) -> bool {
		match self {
			Self::Public => true,
			Self::Authenticated => user.is_authenticated,
			Self::Superuser => user.is_authenticated && user.is_superuser,
			Self::Model(action) => user.has_perm(&Self::code(action, model)),
		}
	}
}

/// Everything a handler sees while rendering.
pub struct ViewContext<'a> {
	/// The request being served.
	pub request: &'a Request,
	/// The resolved view.
	pub view: &'a View,
	/// Variables captured from the path.
	pub kwargs: &'a UrlArgs,
	/// The registry that resolved the request.
	pub sites: &'a Sites,
}

/// Renders a view.
pub trait ViewHandler: Send + Sync {
	/// Produces the response.
	fn render(&self, ctx: &ViewContext<'_>) -> Result<Response>;
}

impl<F> ViewHandler for F
where
	F: Fn(&ViewContext<'_>) -> Result<Response> + Send + Sync,
{
	fn render(&self, ctx: &ViewContext<'_>) -> Result<Response> {
		self(ctx)
	}
}

/// Wraps a closure as a [`ViewHandler`], fixing its signature.
///
/// # Examples
///
/// ```
/// use djpcms_apps::view::{View, handler_fn};
/// use djpcms_core::http::Response;
///
/// let view = View::new("index", "", handler_fn(|_| Ok(Response::html("hi")))).unwrap();
/// assert_eq!(view.name(), "index");
/// assert!(view.allows_method(&http::Method::HEAD));
/// ```
pub fn handler_fn<F>(f: F) -> F
where
	F: Fn(&ViewContext<'_>) -> Result<Response> + Send + Sync + 'static,
{
	f
}

/// Builds the URL of a view.
pub trait UrlBuilder: Send + Sync {
	/// The absolute URL of `view` for `args`.
	fn build_url(&self, view: &View, args: &UrlArgs) -> Result<String>;
}

/// Builds URLs from the view's full route.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteUrl;

impl UrlBuilder for RouteUrl {
	fn build_url(&self, view: &View, args: &UrlArgs) -> Result<String> {
		view.full_route().build_url(args)
	}
}

/// A routed view.
#[derive(Clone)]
pub struct View {
	name: String,
	route: Route,
	full_route: Route,
	methods: Vec<Method>,
	permission: Permission,
	url_builder: Arc<dyn UrlBuilder>,
	handler: Arc<dyn ViewHandler>,
	in_navigation: bool,
	title: Option<String>,
	application: Option<String>,
	model: Option<String>,
}

impl fmt::Debug for View {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("View")
			.field("name", &self.name)
			.field("route", &self.full_route.rule())
			.field("methods", &self.methods)
			.field("permission", &self.permission)
			.field("application", &self.application)
			.finish()
	}
}

impl View {
	/// A public `GET`/`HEAD` view at `rule`, relative to its application.
	pub fn new(name: impl Into<String>, rule: &str, handler: impl ViewHandler + 'static) -> Result<Self> {
		Ok(Self::with_route(name, Route::new(rule)?, Arc::new(handler)))
	}

	/// A view over an already compiled route.
	pub fn with_route(name: impl Into<String>, route: Route, handler: Arc<dyn ViewHandler>) -> Self {
		Self {
			name: name.into(),
			full_route: route.clone(),
			route,
			methods: vec![Method::GET, Method::HEAD],
			permission: Permission::Public,
			url_builder: Arc::new(RouteUrl),
			handler,
			in_navigation: false,
			title: None,
			application: None,
			model: None,
		}
	}

	/// Replaces the accepted methods.
	pub fn with_methods(mut self, methods: &[Method]) -> Self {
		self.methods = methods.to_vec();
		self
	}

	/// Sets the access requirement.
	pub fn with_permission(mut self, permission: Permission) -> Self {
		self.permission = permission;
		self
	}

	/// Replaces the URL strategy.
	pub fn with_url_builder(mut self, builder: Arc<dyn UrlBuilder>) -> Self {
		self.url_builder = builder;
		self
	}

	/// Lists the view in navigation.
	pub fn in_navigation(mut self, title: impl Into<String>) -> Self {
		self.in_navigation = true;
		self.title = Some(title.into());
		self
	}

	/// Sets the title without listing the view in navigation.
	pub fn with_title(mut self, title: impl Into<String>) -> Self {
		self.title = Some(title.into());
		self
	}

	/// Binds the view to a model label, for model permissions.
	pub fn with_model(mut self, model: impl Into<String>) -> Self {
		self.model = Some(model.into());
		self
	}

	pub(crate) fn mounted(&self, full_route: Route, application: &str, model: Option<&str>) -> Self {
		let mut view = self.clone();
		view.full_route = full_route;
		view.application = Some(application.to_string());
		if view.model.is_none() {
			view.model = model.map(str::to_string);
		}
		view
	}

	/// View name, unique within its application.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Route relative to the application.
	pub fn route(&self) -> &Route {
		&self.route
	}

	/// Absolute route, once mounted.
	pub fn full_route(&self) -> &Route {
		&self.full_route
	}

	/// Accepted methods.
	pub fn methods(&self) -> &[Method] {
		&self.methods
	}

	/// Access requirement.
	pub fn permission(&self) -> &Permission {
		&self.permission
	}

	/// The render strategy.
	pub fn handler(&self) -> &Arc<dyn ViewHandler> {
		&self.handler
	}

	/// Whether the view is listed in navigation.
	pub fn is_in_navigation(&self) -> bool {
		self.in_navigation
	}

	/// Title, if any.
	pub fn title(&self) -> Option<&str> {
		self.title.as_deref()
	}

	/// Name of the owning application.
	pub fn application(&self) -> Option<&str> {
		self.application.as_deref()
	}

	/// Model label the view is bound to.
	pub fn model(&self) -> Option<&str> {
		self.model.as_deref()
	}

	/// Whether `method` is accepted.
	pub fn allows_method(&self, method: &Method) -> bool {
		self.methods.contains(method)
	}

	/// Whether `user` may see the view.
	pub fn has_permission(&self, user: &AuthState) -> bool {
		self.permission.allows(user, self.model())
	}

	/// Builds the view URL.
	pub fn build_url(&self, args: &UrlArgs) -> Result<String> {
		self.url_builder.build_url(self, args)
	}

	/// Checks method and permission, then renders.
	pub fn serve(&self, ctx: &ViewContext<'_>) -> Result<Response> {
		if !self.allows_method(&ctx.request.method) {
			return Err(Error::MethodNotAllowed {
				method: ctx.request.method.to_string(),
				allowed: self.methods.iter().map(ToString::to_string).collect(),
			});
		}
		if !self.has_permission(&ctx.request.user) {
			return Err(Error::PermissionDenied(format!(
				"{} requires {:?}",
				self.full_route.path(),
				self.permission
			)));
		}
		self.handler.render(ctx)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn editor() -> AuthState {
		AuthState::authenticated("2").with_permission("cms.change_page")
	}

	#[rstest]
	#[case(Permission::Public, AuthState::anonymous(), true)]
	#[case(Permission::Authenticated, AuthState::anonymous(), false)]
	#[case(Permission::Authenticated, editor(), true)]
	#[case(Permission::Superuser, editor(), false)]
	#[case(Permission::Superuser, AuthState::superuser("1"), true)]
	#[case(Permission::Model("change".into()), editor(), true)]
	#[case(Permission::Model("delete".into()), editor(), false)]
	#[case(Permission::Model("delete".into()), AuthState::superuser("1"), true)]
	fn test_permission_allows(#[case] permission: Permission, #[case] user: AuthState, #[case] expected: bool) {
		assert_eq!(permission.allows(&user, Some("cms.page")), expected);
	}

	#[rstest]
	fn test_mounted_view_keeps_relative_route() {
		// Arrange
		let view = View::new("detail", "<int:id>", handler_fn(|_| Ok(Response::ok()))).unwrap();
		let full = Route::new("shop/items/<int:id>").unwrap();

		// Act
		let mounted = view.mounted(full, "items", Some("shop.item"));

		// Assert
		assert_eq!(mounted.route().rule(), "<int:id>");
		assert_eq!(mounted.full_route().rule(), "shop/items/<int:id>");
		assert_eq!(mounted.application(), Some("items"));
		assert_eq!(mounted.model(), Some("shop.item"));
	}

	#[rstest]
	fn test_custom_url_builder() {
		struct Fixed;
		impl UrlBuilder for Fixed {
			fn build_url(&self, _view: &View, _args: &UrlArgs) -> Result<String> {
				Ok("/elsewhere/".to_string())
			}
		}

		let view = View::new("x", "x", handler_fn(|_| Ok(Response::ok())))
			.unwrap()
			.with_url_builder(Arc::new(Fixed));

		assert_eq!(view.build_url(&UrlArgs::new()).unwrap(), "/elsewhere/");
	}
}
