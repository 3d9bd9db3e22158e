//! Request dispatch and error pages.

use djpcms_core::http::{Request, Response};
use djpcms_core::template::ERROR_TEMPLATE;
use djpcms_core::{Error, Result};
use http::HeaderValue;
use http::header::ALLOW;
use serde_json::json;

use crate::sites::Sites;
use crate::view::ViewContext;

impl Sites {
	/// Serves `request`, turning every error into an error response.
	pub fn handle(&self, request: &Request) -> Response {
		match self.dispatch(request) {
			Ok(response) => response,
			Err(err) => self.error_response(request, &err),
		}
	}

	/// Resolves `request` and serves the view it leads to.
	///
	/// # Errors
	///
	/// Resolution misses, method and permission failures and every error the
	/// view returns.
	pub fn dispatch(&self, request: &Request) -> Result<Response> {
		let found = self.resolve(request.path())?;
		tracing::debug!(
			path = request.path(),
			view = found.target.name(),
			application = ?found.target.application(),
			"dispatching"
		);
		let ctx = ViewContext {
			request,
			view: &found.target,
			kwargs: &found.kwargs,
			sites: self,
		};
		found.target.serve(&ctx)
	}

	/// The response for `err`.
	///
	/// A not-found error carrying a redirect hint becomes a permanent
	/// redirect when `append_slash` is on. Anything else renders the first
	/// of `<status>.html` and `error.html`.
	pub fn error_response(&self, request: &Request, err: &Error) -> Response {
		if self.settings().append_slash
			&& let Some(hint) = err.redirect_hint()
		{
			let location = match request.uri.query() {
				Some(query) => format!("{hint}?{query}"),
				None => hint.to_string(),
			};
			tracing::debug!(path = request.path(), %location, "appending slash");
			return Response::permanent_redirect(location);
		}

		let status = err.status_code();
		if status.is_server_error() {
			tracing::error!(path = request.path(), error = %err, "request failed");
		} else {
			tracing::debug!(path = request.path(), status = status.as_u16(), error = %err, "request failed");
		}

		let reason = status.canonical_reason().unwrap_or_default();
		let detail = (self.settings().debug && request.user.is_superuser).then(|| err.to_string());
		let context = json!({
			"status": status.as_u16(),
			"reason": reason,
			"detail": detail,
			"path": request.path(),
			"site_title": self.settings().site_title,
		});
		let status_template = format!("{}.html", status.as_u16());
		let body = match self
			.renderer()
			.render_first(&[status_template.as_str(), ERROR_TEMPLATE], &context)
		{
			Ok(body) => body,
			Err(render_err) => {
				tracing::warn!(error = %render_err, "error page failed to render");
				format!("<h1>{} {reason}</h1>", status.as_u16())
			}
		};

		let mut response = Response::html(body).with_status(status);
		if let Error::MethodNotAllowed { allowed, .. } = err
			&& let Ok(value) = HeaderValue::from_str(&allowed.join(", "))
		{
			response = response.with_header(ALLOW, value);
		}
		response
	}
}
