//! Request, response and authentication state.
//!
//! The dispatcher consumes a [`Request`] and produces a [`Response`]. The
//! HTTP server itself lives outside djpcms; these types only carry what the
//! resolver, the views and the content pipeline need.

use std::collections::{BTreeSet, HashMap};

use ::http::header::{CONTENT_TYPE, LOCATION};
use ::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use bytes::Bytes;

use crate::exception::{Error, Result};

/// Authentication state of the requesting user.
///
/// Authentication backends are not part of djpcms; whatever authenticates
/// the user fills one of these in before dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
	/// The authenticated user's ID. Empty for anonymous users.
	pub user_id: String,

	/// Whether the user is authenticated.
	pub is_authenticated: bool,

	/// Whether the user is a superuser. Superusers hold every permission.
	pub is_superuser: bool,

	/// Permission codes granted to the user, e.g. `cms.change_page`.
	pub permissions: BTreeSet<String>,
}

impl AuthState {
	/// Creates an authenticated, non-superuser state.
	pub fn authenticated(user_id: impl Into<String>) -> Self {
		Self {
			user_id: user_id.into(),
			is_authenticated: true,
			..Self::default()
		}
	}

	/// Creates an authenticated superuser state.
	pub fn superuser(user_id: impl Into<String>) -> Self {
		Self {
			is_superuser: true,
			..Self::authenticated(user_id)
		}
	}

	/// Creates an anonymous (unauthenticated) state.
	pub fn anonymous() -> Self {
		Self::default()
	}

	/// Grants a permission code.
	pub fn with_permission(mut self, code: impl Into<String>) -> Self {
		self.permissions.insert(code.into());
		self
	}

	/// Check if user is anonymous (not authenticated).
	pub fn is_anonymous(&self) -> bool {
		!self.is_authenticated
	}

	/// Whether the user holds `code`.
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_core::http::AuthState;
	///
	/// let editor = AuthState::authenticated("7").with_permission("cms.change_page");
	/// assert!(editor.has_perm("cms.change_page"));
	/// assert!(!editor.has_perm("cms.delete_page"));
	/// assert!(AuthState::superuser("1").has_perm("cms.delete_page"));
	/// ```
	pub fn has_perm(&self, code: &str) -> bool {
		self.is_authenticated && (self.is_superuser || self.permissions.contains(code))
	}
}

/// An incoming request.
#[derive(Debug, Clone)]
pub struct Request {
	/// HTTP method.
	pub method: Method,
	/// Parsed request URI.
	pub uri: Uri,
	/// Decoded query parameters. A key given several times keeps its last value.
	pub query_params: HashMap<String, String>,
	/// Request headers.
	pub headers: HeaderMap,
	/// Requesting user.
	pub user: AuthState,
	/// Raw body.
	pub body: Bytes,
}

impl Request {
	/// Starts building a request.
	pub fn builder() -> RequestBuilder {
		RequestBuilder::default()
	}

	/// Builds an anonymous `GET` request.
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_core::http::Request;
	///
	/// let request = Request::get("/blog/?page=2").unwrap();
	/// assert_eq!(request.path(), "/blog/");
	/// assert_eq!(request.query("page"), Some("2"));
	/// ```
	pub fn get(uri: &str) -> Result<Self> {
		Self::builder().uri(uri).build()
	}

	/// Get the request path.
	pub fn path(&self) -> &str {
		self.uri.path()
	}

	/// A decoded query parameter.
	pub fn query(&self, key: &str) -> Option<&str> {
		self.query_params.get(key).map(String::as_str)
	}

	fn parse_query_params(uri: &Uri) -> Result<HashMap<String, String>> {
		match uri.query() {
			Some(query) => serde_urlencoded::from_str::<Vec<(String, String)>>(query)
				.map(|pairs| pairs.into_iter().collect())
				.map_err(|e| Error::Serialization(e.to_string())),
			None => Ok(HashMap::new()),
		}
	}
}

/// Builder for [`Request`].
#[derive(Debug, Default)]
pub struct RequestBuilder {
	method: Option<Method>,
	uri: Option<String>,
	headers: HeaderMap,
	user: AuthState,
	body: Bytes,
}

impl RequestBuilder {
	/// Sets the method. Defaults to `GET`.
	pub fn method(mut self, method: Method) -> Self {
		self.method = Some(method);
		self
	}

	/// Sets the URI (path plus optional query string).
	pub fn uri(mut self, uri: impl Into<String>) -> Self {
		self.uri = Some(uri.into());
		self
	}

	/// Adds a header.
	pub fn header(mut self, name: ::http::header::HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);
		self
	}

	/// Sets the requesting user.
	pub fn user(mut self, user: AuthState) -> Self {
		self.user = user;
		self
	}

	/// Sets the body.
	pub fn body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Finishes the request.
	///
	/// Fails when the URI cannot be parsed or the query string is malformed.
	pub fn build(self) -> Result<Request> {
		let raw = self.uri.unwrap_or_else(|| "/".to_string());
		let uri: Uri = raw
			.parse()
			.map_err(|e: ::http::uri::InvalidUri| Error::Internal(format!("invalid uri '{raw}': {e}")))?;
		let query_params = Request::parse_query_params(&uri)?;
		Ok(Request {
			method: self.method.unwrap_or(Method::GET),
			uri,
			query_params,
			headers: self.headers,
			user: self.user,
			body: self.body,
		})
	}
}

/// HTTP Response representation
#[derive(Debug, Clone)]
pub struct Response {
	/// Status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body.
	pub body: Bytes,
}

impl Response {
	/// Create a new Response with the given status code
	pub fn new(status: StatusCode) -> Self {
		Self {
			status,
			headers: HeaderMap::new(),
			body: Bytes::new(),
		}
	}

	/// Create a Response with HTTP 200 OK status
	pub fn ok() -> Self {
		Self::new(StatusCode::OK)
	}

	/// A `200 OK` HTML response.
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_core::http::Response;
	///
	/// let response = Response::html("<p>hi</p>");
	/// assert_eq!(response.status, http::StatusCode::OK);
	/// assert_eq!(response.text(), "<p>hi</p>");
	/// ```
	pub fn html(body: impl Into<String>) -> Self {
		Self::ok()
			.with_header(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"))
			.with_body(body.into())
	}

	/// Create a Response with HTTP 403 Forbidden status
	pub fn forbidden() -> Self {
		Self::new(StatusCode::FORBIDDEN)
	}

	/// Create a Response with HTTP 404 Not Found status
	pub fn not_found() -> Self {
		Self::new(StatusCode::NOT_FOUND)
	}

	/// Create a Response with HTTP 301 Moved Permanently (permanent redirect)
	///
	/// # Examples
	///
	/// ```
	/// use djpcms_core::http::Response;
	///
	/// let response = Response::permanent_redirect("/new-location/");
	/// assert_eq!(response.status, http::StatusCode::MOVED_PERMANENTLY);
	/// assert_eq!(response.location(), Some("/new-location/"));
	/// ```
	pub fn permanent_redirect(location: impl AsRef<str>) -> Self {
		Self::new(StatusCode::MOVED_PERMANENTLY).with_location(location.as_ref())
	}

	/// Create a Response with HTTP 302 Found (temporary redirect)
	pub fn temporary_redirect(location: impl AsRef<str>) -> Self {
		Self::new(StatusCode::FOUND).with_location(location.as_ref())
	}

	/// Replaces the status code.
	pub fn with_status(mut self, status: StatusCode) -> Self {
		self.status = status;
		self
	}

	/// Replaces the body.
	pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = body.into();
		self
	}

	/// Sets a header.
	pub fn with_header(mut self, name: ::http::header::HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);
		self
	}

	/// Sets the `Location` header. Values that are not valid header text are dropped.
	pub fn with_location(mut self, location: &str) -> Self {
		match HeaderValue::from_str(location) {
			Ok(value) => {
				self.headers.insert(LOCATION, value);
			}
			Err(_) => tracing::warn!(location, "dropping invalid Location header"),
		}
		self
	}

	/// The `Location` header, if set.
	pub fn location(&self) -> Option<&str> {
		self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
	}

	/// The body as text (lossy).
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}
