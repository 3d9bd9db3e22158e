//! Framework error types.
//!
//! Every fallible djpcms operation returns [`Result`]. The variants map onto
//! HTTP status codes through [`Error::status_code`], which is what the
//! dispatcher uses to pick an error page.

use http::StatusCode;
use thiserror::Error;

/// Result type for djpcms operations.
pub type Result<T> = std::result::Result<T, Error>;

/// djpcms errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// No route and no flat page matched the path.
	///
	/// `redirect` holds the same path with a trailing slash when that
	/// corrected path resolves.
	#[error("not found: {path}")]
	NotFound {
		/// Absolute path that failed to resolve.
		path: String,
		/// Path to redirect to instead of failing.
		redirect: Option<String>,
	},

	/// A route matched but the view does not accept the request method.
	#[error("method {method} not allowed")]
	MethodNotAllowed {
		/// Method of the rejected request.
		method: String,
		/// Methods the view accepts.
		allowed: Vec<String>,
	},

	/// A route matched but the requester lacks the required permission.
	#[error("permission denied: {0}")]
	PermissionDenied(String),

	/// Duplicate registration (application name, model claim, site, plugin).
	#[error("{kind} already registered: {name}")]
	AlreadyRegistered {
		/// What was being registered.
		kind: &'static str,
		/// Name of the duplicate.
		name: String,
	},

	/// Invalid static configuration (bad route rule, unknown converter, ...).
	#[error("improperly configured: {0}")]
	ImproperlyConfigured(String),

	/// A route variable was not supplied while building a URL.
	#[error("missing argument '{0}' to build URL")]
	MissingArgument(String),

	/// `get` found no record.
	#[error("{model} matching query does not exist")]
	DoesNotExist {
		/// Model label.
		model: &'static str,
	},

	/// `get` found more than one record.
	#[error("get() returned more than one {model}")]
	MultipleObjectsReturned {
		/// Model label.
		model: &'static str,
	},

	/// A storage constraint was violated.
	#[error("integrity error: {0}")]
	Integrity(String),

	/// None of the requested templates exists.
	#[error("template does not exist: {0}")]
	TemplateDoesNotExist(String),

	/// A template failed to render.
	#[error("template error: {0}")]
	Template(String),

	/// Serialization or deserialization failure.
	#[error("serialization error: {0}")]
	Serialization(String),

	/// Anything else.
	#[error("{0}")]
	Internal(String),
}

impl Error {
	/// Shortcut for a [`Error::NotFound`] without redirect hint.
	pub fn not_found(path: impl Into<String>) -> Self {
		Self::NotFound {
			path: path.into(),
			redirect: None,
		}
	}

	/// Shortcut for [`Error::AlreadyRegistered`].
	pub fn already_registered(kind: &'static str, name: impl Into<String>) -> Self {
		Self::AlreadyRegistered {
			kind,
			name: name.into(),
		}
	}

	/// The redirect hint carried by a not-found error.
	pub fn redirect_hint(&self) -> Option<&str> {
		match self {
			Self::NotFound { redirect, .. } => redirect.as_deref(),
			_ => None,
		}
	}

	/// Whether the error is a `DoesNotExist` storage miss.
	pub fn is_does_not_exist(&self) -> bool {
		matches!(self, Self::DoesNotExist { .. })
	}

	/// HTTP status code used when this error reaches the client.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::NotFound { .. } | Self::DoesNotExist { .. } => StatusCode::NOT_FOUND,
			Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
			Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
			Self::MissingArgument(_) => StatusCode::BAD_REQUEST,
			_ => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Serialization(err.to_string())
	}
}

impl From<tera::Error> for Error {
	fn from(err: tera::Error) -> Self {
		Self::Template(err.to_string())
	}
}
