//! CMS errors.

use djpcms_core::Error;
use thiserror::Error;

/// Errors raised by content operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CmsError {
	/// Block index outside `0..numblocks`.
	#[error("block {block} out of range: page has {numblocks} block(s)")]
	BlockOutOfRange {
		/// Requested block.
		block: u32,
		/// Blocks the page declares.
		numblocks: usize,
	},

	/// No page stored at the URL.
	#[error("Page not found: {0}")]
	PageNotFound(String),

	/// Plugin name not in the registry.
	#[error("Plugin not registered: {0}")]
	UnknownPlugin(String),

	/// Rejected rearrangement.
	#[error("Invalid move: {0}")]
	InvalidMove(String),

	/// Storage or framework error.
	#[error(transparent)]
	Store(#[from] Error),
}

impl From<serde_json::Error> for CmsError {
	fn from(err: serde_json::Error) -> Self {
		Self::Store(err.into())
	}
}

impl From<CmsError> for Error {
	fn from(err: CmsError) -> Self {
		match err {
			CmsError::Store(inner) => inner,
			CmsError::PageNotFound(url) => Error::not_found(url),
			other => Error::Internal(other.to_string()),
		}
	}
}

/// Result type for CMS operations
pub type CmsResult<T> = Result<T, CmsError>;
