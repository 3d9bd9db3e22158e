//! # djpcms core
//!
//! Fundamental building blocks shared by every djpcms crate:
//!
//! - [`exception`]: the framework error taxonomy and its HTTP status mapping
//! - [`http`]: request, response and authentication state
//! - [`storage`]: the narrow record/manager contract the CMS persists through
//! - [`template`]: the template renderer contract and its Tera implementation

#![warn(missing_docs)]

pub mod exception;
pub mod http;
pub mod storage;
pub mod template;

pub use exception::{Error, Result};
