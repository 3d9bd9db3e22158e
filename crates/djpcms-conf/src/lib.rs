//! # djpcms conf
//!
//! Settings for a djpcms process, assembled from layered
//! [`ConfigSource`](sources::ConfigSource)s, plus the `tracing` subscriber
//! setup driven by those settings.
//!
//! ```
//! use djpcms_conf::{Settings, SettingsBuilder, sources::DefaultSource};
//! use serde_json::Value;
//!
//! let settings = SettingsBuilder::new()
//!     .add_source(DefaultSource::new().with_value("debug", Value::Bool(true)))
//!     .build()
//!     .unwrap();
//! assert!(settings.debug);
//! assert!(settings.append_slash);
//! ```

pub mod logging;
pub mod settings;
pub mod sources;

pub use settings::{LogFormat, LoggingSettings, Settings, SettingsBuilder, SettingsError};
