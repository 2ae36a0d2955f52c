//! Layerconf - layered configuration resolution.
//!
//! This library provides the core functionality for layerconf, including:
//! - Ordinal-based merging of raw property sources
//! - Profile-aware lookups (`%profile.key` and `application-<profile>` sources)
//! - Recursive `${key:default}` / `#{expr}` macro expansion
//! - Typed conversion through a priority-ordered converter registry
//! - Atomic snapshot rebuilds and an explicit handle registry
//!
//! # Example
//!
//! ```
//! use layerconf::{Config, RawSource};
//!
//! let config = Config::builder()
//! 	.source(RawSource::new("env", 300, [("APP_NAME", "x")]))
//! 	.source(RawSource::new(
//! 		"application.toml",
//! 		100,
//! 		[("app.name", "${APP_NAME}-svc"), ("app.port", "8080,9090")],
//! 	))
//! 	.build()
//! 	.unwrap();
//!
//! assert_eq!(config.get::<String>("app.name").unwrap(), "x-svc");
//! assert_eq!(config.get::<Vec<u16>>("app.port").unwrap(), vec![8080, 9090]);
//! ```

pub mod config;
pub mod convert;
pub mod delimiter;
pub mod error;
pub mod expand;
pub mod loader;
pub mod profile;
pub mod registry;
pub mod source;

pub use config::{Config, ConfigBuilder, ConfigValue, EngineOptions, ExpressionEvaluator, Snapshot};
pub use convert::{
	ConverterEntry, ConverterRegistry, FromValue, ScalarType, Supplier, TypeDescriptor, Value,
};
pub use error::{ConfigError, Result};
pub use registry::{ConfigHandle, ConfigRegistry};
pub use source::{RawSource, SourceKind};
