use crate::convert::TypeDescriptor;
use std::path::PathBuf;

/// Boxed cause carried by conversion failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Library-level structured errors for layerconf.
///
/// Use `thiserror` for structured errors that library consumers can match on.
/// The CLI binary wraps these with `anyhow` for rich context chains.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Invalid argument: {message}")]
	InvalidArgument { message: String },

	#[error("Unresolved reference to '{key}' (chain: {})", chain.join(" -> "))]
	UnresolvedReference { key: String, chain: Vec<String> },

	#[error("Macro expansion exceeded {limit} nested references (chain: {})", chain.join(" -> "))]
	RecursionLimit { limit: usize, chain: Vec<String> },

	#[error("Macro expansion keeps rebuilding references (chain: {})", chain.join(" -> "))]
	ExpansionLoop { chain: Vec<String> },

	#[error("Failed to convert '{raw}' to {target}")]
	Conversion {
		raw: String,
		target: TypeDescriptor,
		#[source]
		source: BoxError,
	},

	#[error("No converter registered for type {target}")]
	UnsupportedType { target: TypeDescriptor },

	#[error("Property '{name}' not found (known properties: {})", known.join(", "))]
	PropertyNotFound { name: String, known: Vec<String> },

	#[error("Failed to read config source: {path}")]
	SourceRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("Failed to parse config source: {path}")]
	SourceParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("Unknown config handle: {handle}")]
	UnknownHandle { handle: u64 },

	#[error("Failed to resolve home directory")]
	HomeDirectoryNotFound,
}

impl ConfigError {
	/// Wrap an underlying coercion failure.
	pub fn conversion(
		raw: impl Into<String>,
		target: &TypeDescriptor,
		source: impl Into<BoxError>,
	) -> Self {
		ConfigError::Conversion {
			raw: raw.into(),
			target: target.clone(),
			source: source.into(),
		}
	}
}

/// Result type alias using ConfigError.
pub type Result<T> = std::result::Result<T, ConfigError>;
