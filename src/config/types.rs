use crate::delimiter::DEFAULT_KEY_DELIMITER;
use crate::error::{ConfigError, Result};
use crate::profile::DEFAULT_PROFILE_KEY;
use crate::source::{DEFAULT_ORDINAL_KEY, SourceNaming};
use serde::Deserialize;
use std::path::Path;

/// Default property that toggles macro expansion.
pub const DEFAULT_EXPRESSIONS_KEY: &str = "config.expressions.enabled";

/// Settings of the resolution engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngineOptions {
	/// Separator between segments of a property name.
	pub key_delimiter: char,

	/// Property listing the active profiles.
	pub profile_key: String,

	/// Property a source uses to override its own ordinal.
	pub ordinal_key: String,

	/// Boolean property; `false` turns macro expansion off.
	pub expressions_key: String,

	/// Base file name of profile-specific sources (`<base>-<profile>.<ext>`).
	pub base_name: String,
}

impl Default for EngineOptions {
	fn default() -> Self {
		EngineOptions {
			key_delimiter: DEFAULT_KEY_DELIMITER,
			profile_key: DEFAULT_PROFILE_KEY.to_string(),
			ordinal_key: DEFAULT_ORDINAL_KEY.to_string(),
			expressions_key: DEFAULT_EXPRESSIONS_KEY.to_string(),
			base_name: "application".to_string(),
		}
	}
}

impl EngineOptions {
	/// Parse options from TOML (useful for testing).
	pub fn from_toml_str(content: &str, path: &Path) -> Result<Self> {
		toml::from_str(content).map_err(|source| ConfigError::SourceParse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Read options from a TOML file.
	pub fn from_file(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::SourceRead {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&content, path)
	}

	pub fn naming(&self) -> SourceNaming {
		SourceNaming::new(self.base_name.clone())
	}
}

/// A resolved property with its provenance, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue {
	/// The requested property name.
	pub name: String,

	/// The value as stored in the source.
	pub raw: String,

	/// The value after macro expansion.
	pub value: String,

	/// Name of the source that provided the value.
	pub source_name: String,

	/// Effective ordinal of that source.
	pub source_ordinal: i32,
}
