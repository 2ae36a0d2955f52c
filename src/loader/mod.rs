//! Loading raw sources from files, the environment and overrides.
//!
//! This module handles:
//! - TOML file parsing and flattening into property names
//! - Directory cascade discovery
//! - `key=value` override parsing

pub mod cascade;
pub mod parser;

pub use cascade::{
	NO_USER_CONFIG_ENV, discover_sources, is_env_truthy, load_directory, user_config_dir,
};
pub use parser::{flatten_table, parse_source_file, parse_source_str};

use crate::config::EngineOptions;
use crate::error::{ConfigError, Result};
use crate::source::{DEFAULT_FILE_ORDINAL, RawSource, SourceKind};
use std::path::PathBuf;

/// Produces raw sources for a config build.
pub trait SourceLoader {
	fn load(&self) -> Result<Vec<RawSource>>;
}

/// A single TOML file.
#[derive(Debug, Clone)]
pub struct FileLoader {
	pub path: PathBuf,
	pub ordinal: i32,
	pub key_delimiter: char,
}

impl FileLoader {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		FileLoader {
			path: path.into(),
			ordinal: DEFAULT_FILE_ORDINAL,
			key_delimiter: EngineOptions::default().key_delimiter,
		}
	}

	pub fn with_ordinal(mut self, ordinal: i32) -> Self {
		self.ordinal = ordinal;
		self
	}
}

impl SourceLoader for FileLoader {
	fn load(&self) -> Result<Vec<RawSource>> {
		Ok(vec![parse_source_file(&self.path, self.ordinal, self.key_delimiter)?])
	}
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentLoader;

impl SourceLoader for EnvironmentLoader {
	fn load(&self) -> Result<Vec<RawSource>> {
		Ok(vec![RawSource::environment()])
	}
}

/// Files discovered from a directory upwards plus the user config directory.
#[derive(Debug, Clone)]
pub struct DirectoryCascade {
	pub start_dir: PathBuf,
	pub options: EngineOptions,
}

impl DirectoryCascade {
	pub fn new(start_dir: impl Into<PathBuf>, options: EngineOptions) -> Self {
		DirectoryCascade {
			start_dir: start_dir.into(),
			options,
		}
	}
}

impl SourceLoader for DirectoryCascade {
	fn load(&self) -> Result<Vec<RawSource>> {
		discover_sources(&self.start_dir, &self.options.naming(), self.options.key_delimiter)
	}
}

/// `key=value` overrides given on the command line.
#[derive(Debug, Clone, Default)]
pub struct OverrideLoader {
	pub overrides: Vec<(String, String)>,
}

impl OverrideLoader {
	/// Parse `key=value` arguments. The key must be non-empty.
	pub fn parse<I, S>(args: I) -> Result<Self>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let overrides = args
			.into_iter()
			.map(|arg| parse_override(arg.as_ref()))
			.collect::<Result<Vec<_>>>()?;
		Ok(OverrideLoader { overrides })
	}
}

impl SourceLoader for OverrideLoader {
	fn load(&self) -> Result<Vec<RawSource>> {
		if self.overrides.is_empty() {
			return Ok(Vec::new());
		}
		Ok(vec![RawSource::of_kind(
			SourceKind::System,
			"overrides",
			self.overrides.iter().cloned(),
		)])
	}
}

fn parse_override(arg: &str) -> Result<(String, String)> {
	match arg.split_once('=') {
		Some((key, value)) if !key.trim().is_empty() => {
			Ok((key.trim().to_string(), value.to_string()))
		}
		_ => Err(ConfigError::InvalidArgument {
			message: format!("expected key=value, got '{arg}'"),
		}),
	}
}

/// Template written by `layerconf --init`.
pub fn init_template() -> &'static str {
	r#"# Layered configuration.
#
# Keys flatten into dotted property names: [app] name = ".." is `app.name`.
# Profile-specific files sit next to this one as application-<profile>.toml.

# Comma-separated active profiles, highest precedence first.
# [config]
# profile = "dev"

[app]
name = "${APP_NAME:my-service}"
port = 8080

# Only used when the `dev` profile is active.
["%dev".app]
port = 8081
"#
}

/// Run several loaders, concatenating their sources.
pub fn load_all(loaders: &[&dyn SourceLoader]) -> Result<Vec<RawSource>> {
	let mut sources = Vec::new();
	for loader in loaders {
		sources.extend(loader.load()?);
	}
	Ok(sources)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::SYSTEM_ORDINAL;
	use tempfile::TempDir;

	#[test]
	fn test_parse_overrides() {
		let loader = OverrideLoader::parse(["app.name=x", "empty=", "eq=a=b"]).unwrap();
		assert_eq!(
			loader.overrides,
			vec![
				("app.name".to_string(), "x".to_string()),
				("empty".to_string(), String::new()),
				("eq".to_string(), "a=b".to_string()),
			]
		);

		let sources = loader.load().unwrap();
		assert_eq!(sources.len(), 1);
		assert_eq!(sources[0].ordinal(), SYSTEM_ORDINAL);
		assert_eq!(sources[0].get("eq"), Some("a=b"));
	}

	#[test]
	fn test_parse_override_errors() {
		assert!(OverrideLoader::parse(["novalue"]).is_err());
		assert!(OverrideLoader::parse(["=x"]).is_err());
		assert!(OverrideLoader::parse(Vec::<String>::new()).unwrap().load().unwrap().is_empty());
	}

	#[test]
	fn test_file_loader() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("custom.toml");
		std::fs::write(&path, "[app]\nname = \"svc\"").unwrap();

		let sources = FileLoader::new(&path).with_ordinal(150).load().unwrap();
		assert_eq!(sources[0].get("app.name"), Some("svc"));
		assert_eq!(sources[0].ordinal(), 150);
	}

	#[test]
	fn test_init_template_parses() {
		let source =
			parse_source_str(init_template(), &PathBuf::from("application.toml"), 100, '.').unwrap();
		assert_eq!(source.get("app.name"), Some("${APP_NAME:my-service}"));
		assert_eq!(source.get("%dev.app.port"), Some("8081"));
	}

	#[test]
	fn test_load_all() {
		let overrides = OverrideLoader::parse(["a=1"]).unwrap();
		let sources = load_all(&[&overrides, &EnvironmentLoader]).unwrap();
		assert_eq!(sources.len(), 2);
		assert_eq!(sources[1].kind(), SourceKind::Environment);
	}
}
