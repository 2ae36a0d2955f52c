use crate::error::{ConfigError, Result};
use crate::loader::parser::parse_source_file;
use crate::source::{DEFAULT_FILE_ORDINAL, RawSource, SourceNaming, USER_FILE_ORDINAL};
use std::path::{Path, PathBuf};

/// Environment variable that disables the user config directory when truthy.
pub const NO_USER_CONFIG_ENV: &str = "LAYERCONF_NO_USER_CONFIG";

/// Discover and load all config files in the cascade.
///
/// The cascade order is:
/// 1. Start from `start_dir` and load `<base>.toml` and `<base>-*.toml`
/// 2. Continue up the directory tree, one ordinal lower per parent
/// 3. Finally, load the same files from the user config directory
///    (unless disabled)
///
/// Returns sources in cascade order (most specific first).
pub fn discover_sources(
	start_dir: &Path,
	naming: &SourceNaming,
	key_delimiter: char,
) -> Result<Vec<RawSource>> {
	let mut sources = Vec::new();
	let mut current_dir = Some(start_dir);
	let mut ordinal = DEFAULT_FILE_ORDINAL;

	while let Some(dir) = current_dir {
		let found = load_directory(dir, naming, ordinal, key_delimiter)?;
		if !found.is_empty() {
			tracing::debug!(dir = %dir.display(), ordinal, files = found.len(), "found config files");
		}
		sources.extend(found);

		// Never let a deep tree reach the user directory's ordinal.
		ordinal = (ordinal - 1).max(USER_FILE_ORDINAL + 1);
		current_dir = dir.parent();
	}

	if is_env_truthy(NO_USER_CONFIG_ENV) {
		tracing::debug!("user config directory disabled");
	} else if let Ok(user_dir) = user_config_dir() {
		sources.extend(load_directory(&user_dir, naming, USER_FILE_ORDINAL, key_delimiter)?);
	}

	Ok(sources)
}

/// Load the base file and every profile file from a single directory.
///
/// Missing directories yield no sources. Files load in name order.
pub fn load_directory(
	dir: &Path,
	naming: &SourceNaming,
	ordinal: i32,
	key_delimiter: char,
) -> Result<Vec<RawSource>> {
	let Ok(entries) = std::fs::read_dir(dir) else {
		return Ok(Vec::new());
	};

	let mut paths: Vec<PathBuf> = entries
		.filter_map(|entry| entry.ok())
		.map(|entry| entry.path())
		.filter(|path| path.is_file() && is_cascade_file(path, naming))
		.collect();
	paths.sort();

	paths
		.iter()
		.map(|path| parse_source_file(path, ordinal, key_delimiter))
		.collect()
}

fn is_cascade_file(path: &Path, naming: &SourceNaming) -> bool {
	if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
		return false;
	}
	let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
		return false;
	};
	stem == naming.base_name
		|| path
			.file_name()
			.and_then(|name| name.to_str())
			.is_some_and(|name| naming.classify(name).is_some())
}

/// Get the user-level config directory.
pub fn user_config_dir() -> Result<PathBuf> {
	let config_dir = dirs::config_dir().ok_or(ConfigError::HomeDirectoryNotFound)?;
	Ok(config_dir.join("layerconf"))
}

/// Check if an environment variable is set to a truthy value.
pub fn is_env_truthy(var_name: &str) -> bool {
	match std::env::var(var_name) {
		Ok(value) => {
			let lower = value.to_lowercase();
			!value.is_empty() && lower != "0" && lower != "false" && lower != "no"
		}
		Err(_) => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn write(dir: &Path, name: &str, content: &str) {
		std::fs::write(dir.join(name), content).unwrap();
	}

	#[test]
	fn test_is_env_truthy() {
		// SAFETY: These env var operations are safe in single-threaded test context
		unsafe {
			std::env::remove_var("TEST_LAYERCONF_ENV_1");
			assert!(!is_env_truthy("TEST_LAYERCONF_ENV_1"));

			std::env::set_var("TEST_LAYERCONF_ENV_2", "");
			assert!(!is_env_truthy("TEST_LAYERCONF_ENV_2"));

			std::env::set_var("TEST_LAYERCONF_ENV_3", "0");
			assert!(!is_env_truthy("TEST_LAYERCONF_ENV_3"));

			std::env::set_var("TEST_LAYERCONF_ENV_4", "FALSE");
			assert!(!is_env_truthy("TEST_LAYERCONF_ENV_4"));

			std::env::set_var("TEST_LAYERCONF_ENV_5", "no");
			assert!(!is_env_truthy("TEST_LAYERCONF_ENV_5"));

			std::env::set_var("TEST_LAYERCONF_ENV_6", "1");
			assert!(is_env_truthy("TEST_LAYERCONF_ENV_6"));

			std::env::set_var("TEST_LAYERCONF_ENV_7", "yes");
			assert!(is_env_truthy("TEST_LAYERCONF_ENV_7"));

			for i in 1..=7 {
				std::env::remove_var(format!("TEST_LAYERCONF_ENV_{}", i));
			}
		}
	}

	#[test]
	fn test_user_config_dir() {
		if let Ok(path) = user_config_dir() {
			assert!(path.ends_with("layerconf"));
		}
	}

	#[test]
	fn test_load_directory_picks_cascade_files() {
		let dir = TempDir::new().unwrap();
		write(dir.path(), "application.toml", "a = 1");
		write(dir.path(), "application-dev.toml", "a = 2");
		write(dir.path(), "other.toml", "a = 3");
		write(dir.path(), "application.yaml", "a: 4");

		let naming = SourceNaming::default();
		let sources = load_directory(dir.path(), &naming, 100, '.').unwrap();
		let names: Vec<String> = sources
			.iter()
			.map(|s| Path::new(s.name()).file_name().unwrap().to_string_lossy().into_owned())
			.collect();
		assert_eq!(names, vec!["application-dev.toml", "application.toml"]);
		assert!(sources.iter().all(|s| s.static_ordinal() == 100));
	}

	#[test]
	fn test_load_missing_directory() {
		let naming = SourceNaming::default();
		let sources = load_directory(Path::new("/nonexistent/layerconf"), &naming, 100, '.').unwrap();
		assert!(sources.is_empty());
	}

	#[test]
	fn test_discover_nested_ordinals() {
		let root = TempDir::new().unwrap();
		let child = root.path().join("child");
		std::fs::create_dir(&child).unwrap();
		write(root.path(), "application.toml", "level = \"root\"");
		write(&child, "application.toml", "level = \"child\"");

		let naming = SourceNaming::default();
		let sources = discover_sources(&child, &naming, '.').unwrap();
		let ours: Vec<&RawSource> = sources
			.iter()
			.filter(|s| s.name().starts_with(&root.path().display().to_string()))
			.collect();

		assert_eq!(ours.len(), 2);
		assert_eq!(ours[0].get("level"), Some("child"));
		assert_eq!(ours[0].static_ordinal(), 100);
		assert_eq!(ours[1].get("level"), Some("root"));
		assert_eq!(ours[1].static_ordinal(), 99);
	}
}
