use crate::delimiter::{escape_delimiter, join_values};
use crate::error::{ConfigError, Result};
use crate::source::{RawSource, SourceKind};
use std::collections::HashMap;
use std::path::Path;
use toml::{Table, Value};

/// Parse a TOML file into a file source named after its path.
pub fn parse_source_file(path: &Path, ordinal: i32, key_delimiter: char) -> Result<RawSource> {
	let content = std::fs::read_to_string(path).map_err(|source| ConfigError::SourceRead {
		path: path.to_path_buf(),
		source,
	})?;

	parse_source_str(&content, path, ordinal, key_delimiter)
}

/// Parse TOML content into a file source (useful for testing).
pub fn parse_source_str(
	content: &str,
	path: &Path,
	ordinal: i32,
	key_delimiter: char,
) -> Result<RawSource> {
	let table: Table = toml::from_str(content).map_err(|source| ConfigError::SourceParse {
		path: path.to_path_buf(),
		source,
	})?;

	let mut properties = HashMap::new();
	flatten_table(&table, None, key_delimiter, &mut properties);
	tracing::trace!(path = %path.display(), properties = properties.len(), "parsed config file");

	Ok(RawSource::of_kind(SourceKind::File, path.display().to_string(), properties)
		.with_ordinal(ordinal))
}

/// Flatten nested tables into delimiter-joined property names.
///
/// Key segments containing the delimiter are escaped. Arrays of scalars
/// become one comma list; arrays holding tables are flattened by index.
pub fn flatten_table(
	table: &Table,
	prefix: Option<&str>,
	key_delimiter: char,
	out: &mut HashMap<String, String>,
) {
	for (key, value) in table {
		let segment = escape_delimiter(key, key_delimiter);
		let name = match prefix {
			Some(prefix) => format!("{prefix}{key_delimiter}{segment}"),
			None => segment,
		};
		flatten_value(value, name, key_delimiter, out);
	}
}

fn flatten_value(value: &Value, name: String, key_delimiter: char, out: &mut HashMap<String, String>) {
	match value {
		Value::Table(table) => flatten_table(table, Some(&name), key_delimiter, out),
		Value::Array(items) if items.iter().any(is_structured) => {
			for (index, item) in items.iter().enumerate() {
				flatten_value(item, format!("{name}{key_delimiter}{index}"), key_delimiter, out);
			}
		}
		Value::Array(items) => {
			out.insert(name, join_values(items.iter().map(scalar_text)));
		}
		scalar => {
			out.insert(name, scalar_text(scalar));
		}
	}
}

fn is_structured(value: &Value) -> bool {
	matches!(value, Value::Table(_) | Value::Array(_))
}

fn scalar_text(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Integer(i) => i.to_string(),
		Value::Float(f) => f.to_string(),
		Value::Boolean(b) => b.to_string(),
		Value::Datetime(dt) => dt.to_string(),
		Value::Array(_) | Value::Table(_) => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	fn parse(content: &str) -> RawSource {
		parse_source_str(content, &PathBuf::from("application.toml"), 100, '.').unwrap()
	}

	#[test]
	fn test_parse_empty_source() {
		let source = parse("");
		assert_eq!(source.properties().len(), 0);
		assert_eq!(source.name(), "application.toml");
		assert_eq!(source.kind(), SourceKind::File);
		assert_eq!(source.static_ordinal(), 100);
	}

	#[test]
	fn test_flatten_nested_tables() {
		let source = parse(
			r#"
config_ordinal = 120

[app]
name = "svc"
port = 8080
debug = true
ratio = 0.5

[app.db]
url = "postgres://localhost"
"#,
		);
		assert_eq!(source.get("app.name"), Some("svc"));
		assert_eq!(source.get("app.port"), Some("8080"));
		assert_eq!(source.get("app.debug"), Some("true"));
		assert_eq!(source.get("app.ratio"), Some("0.5"));
		assert_eq!(source.get("app.db.url"), Some("postgres://localhost"));
		assert_eq!(source.ordinal(), 120);
	}

	#[test]
	fn test_arrays_join_with_escapes() {
		let source = parse(r#"hosts = ["a", "b,c", "d"]"#);
		assert_eq!(source.get("hosts"), Some(r"a,b\,c,d"));
	}

	#[test]
	fn test_array_of_tables_by_index() {
		let source = parse(
			r#"
[[servers]]
host = "a"

[[servers]]
host = "b"
"#,
		);
		assert_eq!(source.get("servers.0.host"), Some("a"));
		assert_eq!(source.get("servers.1.host"), Some("b"));
	}

	#[test]
	fn test_quoted_keys_are_escaped() {
		let source = parse(
			r#"
"%dev".app.name = "dev-svc"
[logging]
"org.example" = "debug"
"#,
		);
		assert_eq!(source.get("%dev.app.name"), Some("dev-svc"));
		assert_eq!(source.get(r"logging.org\.example"), Some("debug"));
	}

	#[test]
	fn test_parse_invalid_toml() {
		let result = parse_source_str("app = [", &PathBuf::from("bad.toml"), 100, '.');
		match result.unwrap_err() {
			ConfigError::SourceParse { path, .. } => assert_eq!(path, PathBuf::from("bad.toml")),
			other => panic!("Expected SourceParse error, got {other:?}"),
		}
	}

	#[test]
	fn test_missing_file() {
		let result = parse_source_file(&PathBuf::from("/nonexistent/application.toml"), 100, '.');
		assert!(matches!(result, Err(ConfigError::SourceRead { .. })));
	}
}
