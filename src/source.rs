//! Raw configuration sources and their aggregation.
//!
//! A source is a named, unordered bag of string properties with an ordinal.
//! Aggregation sorts sources by `(ordinal desc, name desc)` and separates
//! sources whose name marks them as belonging to a profile.

use regex::Regex;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Ordinal of system/override properties.
pub const SYSTEM_ORDINAL: i32 = 400;

/// Ordinal of the process environment.
pub const ENVIRONMENT_ORDINAL: i32 = 300;

/// Ordinal of discovered configuration files.
pub const DEFAULT_FILE_ORDINAL: i32 = 100;

/// Ordinal of files found in the user-level config directory.
pub const USER_FILE_ORDINAL: i32 = 50;

/// Reserved key that lets a source override its own ordinal.
pub const DEFAULT_ORDINAL_KEY: &str = "config_ordinal";

static ENV_NAME_INVALID: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static regex"));

/// Where a source came from. Decides its static ordinal and lookup rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
	System,
	Environment,
	File,
	Programmatic,
}

impl SourceKind {
	/// Static ordinal assigned at discovery time.
	pub fn default_ordinal(self) -> i32 {
		match self {
			SourceKind::System => SYSTEM_ORDINAL,
			SourceKind::Environment => ENVIRONMENT_ORDINAL,
			SourceKind::File | SourceKind::Programmatic => DEFAULT_FILE_ORDINAL,
		}
	}
}

/// One configuration source. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct RawSource {
	name: String,
	kind: SourceKind,
	static_ordinal: i32,
	properties: HashMap<String, String>,
}

impl RawSource {
	/// A programmatic source with an explicit ordinal.
	pub fn new<N, I, K, V>(name: N, ordinal: i32, properties: I) -> Self
	where
		N: Into<String>,
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self::build(name.into(), SourceKind::Programmatic, ordinal, properties)
	}

	/// A source of the given kind using that kind's static ordinal.
	pub fn of_kind<N, I, K, V>(kind: SourceKind, name: N, properties: I) -> Self
	where
		N: Into<String>,
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self::build(name.into(), kind, kind.default_ordinal(), properties)
	}

	/// Snapshot of the current process environment.
	pub fn environment() -> Self {
		Self::of_kind(SourceKind::Environment, "environment", std::env::vars())
	}

	fn build<I, K, V>(name: String, kind: SourceKind, static_ordinal: i32, properties: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		RawSource {
			name,
			kind,
			static_ordinal,
			properties: properties
				.into_iter()
				.map(|(k, v)| (k.into(), v.into()))
				.collect(),
		}
	}

	/// Replace the static ordinal.
	pub fn with_ordinal(mut self, ordinal: i32) -> Self {
		self.static_ordinal = ordinal;
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn kind(&self) -> SourceKind {
		self.kind
	}

	pub fn static_ordinal(&self) -> i32 {
		self.static_ordinal
	}

	pub fn properties(&self) -> &HashMap<String, String> {
		&self.properties
	}

	/// Property names held by this source.
	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.properties.keys().map(String::as_str)
	}

	/// Look up a property.
	///
	/// Environment sources also accept the canonical environment spelling:
	/// non-alphanumerics replaced by `_`, then upper-cased.
	pub fn get(&self, key: &str) -> Option<&str> {
		if let Some(value) = self.properties.get(key) {
			return Some(value);
		}
		if self.kind != SourceKind::Environment {
			return None;
		}

		let sanitized = ENV_NAME_INVALID.replace_all(key, "_");
		if let Some(value) = self.properties.get(sanitized.as_ref()) {
			return Some(value);
		}
		self.properties
			.get(&sanitized.to_uppercase())
			.map(String::as_str)
	}

	/// Effective ordinal: the override key if it parses, else the static one.
	pub fn ordinal_with(&self, ordinal_key: &str) -> i32 {
		match self.properties.get(ordinal_key) {
			Some(raw) => match raw.trim().parse::<i32>() {
				Ok(ordinal) => ordinal,
				Err(_) => {
					tracing::warn!(
						source = %self.name,
						value = %raw,
						"ignoring unparsable ordinal override"
					);
					self.static_ordinal
				}
			},
			None => self.static_ordinal,
		}
	}

	/// Effective ordinal using [`DEFAULT_ORDINAL_KEY`].
	pub fn ordinal(&self) -> i32 {
		self.ordinal_with(DEFAULT_ORDINAL_KEY)
	}
}

/// File-name convention that marks profile-specific sources.
///
/// With base name `application`, `application-dev.toml` belongs to profile
/// `dev` while `application.toml` and anything else is unconditional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNaming {
	pub base_name: String,
}

impl Default for SourceNaming {
	fn default() -> Self {
		SourceNaming {
			base_name: "application".to_string(),
		}
	}
}

impl SourceNaming {
	pub fn new(base_name: impl Into<String>) -> Self {
		SourceNaming {
			base_name: base_name.into(),
		}
	}

	/// Profile tag for a source name, or `None` for unconditional sources.
	pub fn classify(&self, source_name: &str) -> Option<String> {
		let file_name = source_name
			.rsplit(['/', '\\'])
			.next()
			.unwrap_or(source_name);

		let remainder = file_name.strip_prefix(self.base_name.as_str())?;
		let remainder = remainder.strip_prefix('-')?;
		let profile = match remainder.rfind('.') {
			Some(dot) => &remainder[..dot],
			None => remainder,
		};

		if profile.is_empty() {
			None
		} else {
			Some(profile.to_string())
		}
	}
}

/// A source placed in search order together with its effective ordinal.
#[derive(Debug, Clone)]
pub struct OrderedSource {
	pub source: Arc<RawSource>,
	pub ordinal: i32,
	pub profile: Option<String>,
}

impl OrderedSource {
	pub fn name(&self) -> &str {
		self.source.name()
	}
}

/// Sources split into unconditional and profile-tagged groups, each sorted.
#[derive(Debug, Clone, Default)]
pub struct SourcePartition {
	pub unconditional: Vec<OrderedSource>,
	pub tagged: Vec<OrderedSource>,
}

/// Sort in place by `(ordinal desc, name desc)`.
pub fn sort_sources(sources: &mut [OrderedSource]) {
	sources.sort_by_cached_key(|s| (Reverse(s.ordinal), Reverse(s.source.name().to_string())));
}

/// Order and classify raw sources.
pub fn aggregate(
	sources: Vec<RawSource>,
	naming: &SourceNaming,
	ordinal_key: &str,
) -> SourcePartition {
	let mut partition = SourcePartition::default();

	for source in sources {
		let ordered = OrderedSource {
			ordinal: source.ordinal_with(ordinal_key),
			profile: naming.classify(source.name()),
			source: Arc::new(source),
		};
		if ordered.profile.is_some() {
			partition.tagged.push(ordered);
		} else {
			partition.unconditional.push(ordered);
		}
	}

	sort_sources(&mut partition.unconditional);
	sort_sources(&mut partition.tagged);

	tracing::debug!(
		unconditional = partition.unconditional.len(),
		tagged = partition.tagged.len(),
		"aggregated config sources"
	);

	partition
}
