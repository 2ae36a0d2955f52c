//! Active profile discovery and profile-aware property lookup.
//!
//! A value can be scoped to a profile two ways:
//! - a `%profile.key` entry inside any source
//! - a plain `key` entry inside a source tagged with that profile
//!   (e.g. `application-dev.toml`)

use crate::delimiter::{SplitMode, split_values};
use crate::source::{OrderedSource, SourcePartition};
use std::collections::BTreeSet;

/// Marker that starts a profile-prefixed property name.
pub const PROFILE_PREFIX: char = '%';

/// Default property listing the active profiles.
pub const DEFAULT_PROFILE_KEY: &str = "config.profile";

/// Discover the active profiles from unconditional sources.
///
/// The first source (highest ordinal first) with a non-blank value wins.
/// Earlier entries have higher precedence.
pub fn resolve_active_profiles(unconditional: &[OrderedSource], profile_key: &str) -> Vec<String> {
	for ordered in unconditional {
		if let Some(raw) = ordered.source.get(profile_key)
			&& !raw.trim().is_empty()
		{
			let mut profiles: Vec<String> = Vec::new();
			for profile in split_values(raw, SplitMode::Trimmed) {
				if !profiles.contains(&profile) {
					profiles.push(profile);
				}
			}
			tracing::debug!(source = %ordered.name(), ?profiles, "resolved active profiles");
			return profiles;
		}
	}
	Vec::new()
}

/// Build the `%profile.key` form of a property name.
pub fn profile_key(profile: &str, key: &str, delimiter: char) -> String {
	format!("{PROFILE_PREFIX}{profile}{delimiter}{key}")
}

/// Strip a leading `%profile.` from a property name.
pub fn strip_profile_prefix(name: &str, delimiter: char) -> &str {
	if !name.starts_with(PROFILE_PREFIX) {
		return name;
	}
	let mut escaped = false;
	for (i, c) in name.char_indices().skip(1) {
		if escaped {
			escaped = false;
		} else if c == '\\' {
			escaped = true;
		} else if c == delimiter {
			let rest = &name[i + c.len_utf8()..];
			return if rest.is_empty() { name } else { rest };
		}
	}
	name
}

/// A value found during lookup together with the source that provided it.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
	pub value: &'a str,
	pub source: &'a OrderedSource,
}

impl Resolution<'_> {
	pub fn source_name(&self) -> &str {
		self.source.name()
	}

	pub fn source_ordinal(&self) -> i32 {
		self.source.ordinal
	}
}

/// The fully ordered, profile-aware list of sources used for lookups.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSourceSet {
	sources: Vec<OrderedSource>,
	profiles: Vec<String>,
	key_delimiter: char,
}

impl ResolvedSourceSet {
	/// Assemble the search order.
	///
	/// Tagged sources of each active profile come first, in profile
	/// declaration order, followed by the unconditional sources. Tagged sources
	/// of inactive profiles are left out.
	pub fn assemble(partition: SourcePartition, profiles: Vec<String>, key_delimiter: char) -> Self {
		let mut sources = Vec::with_capacity(partition.unconditional.len() + partition.tagged.len());
		for profile in &profiles {
			sources.extend(
				partition
					.tagged
					.iter()
					.filter(|s| s.profile.as_deref() == Some(profile.as_str()))
					.cloned(),
			);
		}
		sources.extend(partition.unconditional);

		ResolvedSourceSet {
			sources,
			profiles,
			key_delimiter,
		}
	}

	pub fn sources(&self) -> &[OrderedSource] {
		&self.sources
	}

	pub fn profiles(&self) -> &[String] {
		&self.profiles
	}

	pub fn key_delimiter(&self) -> char {
		self.key_delimiter
	}

	/// Look up `key` honoring profile precedence.
	///
	/// One pass per active profile, earliest declared first. Within a pass a
	/// source tagged with that profile is asked for the plain key, any other
	/// source for `%profile.key` and then the plain key. Without active
	/// profiles a single unconditional pass asks every source for the plain key.
	pub fn lookup(&self, key: &str) -> Option<Resolution<'_>> {
		for profile in &self.profiles {
			let prefixed = profile_key(profile, key, self.key_delimiter);
			for ordered in &self.sources {
				let value = if ordered.profile.as_deref() == Some(profile.as_str()) {
					ordered.source.get(key)
				} else {
					ordered
						.source
						.get(&prefixed)
						.or_else(|| ordered.source.get(key))
				};
				if let Some(value) = value {
					tracing::trace!(key, profile = %profile, source = %ordered.name(), "profile lookup hit");
					return Some(Resolution {
						value,
						source: ordered,
					});
				}
			}
		}

		self.sources.iter().find_map(|ordered| {
			ordered.source.get(key).map(|value| Resolution {
				value,
				source: ordered,
			})
		})
	}

	/// All property names, deduplicated, with profile prefixes stripped.
	pub fn property_names(&self) -> Vec<String> {
		let names: BTreeSet<&str> = self
			.sources
			.iter()
			.flat_map(|s| s.source.keys())
			.map(|k| strip_profile_prefix(k, self.key_delimiter))
			.collect();
		names.into_iter().map(str::to_string).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::{DEFAULT_ORDINAL_KEY, RawSource, SourceNaming, aggregate};

	fn resolve(sources: Vec<RawSource>) -> ResolvedSourceSet {
		let partition = aggregate(sources, &SourceNaming::default(), DEFAULT_ORDINAL_KEY);
		let profiles = resolve_active_profiles(&partition.unconditional, DEFAULT_PROFILE_KEY);
		ResolvedSourceSet::assemble(partition, profiles, '.')
	}

	#[test]
	fn test_no_profiles_when_key_absent() {
		let set = resolve(vec![RawSource::new("a", 100, [("k", "v")])]);
		assert!(set.profiles().is_empty());
	}

	#[test]
	fn test_profiles_from_highest_ordinal_source() {
		let set = resolve(vec![
			RawSource::new("low", 10, [("config.profile", "prod")]),
			RawSource::new("high", 200, [("config.profile", "dev, test")]),
		]);
		assert_eq!(set.profiles(), ["dev", "test"]);
	}

	#[test]
	fn test_blank_profile_value_is_skipped() {
		let set = resolve(vec![
			RawSource::new("low", 10, [("config.profile", "prod")]),
			RawSource::new("high", 200, [("config.profile", "  ")]),
		]);
		assert_eq!(set.profiles(), ["prod"]);
	}

	#[test]
	fn test_profile_key_in_tagged_source_is_ignored() {
		let set = resolve(vec![RawSource::new(
			"application-dev.toml",
			100,
			[("config.profile", "dev")],
		)]);
		assert!(set.profiles().is_empty());
		assert!(set.sources().is_empty());
	}

	#[test]
	fn test_higher_ordinal_wins() {
		let set = resolve(vec![
			RawSource::new("low", 100, [("k", "low")]),
			RawSource::new("high", 300, [("k", "high")]),
		]);
		let found = set.lookup("k").unwrap();
		assert_eq!(found.value, "high");
		assert_eq!(found.source_name(), "high");
		assert_eq!(found.source_ordinal(), 300);
	}

	#[test]
	fn test_missing_key() {
		let set = resolve(vec![RawSource::new("a", 100, [("k", "v")])]);
		assert!(set.lookup("other").is_none());
	}

	#[test]
	fn test_prefixed_key_overrides_within_source() {
		let set = resolve(vec![RawSource::new(
			"a",
			100,
			[("config.profile", "dev"), ("k", "plain"), ("%dev.k", "dev")],
		)]);
		assert_eq!(set.lookup("k").unwrap().value, "dev");
	}

	#[test]
	fn test_prefixed_key_of_inactive_profile_ignored() {
		let set = resolve(vec![RawSource::new(
			"a",
			100,
			[("config.profile", "dev"), ("k", "plain"), ("%prod.k", "prod")],
		)]);
		assert_eq!(set.lookup("k").unwrap().value, "plain");
	}

	#[test]
	fn test_tagged_source_searched_first() {
		let set = resolve(vec![
			RawSource::new("base", 100, [("config.profile", "dev"), ("k", "1")]),
			RawSource::new("over", 100, [("%dev.k", "2")]),
			RawSource::new("application-dev.toml", 100, [("k", "3")]),
		]);
		assert_eq!(set.sources()[0].name(), "application-dev.toml");
		assert_eq!(set.lookup("k").unwrap().value, "3");
	}

	#[test]
	fn test_unconditional_order_decides_without_tagged_source() {
		// "over" sorts before "base" on the reverse-name tie-break.
		let set = resolve(vec![
			RawSource::new("base", 100, [("config.profile", "dev"), ("k", "1")]),
			RawSource::new("over", 100, [("%dev.k", "2")]),
		]);
		assert_eq!(set.lookup("k").unwrap().value, "2");
	}

	#[test]
	fn test_earlier_profile_overrides_later() {
		let set = resolve(vec![RawSource::new(
			"a",
			100,
			[
				("config.profile", "dev,prod"),
				("%prod.k", "prod"),
				("%dev.k", "dev"),
			],
		)]);
		assert_eq!(set.lookup("k").unwrap().value, "dev");
	}

	#[test]
	fn test_later_profile_used_when_earlier_missing() {
		let set = resolve(vec![RawSource::new(
			"a",
			100,
			[("config.profile", "dev,prod"), ("%prod.k", "prod")],
		)]);
		assert_eq!(set.lookup("k").unwrap().value, "prod");
	}

	#[test]
	fn test_tagged_sources_follow_profile_order() {
		let set = resolve(vec![
			RawSource::new("base", 100, [("config.profile", "prod,dev")]),
			RawSource::new("application-dev.toml", 500, [("k", "dev")]),
			RawSource::new("application-prod.toml", 100, [("k", "prod")]),
		]);
		let order: Vec<&str> = set.sources().iter().map(OrderedSource::name).collect();
		assert_eq!(
			order,
			vec!["application-prod.toml", "application-dev.toml", "base"]
		);
		assert_eq!(set.lookup("k").unwrap().value, "prod");
	}

	#[test]
	fn test_property_names_strip_profile_prefix() {
		let set = resolve(vec![
			RawSource::new("a", 100, [("config.profile", "dev"), ("%dev.k", "1"), ("k", "2")]),
			RawSource::new("b", 50, [("%prod.other.key", "3")]),
		]);
		assert_eq!(
			set.property_names(),
			vec!["config.profile", "k", "other.key"]
		);
	}

	#[test]
	fn test_strip_profile_prefix() {
		assert_eq!(strip_profile_prefix("%dev.a.b", '.'), "a.b");
		assert_eq!(strip_profile_prefix("a.b", '.'), "a.b");
		assert_eq!(strip_profile_prefix("%dev", '.'), "%dev");
		assert_eq!(strip_profile_prefix(r"%d\.v.k", '.'), "k");
	}
}
