//! Explicit registry of built configurations keyed by opaque handles.

use crate::config::{Config, ConfigBuilder};
use crate::error::{ConfigError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier of a registered [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigHandle(u64);

impl ConfigHandle {
	pub fn id(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ConfigHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "config#{}", self.0)
	}
}

/// Owns built configurations on behalf of a host application.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
	configs: RwLock<HashMap<ConfigHandle, Config>>,
	next_id: AtomicU64,
}

impl ConfigRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Build a configuration and register it.
	pub fn build(&self, builder: ConfigBuilder) -> Result<ConfigHandle> {
		Ok(self.register(builder.build()?))
	}

	pub fn register(&self, config: Config) -> ConfigHandle {
		let handle = ConfigHandle(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
		self.configs.write().insert(handle, config);
		tracing::debug!(%handle, "registered config");
		handle
	}

	/// A shared clone of the registered configuration.
	pub fn get(&self, handle: ConfigHandle) -> Result<Config> {
		self.configs
			.read()
			.get(&handle)
			.cloned()
			.ok_or(ConfigError::UnknownHandle { handle: handle.0 })
	}

	/// Remove a configuration. Clones handed out earlier stay usable.
	pub fn release(&self, handle: ConfigHandle) -> Result<Config> {
		let removed = self
			.configs
			.write()
			.remove(&handle)
			.ok_or(ConfigError::UnknownHandle { handle: handle.0 })?;
		tracing::debug!(%handle, "released config");
		Ok(removed)
	}

	/// Registered handles in ascending order.
	pub fn handles(&self) -> Vec<ConfigHandle> {
		let mut handles: Vec<ConfigHandle> = self.configs.read().keys().copied().collect();
		handles.sort();
		handles
	}

	pub fn len(&self) -> usize {
		self.configs.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.configs.read().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::source::RawSource;

	fn builder(value: &str) -> ConfigBuilder {
		Config::builder().source(RawSource::new("a", 100, [("k", value)]))
	}

	#[test]
	fn test_register_and_get() {
		let registry = ConfigRegistry::new();
		let first = registry.build(builder("1")).unwrap();
		let second = registry.build(builder("2")).unwrap();

		assert_ne!(first, second);
		assert_eq!(registry.get(first).unwrap().get::<i32>("k").unwrap(), 1);
		assert_eq!(registry.get(second).unwrap().get::<i32>("k").unwrap(), 2);
		assert_eq!(registry.handles(), vec![first, second]);
	}

	#[test]
	fn test_build_failure_registers_nothing() {
		let registry = ConfigRegistry::new();
		assert!(registry.build(Config::builder()).is_err());
		assert!(registry.is_empty());
	}

	#[test]
	fn test_release() {
		let registry = ConfigRegistry::new();
		let handle = registry.build(builder("1")).unwrap();
		let held = registry.get(handle).unwrap();

		registry.release(handle).unwrap();
		assert_eq!(registry.len(), 0);
		assert_eq!(held.get::<i32>("k").unwrap(), 1);

		match registry.get(handle).unwrap_err() {
			ConfigError::UnknownHandle { handle: id } => assert_eq!(id, handle.id()),
			other => panic!("Expected UnknownHandle, got {other:?}"),
		}
		assert!(registry.release(handle).is_err());
	}

	#[test]
	fn test_registered_configs_share_rebuilds() {
		let registry = ConfigRegistry::new();
		let handle = registry.build(builder("1")).unwrap();
		registry
			.get(handle)
			.unwrap()
			.rebuild(vec![RawSource::new("a", 100, [("k", "9")])]);
		assert_eq!(registry.get(handle).unwrap().get::<i32>("k").unwrap(), 9);
	}
}
