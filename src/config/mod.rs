//! The public read API over a resolved configuration snapshot.
//!
//! This module handles:
//! - Building a snapshot from raw sources (aggregation, profiles, converters)
//! - Typed and raw property reads with macro expansion
//! - Publishing rebuilt snapshots with a compare-and-set swap

pub mod types;

pub use types::{ConfigValue, DEFAULT_EXPRESSIONS_KEY, EngineOptions};

use crate::convert::{
	ConverterRegistry, Deferred, Dispatcher, FromValue, TypeDescriptor, Value,
};
use crate::error::{ConfigError, Result};
use crate::expand::expand;
use crate::profile::{ResolvedSourceSet, resolve_active_profiles};
use crate::source::{RawSource, aggregate};
use arc_swap::{ArcSwap, Guard};
use std::fmt;
use std::sync::Arc;

/// Evaluates the body of a `#{...}` macro.
pub trait ExpressionEvaluator: Send + Sync {
	fn evaluate(&self, expression: &str) -> Option<String>;
}

impl<F> ExpressionEvaluator for F
where
	F: Fn(&str) -> Option<String> + Send + Sync,
{
	fn evaluate(&self, expression: &str) -> Option<String> {
		self(expression)
	}
}

/// One immutable, fully resolved view of all sources.
#[derive(Debug)]
pub struct Snapshot {
	generation: u64,
	sources: Arc<ResolvedSourceSet>,
	dispatcher: Dispatcher,
	expressions_enabled: bool,
}

impl Snapshot {
	fn new(
		generation: u64,
		sources: Arc<ResolvedSourceSet>,
		dispatcher: Dispatcher,
		options: &EngineOptions,
	) -> Self {
		let expressions_enabled = sources
			.lookup(&options.expressions_key)
			.is_none_or(|found| !found.value.trim().eq_ignore_ascii_case("false"));
		Snapshot {
			generation,
			sources,
			dispatcher,
			expressions_enabled,
		}
	}

	/// Number of rebuilds published before this snapshot.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn sources(&self) -> &ResolvedSourceSet {
		&self.sources
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	pub fn expressions_enabled(&self) -> bool {
		self.expressions_enabled
	}
}

fn resolve_sources(sources: Vec<RawSource>, options: &EngineOptions) -> ResolvedSourceSet {
	let partition = aggregate(sources, &options.naming(), &options.ordinal_key);
	let profiles = resolve_active_profiles(&partition.unconditional, &options.profile_key);
	ResolvedSourceSet::assemble(partition, profiles, options.key_delimiter)
}

/// Collects everything needed to build a [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
	sources: Option<Vec<RawSource>>,
	options: EngineOptions,
	converters: Option<ConverterRegistry>,
	evaluator: Option<Arc<dyn ExpressionEvaluator>>,
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add one source.
	pub fn source(mut self, source: RawSource) -> Self {
		self.sources.get_or_insert_with(Vec::new).push(source);
		self
	}

	/// Add several sources. An empty iterator still counts as a source list.
	pub fn sources<I>(mut self, sources: I) -> Self
	where
		I: IntoIterator<Item = RawSource>,
	{
		self.sources.get_or_insert_with(Vec::new).extend(sources);
		self
	}

	pub fn options(mut self, options: EngineOptions) -> Self {
		self.options = options;
		self
	}

	/// Use this registry instead of the built-in converters alone.
	pub fn converters(mut self, registry: ConverterRegistry) -> Self {
		self.converters = Some(registry);
		self
	}

	/// Evaluator for `#{...}` macros. Without one they resolve only via defaults.
	pub fn evaluator<E>(mut self, evaluator: E) -> Self
	where
		E: ExpressionEvaluator + 'static,
	{
		self.evaluator = Some(Arc::new(evaluator));
		self
	}

	/// Build the first snapshot.
	///
	/// Fails with [`ConfigError::InvalidArgument`] when no source list was
	/// supplied at all.
	pub fn build(self) -> Result<Config> {
		let sources = self.sources.ok_or_else(|| ConfigError::InvalidArgument {
			message: "no source list supplied".to_string(),
		})?;
		let registry = self.converters.unwrap_or_else(ConverterRegistry::with_builtins);
		let dispatcher = Dispatcher::new(Arc::new(registry));
		let resolved = Arc::new(resolve_sources(sources, &self.options));
		let snapshot = Snapshot::new(0, resolved, dispatcher, &self.options);

		tracing::debug!(
			sources = snapshot.sources.sources().len(),
			profiles = ?snapshot.sources.profiles(),
			"built config snapshot"
		);

		Ok(Config {
			state: Arc::new(ArcSwap::from_pointee(snapshot)),
			options: Arc::new(self.options),
			evaluator: self.evaluator,
		})
	}
}

/// Read access to layered configuration.
///
/// Cloning is cheap and clones share the same snapshot cell, so a rebuild
/// through one clone is visible through all of them.
#[derive(Clone)]
pub struct Config {
	state: Arc<ArcSwap<Snapshot>>,
	options: Arc<EngineOptions>,
	evaluator: Option<Arc<dyn ExpressionEvaluator>>,
}

impl fmt::Debug for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Config")
			.field("snapshot", &self.state.load_full())
			.field("options", &self.options)
			.finish_non_exhaustive()
	}
}

impl Config {
	pub fn builder() -> ConfigBuilder {
		ConfigBuilder::new()
	}

	pub fn options(&self) -> &EngineOptions {
		&self.options
	}

	/// The snapshot currently published.
	pub fn snapshot(&self) -> Arc<Snapshot> {
		self.state.load_full()
	}

	pub fn generation(&self) -> u64 {
		self.state.load().generation
	}

	/// Active profiles, highest precedence first.
	pub fn profiles(&self) -> Vec<String> {
		self.state.load().sources.profiles().to_vec()
	}

	/// Replace the sources, keeping the current converters.
	///
	/// Returns the generation of the published snapshot.
	pub fn rebuild(&self, sources: Vec<RawSource>) -> u64 {
		self.publish(sources, None)
	}

	/// Replace both the sources and the converter registry.
	pub fn rebuild_with_converters(&self, sources: Vec<RawSource>, registry: ConverterRegistry) -> u64 {
		self.publish(sources, Some(Dispatcher::new(Arc::new(registry))))
	}

	fn publish(&self, sources: Vec<RawSource>, dispatcher: Option<Dispatcher>) -> u64 {
		let resolved = Arc::new(resolve_sources(sources, &self.options));
		let mut current = self.state.load_full();
		loop {
			let generation = current.generation + 1;
			let next = Arc::new(Snapshot::new(
				generation,
				Arc::clone(&resolved),
				dispatcher.clone().unwrap_or_else(|| current.dispatcher.clone()),
				&self.options,
			));
			let previous = self.state.compare_and_swap(&current, next);
			if Arc::ptr_eq(&previous, &current) {
				tracing::debug!(generation, "published rebuilt config snapshot");
				return generation;
			}
			current = Guard::into_inner(previous);
		}
	}

	/// Raw stored value without expansion or conversion.
	pub fn raw_value(&self, name: &str) -> Option<String> {
		self.state
			.load()
			.sources
			.lookup(name)
			.map(|found| found.value.to_string())
	}

	/// All property names, deduplicated and without profile prefixes.
	pub fn property_names(&self) -> Vec<String> {
		self.state.load().sources.property_names()
	}

	/// Expand macros in `raw` against the current snapshot.
	pub fn expand(&self, raw: &str) -> Result<String> {
		let snapshot = self.state.load();
		self.expand_in(&snapshot, raw)
	}

	fn expand_in(&self, snapshot: &Snapshot, raw: &str) -> Result<String> {
		if !snapshot.expressions_enabled {
			return Ok(raw.to_string());
		}
		expand(raw, |evaluated, key| {
			if evaluated {
				self.evaluator.as_ref().and_then(|e| e.evaluate(key))
			} else {
				snapshot
					.sources
					.lookup(key)
					.map(|found| found.value.to_string())
			}
		})
	}

	/// The expanded value of `name` with its provenance.
	pub fn config_value(&self, name: &str) -> Result<Option<ConfigValue>> {
		let snapshot = self.state.load();
		let Some(found) = snapshot.sources.lookup(name) else {
			return Ok(None);
		};
		let value = self.expand_in(&snapshot, found.value)?;
		Ok(Some(ConfigValue {
			name: name.to_string(),
			raw: found.value.to_string(),
			value,
			source_name: found.source_name().to_string(),
			source_ordinal: found.source_ordinal(),
		}))
	}

	/// Read `name` converted to `target`.
	///
	/// A missing property fails with [`ConfigError::PropertyNotFound`] unless
	/// the target is optional. Supplier targets read the property again on
	/// every call, so they observe later rebuilds.
	pub fn get_value(&self, name: &str, target: &TypeDescriptor) -> Result<Value> {
		if let TypeDescriptor::Supplier(inner) = target {
			let config = self.clone();
			let key = name.to_string();
			let inner = (**inner).clone();
			return Ok(Value::Deferred(Deferred::new(inner.clone(), move || {
				config.get_value(&key, &inner)
			})));
		}

		let snapshot = self.state.load();
		match self.read(&snapshot, name, target)? {
			Some(value) => Ok(value),
			None if matches!(target, TypeDescriptor::Optional(_)) => Ok(Value::Optional(None)),
			None => Err(ConfigError::PropertyNotFound {
				name: name.to_string(),
				known: snapshot.sources.property_names(),
			}),
		}
	}

	/// Read `name` converted to `target`, with absence as `None`.
	///
	/// Expansion and conversion failures are still errors.
	pub fn get_optional_value(&self, name: &str, target: &TypeDescriptor) -> Result<Option<Value>> {
		if matches!(target, TypeDescriptor::Supplier(_)) {
			if self.raw_value(name).is_none() {
				return Ok(None);
			}
			return self.get_value(name, target).map(Some);
		}
		let snapshot = self.state.load();
		self.read(&snapshot, name, target)
	}

	fn read(&self, snapshot: &Snapshot, name: &str, target: &TypeDescriptor) -> Result<Option<Value>> {
		let Some(found) = snapshot.sources.lookup(name) else {
			tracing::trace!(name, "property not found");
			return Ok(None);
		};
		let expanded = self.expand_in(snapshot, found.value)?;
		snapshot.dispatcher.convert(Some(&expanded), target)
	}

	/// Typed read through [`FromValue`].
	pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
		T::from_value(self.get_value(name, &T::descriptor())?)
	}

	/// Typed read with absence as `None`.
	pub fn get_optional<T: FromValue>(&self, name: &str) -> Result<Option<T>> {
		self.get_optional_value(name, &T::descriptor())?
			.map(T::from_value)
			.transpose()
	}
}
