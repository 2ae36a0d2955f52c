use super::types::{ScalarType, TypeDescriptor};
use super::value::{CustomValue, Deferred, Value};
use crate::delimiter::{SplitMode, parse_map_pairs, split_values};
use crate::error::{BoxError, ConfigError, Result};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Ordinal of the built-in scalar converters.
pub const BUILTIN_CONVERTER_ORDINAL: i32 = 1;

/// Ordinal of a discovered converter that declares none.
pub const DEFAULT_CONVERTER_ORDINAL: i32 = 100;

/// Converts a raw string into a [`Value`] of one target type.
pub trait Converter: Send + Sync {
	fn convert(&self, raw: &str) -> std::result::Result<Value, BoxError>;
}

impl<F> Converter for F
where
	F: Fn(&str) -> std::result::Result<Value, BoxError> + Send + Sync,
{
	fn convert(&self, raw: &str) -> std::result::Result<Value, BoxError> {
		self(raw)
	}
}

/// A converter registered for a target type.
#[derive(Clone)]
pub struct ConverterEntry {
	pub target: TypeDescriptor,
	pub ordinal: i32,
	builtin: bool,
	converter: Arc<dyn Converter>,
}

impl ConverterEntry {
	pub fn new<C>(target: TypeDescriptor, ordinal: i32, converter: C) -> Self
	where
		C: Converter + 'static,
	{
		ConverterEntry {
			target,
			ordinal,
			builtin: false,
			converter: Arc::new(converter),
		}
	}

	/// Entry with [`DEFAULT_CONVERTER_ORDINAL`].
	pub fn with_default_ordinal<C>(target: TypeDescriptor, converter: C) -> Self
	where
		C: Converter + 'static,
	{
		Self::new(target, DEFAULT_CONVERTER_ORDINAL, converter)
	}

	pub fn is_builtin(&self) -> bool {
		self.builtin
	}

	fn apply(&self, raw: &str) -> Result<Value> {
		self.converter
			.convert(raw)
			.map_err(|source| ConfigError::conversion(raw, &self.target, source))
	}
}

impl fmt::Debug for ConverterEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConverterEntry")
			.field("target", &self.target)
			.field("ordinal", &self.ordinal)
			.field("builtin", &self.builtin)
			.finish_non_exhaustive()
	}
}

/// How an implicit factory builds a value, in lookup preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FactoryKind {
	/// `of(String)`
	Of,
	/// `valueOf(String)`
	ValueOf,
	/// `parse(CharSequence)`, or [`FromStr`] in Rust terms
	Parse,
	/// A constructor taking a single string
	Constructor,
}

struct ImplicitFactory {
	type_name: String,
	kind: FactoryKind,
	converter: Arc<dyn Converter>,
}

/// Every factory registered for one named type, tried in [`FactoryKind`] order.
struct ImplicitFactories {
	factories: Vec<Arc<dyn Converter>>,
}

impl Converter for ImplicitFactories {
	fn convert(&self, raw: &str) -> std::result::Result<Value, BoxError> {
		let mut last_error = None;
		for factory in &self.factories {
			match factory.convert(raw) {
				Ok(value) => return Ok(value),
				Err(e) => last_error = Some(e),
			}
		}
		Err(last_error.unwrap_or_else(|| CoercionError("no factory registered".to_string()).into()))
	}
}

/// A scalar coercion that failed.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CoercionError(pub String);

fn parse_bool(raw: &str) -> std::result::Result<bool, CoercionError> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"true" | "yes" | "y" | "on" | "1" => Ok(true),
		"false" | "no" | "n" | "off" | "0" => Ok(false),
		other => Err(CoercionError(format!("'{other}' is not a boolean"))),
	}
}

/// Generic string coercion behind every built-in scalar converter.
pub fn coerce_scalar(raw: &str, scalar: ScalarType) -> std::result::Result<Value, BoxError> {
	let trimmed = raw.trim();
	let value = match scalar {
		ScalarType::String => Value::Str(raw.to_string()),
		ScalarType::Bool => Value::Bool(parse_bool(trimmed)?),
		ScalarType::I8 => Value::Int(trimmed.parse::<i8>()?.into()),
		ScalarType::I16 => Value::Int(trimmed.parse::<i16>()?.into()),
		ScalarType::I32 => Value::Int(trimmed.parse::<i32>()?.into()),
		ScalarType::I64 => Value::Int(trimmed.parse::<i64>()?),
		ScalarType::U8 => Value::UInt(trimmed.parse::<u8>()?.into()),
		ScalarType::U16 => Value::UInt(trimmed.parse::<u16>()?.into()),
		ScalarType::U32 => Value::UInt(trimmed.parse::<u32>()?.into()),
		ScalarType::U64 => Value::UInt(trimmed.parse::<u64>()?),
		ScalarType::F32 => Value::Float(trimmed.parse::<f32>()?.into()),
		ScalarType::F64 => Value::Float(trimmed.parse::<f64>()?),
		ScalarType::Char => {
			let mut chars = raw.chars();
			match (chars.next(), chars.next()) {
				(Some(c), None) => Value::Char(c),
				_ => return Err(CoercionError(format!("'{raw}' is not a single character")).into()),
			}
		}
	};
	Ok(value)
}

/// Immutable map from target type to the winning converter.
#[derive(Debug, Default)]
pub struct ConverterRegistry {
	converters: HashMap<TypeDescriptor, ConverterEntry>,
	implicit: HashMap<TypeDescriptor, ConverterEntry>,
}

impl ConverterRegistry {
	pub fn builder() -> ConverterRegistryBuilder {
		ConverterRegistryBuilder::default()
	}

	/// Registry holding only the built-in converters.
	pub fn with_builtins() -> Self {
		Self::builder().build()
	}

	/// The winning converter for an atomic type.
	pub fn entry(&self, target: &TypeDescriptor) -> Option<&ConverterEntry> {
		self.converters
			.get(target)
			.or_else(|| self.implicit.get(target))
	}

	/// Whether every atomic type inside `target` has a converter.
	pub fn supports(&self, target: &TypeDescriptor) -> bool {
		match target {
			TypeDescriptor::Scalar(_) | TypeDescriptor::Named(_) => self.entry(target).is_some(),
			TypeDescriptor::Array(e)
			| TypeDescriptor::List(e)
			| TypeDescriptor::Set(e)
			| TypeDescriptor::Optional(e)
			| TypeDescriptor::Supplier(e) => self.supports(e),
			TypeDescriptor::Map(k, v) => self.supports(k) && self.supports(v),
			TypeDescriptor::Type => true,
		}
	}
}

/// Collects built-in, discovered and implicit converters.
pub struct ConverterRegistryBuilder {
	builtins: bool,
	discovered: Vec<ConverterEntry>,
	implicit: Vec<ImplicitFactory>,
}

impl Default for ConverterRegistryBuilder {
	fn default() -> Self {
		ConverterRegistryBuilder {
			builtins: true,
			discovered: Vec::new(),
			implicit: Vec::new(),
		}
	}
}

impl ConverterRegistryBuilder {
	/// Leave out the built-in scalar converters.
	pub fn without_builtins(mut self) -> Self {
		self.builtins = false;
		self
	}

	/// Add a discovered converter. Discovery order breaks ordinal ties.
	pub fn converter(mut self, entry: ConverterEntry) -> Self {
		self.discovered.push(entry);
		self
	}

	/// Register a candidate factory for a named type.
	///
	/// Used only when no converter targets the type. Candidates are tried in
	/// [`FactoryKind`] order and the first that succeeds wins.
	pub fn implicit<F>(mut self, type_name: impl Into<String>, kind: FactoryKind, factory: F) -> Self
	where
		F: Fn(&str) -> std::result::Result<Value, BoxError> + Send + Sync + 'static,
	{
		self.implicit.push(ImplicitFactory {
			type_name: type_name.into(),
			kind,
			converter: Arc::new(factory),
		});
		self
	}

	/// Register `T`'s [`FromStr`] impl as a [`FactoryKind::Parse`] factory.
	pub fn implicit_from_str<T>(self, type_name: impl Into<String>) -> Self
	where
		T: FromStr + Any + Send + Sync,
		T::Err: std::error::Error + Send + Sync + 'static,
	{
		let type_name = type_name.into();
		let value_name = type_name.clone();
		self.implicit(type_name, FactoryKind::Parse, move |raw: &str| {
			let value = raw.parse::<T>()?;
			Ok(Value::Custom(CustomValue::new(value_name.clone(), value)))
		})
	}

	pub fn build(self) -> ConverterRegistry {
		let mut converters: HashMap<TypeDescriptor, ConverterEntry> = HashMap::new();

		if self.builtins {
			for scalar in ScalarType::ALL {
				let entry = ConverterEntry {
					target: scalar.into(),
					ordinal: BUILTIN_CONVERTER_ORDINAL,
					builtin: true,
					converter: Arc::new(move |raw: &str| coerce_scalar(raw, scalar)),
				};
				converters.insert(entry.target.clone(), entry);
			}
		}

		for entry in self.discovered {
			let replace = match converters.get(&entry.target) {
				None => true,
				Some(existing) if existing.builtin => entry.ordinal >= existing.ordinal,
				Some(existing) => entry.ordinal > existing.ordinal,
			};
			if replace {
				converters.insert(entry.target.clone(), entry);
			}
		}

		let mut candidates: HashMap<String, Vec<ImplicitFactory>> = HashMap::new();
		for factory in self.implicit {
			candidates
				.entry(factory.type_name.clone())
				.or_default()
				.push(factory);
		}
		let implicit = candidates
			.into_iter()
			.map(|(type_name, mut factories)| {
				factories.sort_by_key(|factory| factory.kind);
				let target = TypeDescriptor::Named(type_name);
				let converter = ImplicitFactories {
					factories: factories.into_iter().map(|f| f.converter).collect(),
				};
				let entry = ConverterEntry {
					target: target.clone(),
					ordinal: BUILTIN_CONVERTER_ORDINAL,
					builtin: true,
					converter: Arc::new(converter),
				};
				(target, entry)
			})
			.collect();

		tracing::debug!(converters = converters.len(), "built converter registry");
		ConverterRegistry {
			converters,
			implicit,
		}
	}
}

/// Converts raw strings into typed values, handling containers structurally.
#[derive(Debug, Clone)]
pub struct Dispatcher {
	registry: Arc<ConverterRegistry>,
}

impl Default for Dispatcher {
	fn default() -> Self {
		Dispatcher::new(Arc::new(ConverterRegistry::with_builtins()))
	}
}

impl Dispatcher {
	pub fn new(registry: Arc<ConverterRegistry>) -> Self {
		Dispatcher { registry }
	}

	pub fn registry(&self) -> &ConverterRegistry {
		&self.registry
	}

	/// Convert an optional raw value.
	///
	/// `None` stays `None`, except for optional targets, which become an empty
	/// [`Value::Optional`].
	pub fn convert(&self, raw: Option<&str>, target: &TypeDescriptor) -> Result<Option<Value>> {
		match (raw, target) {
			(None, TypeDescriptor::Optional(_)) => Ok(Some(Value::Optional(None))),
			(None, _) => Ok(None),
			(Some(raw), target) => self.convert_present(raw, target).map(Some),
		}
	}

	/// Convert a raw value that is known to be present.
	pub fn convert_present(&self, raw: &str, target: &TypeDescriptor) -> Result<Value> {
		match target {
			TypeDescriptor::Array(element) => Ok(Value::Array(self.convert_elements(raw, element)?)),
			TypeDescriptor::List(element) => Ok(Value::List(self.convert_elements(raw, element)?)),
			TypeDescriptor::Set(element) => {
				let mut distinct: Vec<Value> = Vec::new();
				for item in self.convert_elements(raw, element)? {
					if !distinct.contains(&item) {
						distinct.push(item);
					}
				}
				Ok(Value::Set(distinct))
			}
			TypeDescriptor::Map(key, value) => {
				let mut entries: Vec<(Value, Value)> = Vec::new();
				for (k, v) in parse_map_pairs(raw) {
					let k = self.convert_present(&k, key)?;
					let v = self.convert_present(&v, value)?;
					match entries.iter_mut().find(|(existing, _)| *existing == k) {
						Some(slot) => slot.1 = v,
						None => entries.push((k, v)),
					}
				}
				Ok(Value::Map(entries))
			}
			TypeDescriptor::Optional(inner) => Ok(Value::Optional(Some(Box::new(
				self.convert_present(raw, inner)?,
			)))),
			TypeDescriptor::Supplier(inner) => {
				let dispatcher = self.clone();
				let raw = raw.to_string();
				let inner_target = (**inner).clone();
				Ok(Value::Deferred(Deferred::new((**inner).clone(), move || {
					dispatcher.convert_present(&raw, &inner_target)
				})))
			}
			TypeDescriptor::Type => self.resolve_type(raw),
			TypeDescriptor::Scalar(_) | TypeDescriptor::Named(_) => match self.registry.entry(target) {
				Some(entry) => entry.apply(raw),
				None => Err(ConfigError::UnsupportedType {
					target: target.clone(),
				}),
			},
		}
	}

	fn convert_elements(&self, raw: &str, element: &TypeDescriptor) -> Result<Vec<Value>> {
		split_values(raw, SplitMode::Trimmed)
			.iter()
			.map(|item| self.convert_present(item, element))
			.collect()
	}

	fn resolve_type(&self, raw: &str) -> Result<Value> {
		let descriptor: TypeDescriptor = raw
			.trim()
			.parse()
			.map_err(|source| ConfigError::conversion(raw, &TypeDescriptor::Type, source))?;
		if !self.registry.supports(&descriptor) {
			return Err(ConfigError::conversion(
				raw,
				&TypeDescriptor::Type,
				CoercionError(format!("type '{descriptor}' has no converter")),
			));
		}
		Ok(Value::Type(descriptor))
	}
}
