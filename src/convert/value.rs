use super::types::{ScalarType, TypeDescriptor};
use crate::error::{ConfigError, Result};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

/// A converted configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Str(String),
	Bool(bool),
	Int(i64),
	UInt(u64),
	Float(f64),
	Char(char),
	Custom(CustomValue),
	Array(Vec<Value>),
	List(Vec<Value>),
	/// Distinct elements in first-seen order.
	Set(Vec<Value>),
	/// Key/value pairs in first-seen key order.
	Map(Vec<(Value, Value)>),
	Optional(Option<Box<Value>>),
	Type(TypeDescriptor),
	Deferred(Deferred),
}

impl Value {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Int(v) => Some(*v),
			Value::UInt(v) => i64::try_from(*v).ok(),
			_ => None,
		}
	}

	pub fn as_u64(&self) -> Option<u64> {
		match self {
			Value::UInt(v) => Some(*v),
			Value::Int(v) => u64::try_from(*v).ok(),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Float(v) => Some(*v),
			_ => None,
		}
	}

	/// Elements of an array, list or set.
	pub fn as_slice(&self) -> Option<&[Value]> {
		match self {
			Value::Array(items) | Value::List(items) | Value::Set(items) => Some(items),
			_ => None,
		}
	}

	pub fn as_map(&self) -> Option<&[(Value, Value)]> {
		match self {
			Value::Map(pairs) => Some(pairs),
			_ => None,
		}
	}

	/// Borrow the payload of a custom value.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		match self {
			Value::Custom(custom) => custom.downcast_ref(),
			_ => None,
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fn join(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
			for (i, item) in items.iter().enumerate() {
				if i > 0 {
					f.write_str(", ")?;
				}
				write!(f, "{item}")?;
			}
			Ok(())
		}

		match self {
			Value::Str(s) => f.write_str(s),
			Value::Bool(b) => write!(f, "{b}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::UInt(v) => write!(f, "{v}"),
			Value::Float(v) => write!(f, "{v}"),
			Value::Char(c) => write!(f, "{c}"),
			Value::Custom(c) => write!(f, "<{}>", c.type_name()),
			Value::Array(items) | Value::List(items) => {
				f.write_str("[")?;
				join(f, items)?;
				f.write_str("]")
			}
			Value::Set(items) => {
				f.write_str("{")?;
				join(f, items)?;
				f.write_str("}")
			}
			Value::Map(pairs) => {
				f.write_str("{")?;
				for (i, (k, v)) in pairs.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{k}: {v}")?;
				}
				f.write_str("}")
			}
			Value::Optional(Some(inner)) => write!(f, "Some({inner})"),
			Value::Optional(None) => f.write_str("None"),
			Value::Type(t) => write!(f, "{t}"),
			Value::Deferred(d) => write!(f, "<supplier of {}>", d.target()),
		}
	}
}

/// Payload produced by a custom converter.
#[derive(Clone)]
pub struct CustomValue {
	type_name: String,
	value: Arc<dyn Any + Send + Sync>,
}

impl CustomValue {
	pub fn new<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
		CustomValue {
			type_name: type_name.into(),
			value: Arc::new(value),
		}
	}

	pub fn type_name(&self) -> &str {
		&self.type_name
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.value.downcast_ref()
	}
}

impl fmt::Debug for CustomValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CustomValue")
			.field("type_name", &self.type_name)
			.finish_non_exhaustive()
	}
}

impl PartialEq for CustomValue {
	fn eq(&self, other: &Self) -> bool {
		self.type_name == other.type_name && Arc::ptr_eq(&self.value, &other.value)
	}
}

type Resolve = dyn Fn() -> Result<Value> + Send + Sync;

/// A conversion performed again on every [`Deferred::get`].
#[derive(Clone)]
pub struct Deferred {
	target: TypeDescriptor,
	resolve: Arc<Resolve>,
}

impl Deferred {
	pub fn new<F>(target: TypeDescriptor, resolve: F) -> Self
	where
		F: Fn() -> Result<Value> + Send + Sync + 'static,
	{
		Deferred {
			target,
			resolve: Arc::new(resolve),
		}
	}

	pub fn target(&self) -> &TypeDescriptor {
		&self.target
	}

	pub fn get(&self) -> Result<Value> {
		(self.resolve)()
	}
}

impl fmt::Debug for Deferred {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Deferred")
			.field("target", &self.target)
			.finish_non_exhaustive()
	}
}

impl PartialEq for Deferred {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.resolve, &other.resolve)
	}
}

/// Rust types that can be produced from a converted [`Value`].
pub trait FromValue: Sized {
	/// Descriptor the dispatcher converts to before calling [`from_value`](Self::from_value).
	fn descriptor() -> TypeDescriptor;

	fn from_value(value: Value) -> Result<Self>;
}

#[derive(Debug, thiserror::Error)]
#[error("value {found} does not fit the requested type")]
struct ValueMismatch {
	found: String,
}

fn mismatch<T: FromValue>(value: Value) -> ConfigError {
	let found = value.to_string();
	ConfigError::conversion(found.clone(), &T::descriptor(), ValueMismatch { found })
}

impl FromValue for String {
	fn descriptor() -> TypeDescriptor {
		ScalarType::String.into()
	}

	fn from_value(value: Value) -> Result<Self> {
		match value {
			Value::Str(s) => Ok(s),
			other => Err(mismatch::<Self>(other)),
		}
	}
}

impl FromValue for bool {
	fn descriptor() -> TypeDescriptor {
		ScalarType::Bool.into()
	}

	fn from_value(value: Value) -> Result<Self> {
		match value {
			Value::Bool(b) => Ok(b),
			other => Err(mismatch::<Self>(other)),
		}
	}
}

impl FromValue for char {
	fn descriptor() -> TypeDescriptor {
		ScalarType::Char.into()
	}

	fn from_value(value: Value) -> Result<Self> {
		match value {
			Value::Char(c) => Ok(c),
			other => Err(mismatch::<Self>(other)),
		}
	}
}

macro_rules! integer_from_value {
	($($ty:ty => $scalar:ident, $variant:ident;)*) => {
		$(
			impl FromValue for $ty {
				fn descriptor() -> TypeDescriptor {
					ScalarType::$scalar.into()
				}

				fn from_value(value: Value) -> Result<Self> {
					match value {
						Value::$variant(v) => <$ty>::try_from(v).map_err(|source| {
							ConfigError::conversion(v.to_string(), &Self::descriptor(), source)
						}),
						other => Err(mismatch::<Self>(other)),
					}
				}
			}
		)*
	};
}

integer_from_value! {
	i8 => I8, Int;
	i16 => I16, Int;
	i32 => I32, Int;
	i64 => I64, Int;
	u8 => U8, UInt;
	u16 => U16, UInt;
	u32 => U32, UInt;
	u64 => U64, UInt;
}

impl FromValue for f64 {
	fn descriptor() -> TypeDescriptor {
		ScalarType::F64.into()
	}

	fn from_value(value: Value) -> Result<Self> {
		match value {
			Value::Float(v) => Ok(v),
			other => Err(mismatch::<Self>(other)),
		}
	}
}

impl FromValue for f32 {
	fn descriptor() -> TypeDescriptor {
		ScalarType::F32.into()
	}

	fn from_value(value: Value) -> Result<Self> {
		match value {
			Value::Float(v) => Ok(v as f32),
			other => Err(mismatch::<Self>(other)),
		}
	}
}

impl FromValue for TypeDescriptor {
	fn descriptor() -> TypeDescriptor {
		TypeDescriptor::Type
	}

	fn from_value(value: Value) -> Result<Self> {
		match value {
			Value::Type(t) => Ok(t),
			other => Err(mismatch::<Self>(other)),
		}
	}
}

fn elements<T: FromValue>(value: Value) -> Result<Vec<Value>> {
	match value {
		Value::Array(items) | Value::List(items) | Value::Set(items) => Ok(items),
		other => Err(mismatch::<T>(other)),
	}
}

impl<T: FromValue> FromValue for Vec<T> {
	fn descriptor() -> TypeDescriptor {
		TypeDescriptor::list(T::descriptor())
	}

	fn from_value(value: Value) -> Result<Self> {
		elements::<Self>(value)?
			.into_iter()
			.map(T::from_value)
			.collect()
	}
}

impl<T: FromValue> FromValue for Box<[T]> {
	fn descriptor() -> TypeDescriptor {
		TypeDescriptor::array(T::descriptor())
	}

	fn from_value(value: Value) -> Result<Self> {
		Vec::<T>::from_value(value).map(Vec::into_boxed_slice)
	}
}

impl<T: FromValue + Ord> FromValue for BTreeSet<T> {
	fn descriptor() -> TypeDescriptor {
		TypeDescriptor::set(T::descriptor())
	}

	fn from_value(value: Value) -> Result<Self> {
		elements::<Self>(value)?
			.into_iter()
			.map(T::from_value)
			.collect()
	}
}

impl<T: FromValue + Eq + Hash> FromValue for HashSet<T> {
	fn descriptor() -> TypeDescriptor {
		TypeDescriptor::set(T::descriptor())
	}

	fn from_value(value: Value) -> Result<Self> {
		elements::<Self>(value)?
			.into_iter()
			.map(T::from_value)
			.collect()
	}
}

fn pairs<M: FromValue, K: FromValue, V: FromValue>(
	value: Value,
) -> Result<impl Iterator<Item = Result<(K, V)>>> {
	match value {
		Value::Map(pairs) => Ok(pairs
			.into_iter()
			.map(|(k, v)| -> Result<(K, V)> { Ok((K::from_value(k)?, V::from_value(v)?)) })),
		other => Err(mismatch::<M>(other)),
	}
}

impl<K: FromValue + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
	fn descriptor() -> TypeDescriptor {
		TypeDescriptor::map(K::descriptor(), V::descriptor())
	}

	fn from_value(value: Value) -> Result<Self> {
		pairs::<Self, K, V>(value)?.collect()
	}
}

impl<K: FromValue + Eq + Hash, V: FromValue> FromValue for HashMap<K, V> {
	fn descriptor() -> TypeDescriptor {
		TypeDescriptor::map(K::descriptor(), V::descriptor())
	}

	fn from_value(value: Value) -> Result<Self> {
		pairs::<Self, K, V>(value)?.collect()
	}
}

impl<T: FromValue> FromValue for Option<T> {
	fn descriptor() -> TypeDescriptor {
		TypeDescriptor::optional(T::descriptor())
	}

	fn from_value(value: Value) -> Result<Self> {
		match value {
			Value::Optional(inner) => inner.map(|v| T::from_value(*v)).transpose(),
			other => Err(mismatch::<Self>(other)),
		}
	}
}

/// Typed handle over a [`Deferred`] conversion.
#[derive(Debug, Clone)]
pub struct Supplier<T> {
	deferred: Deferred,
	_marker: PhantomData<fn() -> T>,
}

impl<T: FromValue> Supplier<T> {
	/// Convert the current value.
	pub fn get(&self) -> Result<T> {
		T::from_value(self.deferred.get()?)
	}
}

impl<T: FromValue> FromValue for Supplier<T> {
	fn descriptor() -> TypeDescriptor {
		TypeDescriptor::supplier(T::descriptor())
	}

	fn from_value(value: Value) -> Result<Self> {
		match value {
			Value::Deferred(deferred) => Ok(Supplier {
				deferred,
				_marker: PhantomData,
			}),
			other => Err(mismatch::<Self>(other)),
		}
	}
}
