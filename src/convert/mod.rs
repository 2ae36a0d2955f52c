//! Typed conversion of raw property values.
//!
//! This module handles:
//! - Type descriptors and their textual form
//! - The converter registry (built-in, discovered and implicit converters)
//! - Structural dispatch for arrays, lists, sets, maps, optionals and suppliers
//! - Mapping converted values onto Rust types

pub mod registry;
pub mod types;
pub mod value;

pub use registry::{
	BUILTIN_CONVERTER_ORDINAL, CoercionError, Converter, ConverterEntry, ConverterRegistry,
	ConverterRegistryBuilder, DEFAULT_CONVERTER_ORDINAL, Dispatcher, FactoryKind, coerce_scalar,
};
pub use types::{ScalarType, TypeDescriptor, TypeParseError};
pub use value::{CustomValue, Deferred, FromValue, Supplier, Value};
