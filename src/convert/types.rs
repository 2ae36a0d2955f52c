use std::fmt;
use std::str::FromStr;

/// Atomic types with built-in converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
	String,
	Bool,
	I8,
	I16,
	I32,
	I64,
	U8,
	U16,
	U32,
	U64,
	F32,
	F64,
	Char,
}

impl ScalarType {
	pub const ALL: [ScalarType; 13] = [
		ScalarType::String,
		ScalarType::Bool,
		ScalarType::I8,
		ScalarType::I16,
		ScalarType::I32,
		ScalarType::I64,
		ScalarType::U8,
		ScalarType::U16,
		ScalarType::U32,
		ScalarType::U64,
		ScalarType::F32,
		ScalarType::F64,
		ScalarType::Char,
	];

	pub fn name(self) -> &'static str {
		match self {
			ScalarType::String => "string",
			ScalarType::Bool => "bool",
			ScalarType::I8 => "i8",
			ScalarType::I16 => "i16",
			ScalarType::I32 => "i32",
			ScalarType::I64 => "i64",
			ScalarType::U8 => "u8",
			ScalarType::U16 => "u16",
			ScalarType::U32 => "u32",
			ScalarType::U64 => "u64",
			ScalarType::F32 => "f32",
			ScalarType::F64 => "f64",
			ScalarType::Char => "char",
		}
	}

	fn from_name(name: &str) -> Option<Self> {
		let scalar = match name {
			"string" | "str" | "String" => ScalarType::String,
			"bool" | "boolean" => ScalarType::Bool,
			"char" => ScalarType::Char,
			other => return ScalarType::ALL.into_iter().find(|s| s.name() == other),
		};
		Some(scalar)
	}
}

/// Describes the target of a conversion.
///
/// Textual form: `string`, `bool`, `i8`..`u64`, `f32`, `f64`, `char`,
/// `T[]` or `array<T>`, `list<T>`, `set<T>`, `map<K, V>`, `option<T>`,
/// `supplier<T>`, `type`, or the name of a registered custom type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
	Scalar(ScalarType),
	/// A custom type identified by name.
	Named(String),
	Array(Box<TypeDescriptor>),
	List(Box<TypeDescriptor>),
	Set(Box<TypeDescriptor>),
	Map(Box<TypeDescriptor>, Box<TypeDescriptor>),
	Optional(Box<TypeDescriptor>),
	/// Converted again on every call instead of once.
	Supplier(Box<TypeDescriptor>),
	/// A type name resolved to a descriptor.
	Type,
}

impl TypeDescriptor {
	pub fn named(name: impl Into<String>) -> Self {
		TypeDescriptor::Named(name.into())
	}

	pub fn array(element: TypeDescriptor) -> Self {
		TypeDescriptor::Array(Box::new(element))
	}

	pub fn list(element: TypeDescriptor) -> Self {
		TypeDescriptor::List(Box::new(element))
	}

	pub fn set(element: TypeDescriptor) -> Self {
		TypeDescriptor::Set(Box::new(element))
	}

	pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
		TypeDescriptor::Map(Box::new(key), Box::new(value))
	}

	pub fn optional(inner: TypeDescriptor) -> Self {
		TypeDescriptor::Optional(Box::new(inner))
	}

	pub fn supplier(inner: TypeDescriptor) -> Self {
		TypeDescriptor::Supplier(Box::new(inner))
	}
}

impl From<ScalarType> for TypeDescriptor {
	fn from(scalar: ScalarType) -> Self {
		TypeDescriptor::Scalar(scalar)
	}
}

impl fmt::Display for TypeDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TypeDescriptor::Scalar(s) => f.write_str(s.name()),
			TypeDescriptor::Named(name) => f.write_str(name),
			TypeDescriptor::Array(e) => write!(f, "{e}[]"),
			TypeDescriptor::List(e) => write!(f, "list<{e}>"),
			TypeDescriptor::Set(e) => write!(f, "set<{e}>"),
			TypeDescriptor::Map(k, v) => write!(f, "map<{k}, {v}>"),
			TypeDescriptor::Optional(e) => write!(f, "option<{e}>"),
			TypeDescriptor::Supplier(e) => write!(f, "supplier<{e}>"),
			TypeDescriptor::Type => f.write_str("type"),
		}
	}
}

/// A type name that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type name '{input}': {reason}")]
pub struct TypeParseError {
	pub input: String,
	pub reason: String,
}

impl FromStr for TypeDescriptor {
	type Err = TypeParseError;

	fn from_str(input: &str) -> Result<Self, Self::Err> {
		let mut parser = TypeParser {
			input,
			chars: input.char_indices().peekable(),
		};
		let descriptor = parser.parse_type()?;
		parser.skip_whitespace();
		match parser.chars.next() {
			None => Ok(descriptor),
			Some((_, c)) => Err(parser.error(format!("unexpected '{c}'"))),
		}
	}
}

struct TypeParser<'a> {
	input: &'a str,
	chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl TypeParser<'_> {
	fn error(&self, reason: impl Into<String>) -> TypeParseError {
		TypeParseError {
			input: self.input.to_string(),
			reason: reason.into(),
		}
	}

	fn skip_whitespace(&mut self) {
		while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
	}

	fn expect(&mut self, expected: char) -> Result<(), TypeParseError> {
		self.skip_whitespace();
		match self.chars.next() {
			Some((_, c)) if c == expected => Ok(()),
			Some((_, c)) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
			None => Err(self.error(format!("expected '{expected}'"))),
		}
	}

	fn ident(&mut self) -> Result<String, TypeParseError> {
		self.skip_whitespace();
		let mut name = String::new();
		while let Some((_, c)) = self
			.chars
			.next_if(|(_, c)| c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '-' | '$'))
		{
			name.push(c);
		}
		if name.is_empty() {
			Err(self.error("expected a type name"))
		} else {
			Ok(name)
		}
	}

	fn parse_type(&mut self) -> Result<TypeDescriptor, TypeParseError> {
		let mut descriptor = self.parse_base()?;
		loop {
			self.skip_whitespace();
			if self.chars.next_if(|(_, c)| *c == '[').is_none() {
				return Ok(descriptor);
			}
			self.expect(']')?;
			descriptor = TypeDescriptor::array(descriptor);
		}
	}

	fn parse_base(&mut self) -> Result<TypeDescriptor, TypeParseError> {
		let name = self.ident()?;
		self.skip_whitespace();
		let has_args = self.chars.next_if(|(_, c)| *c == '<').is_some();

		if !has_args {
			return Ok(match name.as_str() {
				"type" | "class" => TypeDescriptor::Type,
				other => match ScalarType::from_name(other) {
					Some(scalar) => TypeDescriptor::Scalar(scalar),
					None => TypeDescriptor::Named(name),
				},
			});
		}

		let first = self.parse_type()?;
		let descriptor = match name.as_str() {
			"map" => {
				self.expect(',')?;
				let value = self.parse_type()?;
				TypeDescriptor::map(first, value)
			}
			"array" => TypeDescriptor::array(first),
			"list" | "vec" => TypeDescriptor::list(first),
			"set" => TypeDescriptor::set(first),
			"option" | "optional" => TypeDescriptor::optional(first),
			"supplier" => TypeDescriptor::supplier(first),
			other => return Err(self.error(format!("'{other}' takes no type arguments"))),
		};
		self.expect('>')?;
		Ok(descriptor)
	}
}
