//! Macro expansion for raw property values.
//!
//! Two macro forms are recognized:
//! - `${key}` / `${key:default}` variable references
//! - `#{expr}` evaluated expressions, handed to an external evaluator
//!
//! The innermost complete macro is resolved first and spliced back, so nested
//! forms like `${a.${b}}` work without a parse tree. Resolution of a looked-up
//! value happens on an explicit frame stack, which bounds the reference chain.
//! Each frame may perform at most as many substitutions as its starting text
//! has bytes, which stops splices that keep rebuilding a macro.
//!
//! A backslash before `${`, `#{`, `}` or `:` makes it literal. Escapes are
//! removed only once every substitution has completed.

use crate::error::{ConfigError, Result};
use std::ops::Range;

/// Maximum number of references that may be resolved inside one another.
pub const EXPANDED_LIMIT: usize = 16;

/// Which prefix introduced a macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
	/// `${...}`
	Variable,
	/// `#{...}`
	Evaluated,
}

/// One macro span parsed out of a raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroExpression {
	pub kind: MacroKind,
	pub key: String,
	pub default_value: Option<String>,
}

fn is_escaped(bytes: &[u8], i: usize) -> bool {
	i > 0 && bytes[i - 1] == b'\\'
}

fn is_prefix_at(bytes: &[u8], i: usize) -> bool {
	i + 1 < bytes.len() && (bytes[i] == b'$' || bytes[i] == b'#') && bytes[i + 1] == b'{'
}

/// Find the right-most macro that closes before any later prefix opens.
///
/// Returns the byte range of the whole span (prefix through `}`) and the
/// parsed expression.
pub fn find_innermost(text: &str) -> Option<(Range<usize>, MacroExpression)> {
	let bytes = text.as_bytes();
	let prefixes: Vec<usize> = (0..bytes.len())
		.filter(|&i| is_prefix_at(bytes, i) && !is_escaped(bytes, i))
		.collect();

	for (n, &start) in prefixes.iter().enumerate().rev() {
		let limit = prefixes.get(n + 1).copied().unwrap_or(bytes.len());
		let close = (start + 2..limit).find(|&i| bytes[i] == b'}' && !is_escaped(bytes, i));
		if let Some(close) = close {
			let inner = &text[start + 2..close];
			let kind = if bytes[start] == b'$' {
				MacroKind::Variable
			} else {
				MacroKind::Evaluated
			};
			return Some((start..close + 1, parse_body(kind, inner)));
		}
	}
	None
}

fn parse_body(kind: MacroKind, inner: &str) -> MacroExpression {
	if kind == MacroKind::Evaluated {
		return MacroExpression {
			kind,
			key: inner.to_string(),
			default_value: None,
		};
	}

	let bytes = inner.as_bytes();
	let separator = (0..bytes.len()).find(|&i| bytes[i] == b':' && !is_escaped(bytes, i));
	match separator {
		Some(pos) => MacroExpression {
			kind,
			key: inner[..pos].replace("\\:", ":"),
			default_value: Some(inner[pos + 1..].to_string()),
		},
		None => MacroExpression {
			kind,
			key: inner.replace("\\:", ":"),
			default_value: None,
		},
	}
}

struct Frame {
	key: String,
	text: String,
	pending: Option<Range<usize>>,
	// Substitutions performed in this frame and the most it may perform.
	// Every macro spans at least three bytes of the text the frame started
	// with, so only macros rebuilt out of spliced values can exceed the length.
	substitutions: usize,
	budget: usize,
}

impl Frame {
	fn new(key: String, text: String) -> Self {
		let budget = text.len();
		Frame {
			key,
			text,
			pending: None,
			substitutions: 0,
			budget,
		}
	}
}

fn chain_with(stack: &[Frame], key: &str) -> Vec<String> {
	stack
		.iter()
		.map(|f| f.key.clone())
		.chain(std::iter::once(key.to_string()))
		.collect()
}

/// Expand every macro in `raw`.
///
/// `lookup(evaluated, key)` supplies values: `evaluated` is `false` for
/// `${key}` and `true` for `#{expr}`. Looked-up values are expanded in turn.
/// A missing or blank value falls back to the default when one is given; a
/// missing value without a default fails with
/// [`ConfigError::UnresolvedReference`].
pub fn expand<F>(raw: &str, mut lookup: F) -> Result<String>
where
	F: FnMut(bool, &str) -> Option<String>,
{
	let mut root = Frame::new(String::new(), raw.to_string());
	// Frames of keys currently being resolved, outermost first.
	let mut stack: Vec<Frame> = Vec::new();

	loop {
		let current = stack.last().unwrap_or(&root);
		let Some((span, expr)) = find_innermost(&current.text) else {
			match stack.pop() {
				None => return Ok(unescape(&root.text)),
				Some(done) => {
					let parent = stack.last_mut().unwrap_or(&mut root);
					if let Some(range) = parent.pending.take() {
						parent.text.replace_range(range, &done.text);
					}
					continue;
				}
			}
		};

		let current = stack.last_mut().unwrap_or(&mut root);
		current.substitutions += 1;
		if current.substitutions > current.budget {
			return Err(ConfigError::ExpansionLoop {
				chain: chain_with(&stack, &expr.key),
			});
		}

		let found = lookup(expr.kind == MacroKind::Evaluated, &expr.key);
		tracing::trace!(key = %expr.key, found = found.is_some(), "expanding macro");

		match (found, expr.default_value) {
			(Some(value), Some(default)) if value.trim().is_empty() => {
				let current = stack.last_mut().unwrap_or(&mut root);
				current.text.replace_range(span, &default);
			}
			(Some(value), _) => {
				if stack.len() >= EXPANDED_LIMIT {
					return Err(ConfigError::RecursionLimit {
						limit: EXPANDED_LIMIT,
						chain: chain_with(&stack, &expr.key),
					});
				}
				let current = stack.last_mut().unwrap_or(&mut root);
				current.pending = Some(span);
				stack.push(Frame::new(expr.key, value));
			}
			(None, Some(default)) => {
				let current = stack.last_mut().unwrap_or(&mut root);
				current.text.replace_range(span, &default);
			}
			(None, None) => {
				return Err(ConfigError::UnresolvedReference {
					chain: chain_with(&stack, &expr.key),
					key: expr.key,
				});
			}
		}
	}
}

/// Remove macro escapes: `\${`, `\#{`, `\}` and `\:`.
pub fn unescape(text: &str) -> String {
	let mut out = String::with_capacity(text.len());
	let mut rest = text;
	while let Some(c) = rest.chars().next() {
		if c == '\\' {
			let after = &rest[1..];
			if after.starts_with("${") || after.starts_with("#{") {
				out.push_str(&after[..2]);
				rest = &after[2..];
				continue;
			}
			if after.starts_with('}') || after.starts_with(':') {
				out.push_str(&after[..1]);
				rest = &after[1..];
				continue;
			}
		}
		out.push(c);
		rest = &rest[c.len_utf8()..];
	}
	out
}

/// Escape macro syntax so [`expand`] returns `text` unchanged.
pub fn escape(text: &str) -> String {
	let mut out = String::with_capacity(text.len() + 8);
	let mut rest = text;
	while let Some(c) = rest.chars().next() {
		if rest.starts_with("${") || rest.starts_with("#{") || c == '}' || c == ':' {
			out.push('\\');
		}
		out.push(c);
		rest = &rest[c.len_utf8()..];
	}
	out
}
