//! Escape-aware splitting shared by multi-valued conversion and key paths.

/// Delimiter between elements of a multi-valued property.
pub const VALUE_DELIMITER: char = ',';

/// Default delimiter between segments of a property name.
pub const DEFAULT_KEY_DELIMITER: char = '.';

/// How split segments are post-processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
	/// Trim every segment and drop the blank ones.
	Trimmed,
	/// Keep every segment exactly as written, blanks included.
	Exact,
}

/// Split a string by a delimiter, respecting backslash escapes.
///
/// An escaped delimiter (`\,`) becomes a literal delimiter inside its segment.
/// Any other backslash is kept verbatim so later passes can still see it.
pub fn split_escaped(input: &str, delimiter: char) -> Vec<String> {
	let mut parts = Vec::new();
	let mut current = String::new();
	let mut chars = input.chars().peekable();
	let mut escape_next = false;

	while let Some(c) = chars.next() {
		if escape_next {
			current.push(c);
			escape_next = false;
		} else if c == '\\' {
			if chars.peek() == Some(&delimiter) {
				escape_next = true;
			} else {
				current.push(c);
			}
		} else if c == delimiter {
			parts.push(current);
			current = String::new();
		} else {
			current.push(c);
		}
	}

	parts.push(current);
	parts
}

/// Split a multi-valued raw property on the value delimiter.
pub fn split_values(raw: &str, mode: SplitMode) -> Vec<String> {
	let parts = split_escaped(raw, VALUE_DELIMITER);
	match mode {
		SplitMode::Exact => parts,
		SplitMode::Trimmed => parts
			.into_iter()
			.map(|p| p.trim().to_string())
			.filter(|p| !p.is_empty())
			.collect(),
	}
}

/// Escape every occurrence of `delimiter` so the text survives [`split_escaped`].
pub fn escape_delimiter(segment: &str, delimiter: char) -> String {
	let mut out = String::with_capacity(segment.len());
	for c in segment.chars() {
		if c == delimiter {
			out.push('\\');
		}
		out.push(c);
	}
	out
}

/// Join list elements into the escape-aware multi-valued form.
pub fn join_values<I, S>(values: I) -> String
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	values
		.into_iter()
		.map(|v| escape_delimiter(v.as_ref(), VALUE_DELIMITER))
		.collect::<Vec<_>>()
		.join(",")
}

/// Byte index of the first `=` not preceded by a backslash.
fn unescaped_equals(segment: &str) -> Option<usize> {
	let bytes = segment.as_bytes();
	(0..bytes.len()).find(|&i| bytes[i] == b'=' && (i == 0 || bytes[i - 1] != b'\\'))
}

/// Parse a raw value into ordered key/value string pairs.
///
/// Every segment must contain an unescaped `=` past position 0 for
/// `key=value` mode. A single segment without one reverts the whole input to
/// positional mode: key, value, key, value, with an odd trailing key mapped
/// to the empty string.
pub fn parse_map_pairs(raw: &str) -> Vec<(String, String)> {
	if raw.is_empty() {
		return Vec::new();
	}

	let segments = split_values(raw, SplitMode::Exact);
	let kv_mode = segments
		.iter()
		.all(|s| matches!(unescaped_equals(s), Some(pos) if pos > 0));

	if kv_mode {
		segments
			.iter()
			.filter_map(|s| {
				let pos = unescaped_equals(s)?;
				let key = s[..pos].trim().replace("\\=", "=");
				let value = s[pos + 1..].trim().replace("\\=", "=");
				Some((key, value))
			})
			.collect()
	} else {
		segments
			.chunks(2)
			.map(|pair| {
				let key = pair[0].clone();
				let value = pair.get(1).cloned().unwrap_or_default();
				(key, value)
			})
			.collect()
	}
}
