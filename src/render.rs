// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// Text helpers shared by the panel, variable and scaffold renderers.
///
/// Every string literal emitted into Jsonnet goes through [`json_string`],
/// which produces a JSON string literal (a valid Jsonnet literal) with
/// non-ASCII characters escaped so generated files are plain ASCII.
use std::borrow::Cow;

use serde::Serialize;

use crate::error::Error;

/// Encodes `value` as a JSON string literal with ASCII-only output.
///
/// # Examples
///
/// ```
/// use grafonnet_scaffold::json_string;
///
/// assert_eq!(json_string("p99 \"latency\""), r#""p99 \"latency\"""#);
/// assert_eq!(json_string("café"), r#""caf\u00e9""#);
/// ```
pub fn json_string(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len() + 2);
    encoded.push('"');
    for character in value.chars() {
        match character {
            '"' => encoded.push_str("\\\""),
            '\\' => encoded.push_str("\\\\"),
            '\n' => encoded.push_str("\\n"),
            '\r' => encoded.push_str("\\r"),
            '\t' => encoded.push_str("\\t"),
            '\u{08}' => encoded.push_str("\\b"),
            '\u{0c}' => encoded.push_str("\\f"),
            other if other.is_ascii_control() || !other.is_ascii() => {
                push_unicode_escape(&mut encoded, other);
            }
            other => encoded.push(other)
        }
    }
    encoded.push('"');
    encoded
}

/// Encodes a list of strings as an inline JSON array, `["a", "b"]`.
pub fn json_string_list<S>(values: &[S]) -> String
where
    S: AsRef<str>
{
    let items: Vec<String> = values.iter().map(|value| json_string(value.as_ref())).collect();
    format!("[{}]", items.join(", "))
}

/// Serializes `value` as two-space indented JSON with non-ASCII escaped.
///
/// # Errors
///
/// Returns [`Error::Serialize`] when serde cannot encode the value.
pub fn to_pretty_ascii_json<T>(value: &T) -> Result<String, Error>
where
    T: Serialize + ?Sized
{
    let encoded = serde_json::to_string_pretty(value)?;
    Ok(escape_non_ascii(&encoded).into_owned())
}

/// Replaces every non-ASCII character with its `\uXXXX` escape.
///
/// Only valid on serialized JSON, where non-ASCII text can only occur inside
/// string literals.
fn escape_non_ascii(encoded: &str) -> Cow<'_, str> {
    if encoded.is_ascii() {
        return Cow::Borrowed(encoded);
    }

    let mut escaped = String::with_capacity(encoded.len() + 16);
    for character in encoded.chars() {
        if character.is_ascii() {
            escaped.push(character);
        } else {
            push_unicode_escape(&mut escaped, character);
        }
    }
    Cow::Owned(escaped)
}

fn push_unicode_escape(buffer: &mut String, character: char) {
    use std::fmt::Write as _;

    let mut units = [0u16; 2];
    for unit in character.encode_utf16(&mut units) {
        let _ = write!(buffer, "\\u{unit:04x}");
    }
}

/// Prefixes every non-empty line after the first with `width` spaces.
pub fn indent_continuation(text: &str, width: usize) -> String {
    let padding = " ".repeat(width);
    let mut lines = text.split('\n');
    let mut indented = String::with_capacity(text.len());

    if let Some(first) = lines.next() {
        indented.push_str(first);
    }
    for line in lines {
        indented.push('\n');
        if !line.is_empty() {
            indented.push_str(&padding);
        }
        indented.push_str(line);
    }
    indented
}
