//! Pattern-based string expansion.
//!
//! Supports placeholders:
//! - `{index}` - zero-based row index
//! - `{row}` - one-based row number (`index + 1`)
//! - `{index:0N}` / `{row:0N}` - the same, zero-padded to N digits
//! - `{value}` - the column's default value (mutations only)
//!
//! Unknown or malformed placeholders are copied through unchanged.

use fixture_core::FixtureValue;

/// Expand `pattern` for the given row index.
///
/// `value` is the column's pristine default, substituted for `{value}` when
/// present.
pub fn expand_pattern(pattern: &str, index: u64, value: Option<&FixtureValue>) -> String {
    let mut result = String::with_capacity(pattern.len() + 8);
    let mut rest = pattern;

    while let Some(start) = rest.find('{') {
        result.push_str(&rest[..start]);
        let tail = &rest[start..];

        let Some(end) = tail.find('}') else {
            result.push_str(tail);
            return result;
        };

        match render_placeholder(&tail[1..end], index, value) {
            Some(text) => result.push_str(&text),
            None => result.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }

    result.push_str(rest);
    result
}

fn render_placeholder(token: &str, index: u64, value: Option<&FixtureValue>) -> Option<String> {
    let (name, width) = match token.split_once(':') {
        Some((name, width)) => (name, Some(width.parse::<usize>().ok()?)),
        None => (token, None),
    };

    let number = match name {
        "index" => index,
        "row" => index + 1,
        "value" if width.is_none() => return value.map(FixtureValue::to_text),
        _ => return None,
    };

    Some(match width {
        Some(width) => format!("{number:0width$}"),
        None => number.to_string(),
    })
}
