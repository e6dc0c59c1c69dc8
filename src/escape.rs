use crate::script::Value;

/// Replaces `& < > " '` with their HTML entities in a single pass.
///
/// # Arguments
/// * `input` - Text to escape
///
/// # Returns
/// * `String` - Escaped text
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Stringifies a routine value, then escapes it.
pub fn escape_value(value: &Value) -> String {
    escape_html(&value.to_display_string())
}
