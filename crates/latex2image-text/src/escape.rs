//! Character escaping for equations.

/// Escape `%` signs that are not already escaped.
///
/// A `%` preceded by an odd run of backslashes is already `\%`; an even run
/// (including zero) leaves it as a comment marker, which gets escaped.
pub(crate) fn escape_percent(text: &str) -> String {
    if !text.contains('%') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + 4);
    let mut backslashes = 0usize;
    for c in text.chars() {
        if c == '%' && backslashes % 2 == 0 {
            out.push('\\');
        }
        out.push(c);
        backslashes = if c == '\\' { backslashes + 1 } else { 0 };
    }
    out
}

/// Escape `#` opening a brace group, as in legacy `\color{#ff0000}`.
pub(crate) fn escape_hex_colours(text: &str) -> String {
    text.replace("{#", r"{\#")
}
