//! HTML entity repair.
//!
//! Snippets arrive from HTML and may carry numeric (`&#8220;`, `&#x201C;`)
//! and named (`&middot;`) character references, sometimes escaped twice
//! (`&amp;#8220;`). Decoding runs until the text stops changing.

use std::sync::OnceLock;

use regex_lite::{Captures, Regex};

/// Named entities seen in authored content.
const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{00A0}'),
    ("middot", '\u{00B7}'),
    ("times", '\u{00D7}'),
    ("divide", '\u{00F7}'),
    ("deg", '\u{00B0}'),
    ("micro", '\u{00B5}'),
    ("plusmn", '\u{00B1}'),
    ("sup1", '\u{00B9}'),
    ("sup2", '\u{00B2}'),
    ("sup3", '\u{00B3}'),
    ("frac12", '\u{00BD}'),
    ("frac14", '\u{00BC}'),
    ("frac34", '\u{00BE}'),
    ("minus", '\u{2212}'),
    ("ndash", '\u{2013}'),
    ("mdash", '\u{2014}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201C}'),
    ("rdquo", '\u{201D}'),
    ("hellip", '\u{2026}'),
    ("euro", '\u{20AC}'),
    ("le", '\u{2264}'),
    ("ge", '\u{2265}'),
    ("ne", '\u{2260}'),
    ("asymp", '\u{2248}'),
    ("infin", '\u{221E}'),
    ("rarr", '\u{2192}'),
    ("larr", '\u{2190}'),
    ("harr", '\u{2194}'),
    ("alpha", '\u{03B1}'),
    ("beta", '\u{03B2}'),
    ("gamma", '\u{03B3}'),
    ("delta", '\u{03B4}'),
    ("Delta", '\u{0394}'),
    ("theta", '\u{03B8}'),
    ("lambda", '\u{03BB}'),
    ("mu", '\u{03BC}'),
    ("pi", '\u{03C0}'),
    ("sigma", '\u{03C3}'),
    ("Sigma", '\u{03A3}'),
    ("omega", '\u{03C9}'),
    ("Omega", '\u{03A9}'),
];

fn entity_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[A-Za-z][A-Za-z0-9]*);")
            .expect("entity pattern is valid")
    })
}

/// Decode numeric and named character references until a fixed point.
///
/// References that do not name a known character are left untouched. Every
/// decoded reference shrinks the text, so the loop terminates.
pub(crate) fn repair(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let decoded = decode_once(&current);
        if decoded == current {
            return current;
        }
        current = decoded;
    }
}

fn decode_once(text: &str) -> String {
    entity_pattern()
        .replace_all(text, |caps: &Captures<'_>| {
            let whole = &caps[0];
            match decode_reference(&caps[1]) {
                Some(c) => c.to_string(),
                None => whole.to_string(),
            }
        })
        .into_owned()
}

fn decode_reference(body: &str) -> Option<char> {
    if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = body.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32);
    }
    NAMED_ENTITIES
        .iter()
        .find(|(name, _)| *name == body)
        .map(|(_, c)| *c)
}

/// Put a space in front of every unescaped `&` column separator that does
/// not already follow whitespace.
pub(crate) fn space_column_separators(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut backslashes = 0usize;
    let mut prev: Option<char> = None;

    for c in text.chars() {
        if c == '&' && backslashes % 2 == 0 {
            if let Some(p) = prev {
                if !p.is_whitespace() {
                    out.push(' ');
                }
            }
        }
        out.push(c);
        backslashes = if c == '\\' { backslashes + 1 } else { 0 };
        prev = Some(c);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_quotes_decoded() {
        assert_eq!(repair(r"\(&#8220;text&#8221;\)"), "\\(\u{201C}text\u{201D}\\)");
    }

    #[test]
    fn test_hex_reference_decoded() {
        assert_eq!(repair("&#x3bc;"), "\u{03BC}");
        assert_eq!(repair("&#X3BC;"), "\u{03BC}");
    }

    #[test]
    fn test_named_entities_decoded() {
        assert_eq!(repair(r"\(5 &middot; 6\)"), "\\(5 \u{00B7} 6\\)");
        assert_eq!(repair("a &lt; b &gt; c"), "a < b > c");
    }

    #[test]
    fn test_double_escaped_reference_converges() {
        assert_eq!(repair("&amp;#181;"), "\u{00B5}");
    }

    #[test]
    fn test_ampersand_column_separator_unescaped() {
        assert_eq!(repair("5x &amp; = 5y"), "5x & = 5y");
    }

    #[test]
    fn test_unknown_entity_left_alone() {
        assert_eq!(repair("&bogus; &#xZZ;"), "&bogus; &#xZZ;");
    }

    #[test]
    fn test_invalid_codepoint_left_alone() {
        assert_eq!(repair("&#55296;"), "&#55296;");
        assert_eq!(repair("&#99999999999;"), "&#99999999999;");
    }

    #[test]
    fn test_deeply_escaped_reference_fully_decoded() {
        assert_eq!(repair("x&amp;amp;amp;amp;amp;lt;y"), "x<y");
        let nested = format!("{}lt;", "&amp;".repeat(12));
        assert_eq!(repair(&nested), "<");
    }

    #[test]
    fn test_repair_is_idempotent() {
        let once = repair("&amp;amp;lt; &#8220;");
        assert_eq!(repair(&once), once);
    }

    #[test]
    fn test_space_inserted_before_separator() {
        assert_eq!(space_column_separators("a&=b&c"), "a &=b &c");
    }

    #[test]
    fn test_escaped_ampersand_untouched() {
        assert_eq!(space_column_separators(r"R\&D"), r"R\&D");
    }

    #[test]
    fn test_separator_after_line_break_spaced() {
        assert_eq!(space_column_separators(r"a \\& b"), r"a \\ & b");
    }

    #[test]
    fn test_spacing_is_idempotent() {
        let once = space_column_separators("&a&&b");
        assert_eq!(once, "&a & &b");
        assert_eq!(space_column_separators(&once), once);
    }
}
