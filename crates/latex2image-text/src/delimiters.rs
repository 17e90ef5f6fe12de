//! Math delimiter canonicalization for equations.
//!
//! Equations are typeset inline (`\( … \)`), which copes with blank lines
//! and line breaks better than display math. Align blocks are the exception:
//! `align` is itself a top-level math environment and must not be wrapped.

const INLINE_OPEN: &str = r"\(";
const INLINE_CLOSE: &str = r"\)";
const DISPLAY_OPEN: &str = r"\[";
const DISPLAY_CLOSE: &str = r"\]";

/// Canonicalize the outer delimiters of an equation snippet.
pub(crate) fn canonicalize(text: &str) -> String {
    let mut text = text.trim().to_string();

    if let Some(inner) = text
        .strip_prefix(DISPLAY_OPEN)
        .and_then(|rest| rest.strip_suffix(DISPLAY_CLOSE))
    {
        text = format!("{INLINE_OPEN}{inner}{INLINE_CLOSE}");
    }

    if text.contains(r"\begin{aligned}") {
        text = text
            .replace(r"\begin{aligned}", r"\begin{align}")
            .replace(r"\end{aligned}", r"\end{align}");
    }

    if is_align_block(&text) {
        if let Some(rest) = text.strip_prefix(INLINE_OPEN) {
            text = rest.trim_start().to_string();
        }
        if let Some(rest) = text.strip_suffix(INLINE_CLOSE) {
            text = rest.trim_end().to_string();
        }
        return text;
    }

    if !has_math_delimiters(&text) {
        text = format!("{INLINE_OPEN}{text}{INLINE_CLOSE}");
    }

    text
}

/// True if the snippet contains an `align` or `align*` environment.
pub(crate) fn is_align_block(text: &str) -> bool {
    text.contains("{align}") || text.contains("{align*}")
}

fn has_math_delimiters(text: &str) -> bool {
    text.contains(INLINE_OPEN) || text.contains(DISPLAY_OPEN) || text.contains('$')
}

/// The equation body with its outer inline delimiters removed.
pub(crate) fn inner_content(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix(INLINE_OPEN).unwrap_or(text);
    let text = text.strip_suffix(INLINE_CLOSE).unwrap_or(text);
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_becomes_inline() {
        assert_eq!(canonicalize(r"\[ x \]"), r"\( x \)");
    }

    #[test]
    fn test_inline_left_alone() {
        assert_eq!(canonicalize(r"\(5x + y\)"), r"\(5x + y\)");
    }

    #[test]
    fn test_row_spacing_not_treated_as_delimiter() {
        let input = "\\[\\begin{array}{rcc}\n5x & = 5y \\\\[2pt]\n& = 7\n\\end{array}\n\\]";
        let output = canonicalize(input);
        assert!(output.starts_with(r"\(\begin{array}"));
        assert!(output.contains(r"\\[2pt]"));
        assert!(output.ends_with(r"\)"));
    }

    #[test]
    fn test_aligned_becomes_align_without_delimiters() {
        let input = "\\[\\begin{aligned}\na & = b\n\\end{aligned}\n\\]";
        assert_eq!(canonicalize(input), "\\begin{align}\na & = b\n\\end{align}");
    }

    #[test]
    fn test_align_star_loses_inline_delimiters() {
        let input = r"\(\begin{align*} a &= b \end{align*}\)";
        assert_eq!(canonicalize(input), r"\begin{align*} a &= b \end{align*}");
    }

    #[test]
    fn test_bare_math_is_wrapped() {
        assert_eq!(canonicalize("x^2 + 1"), r"\(x^2 + 1\)");
    }

    #[test]
    fn test_dollar_math_is_not_wrapped() {
        assert_eq!(canonicalize("$x$"), "$x$");
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        for input in [
            r"\[ x \]",
            "\\[\\begin{aligned}\na & = b\n\\end{aligned}\n\\]",
            "x^2",
            "$x$ and $y$",
        ] {
            let once = canonicalize(input);
            assert_eq!(canonicalize(&once), once, "input: {input}");
        }
    }

    #[test]
    fn test_inner_content() {
        assert_eq!(inner_content(r"\( x \)"), "x");
        assert_eq!(inner_content(r"\(\)"), "");
        assert_eq!(inner_content(r"\begin{align}a\end{align}"), r"\begin{align}a\end{align}");
    }
}
