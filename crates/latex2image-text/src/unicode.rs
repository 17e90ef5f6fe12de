//! Unicode to LaTeX substitution for equations.
//!
//! Substitutions run as ordered passes. Compound sequences go first so that
//! a superscript minus-one is rewritten whole instead of being split by the
//! single-character rules for superscript minus and superscript one.

/// Multi-character sequences.
const COMPOUND: &[(&str, &str)] = &[
    ("\u{207B}\u{00B9}", "^{-1}"),
    ("\u{207B}\u{00B2}", "^{-2}"),
    ("\u{207B}\u{00B3}", "^{-3}"),
    ("\u{2103}", r"^{\circ}C"),
];

/// Single characters.
const SINGLE: &[(&str, &str)] = &[
    ("\u{2212}", "-"),
    ("\u{00D7}", r"\times"),
    ("\u{00A0}", " "),
    ("\u{03A9}", r"\ensuremath{\Omega}"),
    ("\u{00B0}", r"\text{$^\circ$}"),
    ("\u{20AC}", r"\euro{}"),
    ("\u{00B7}", r"\ensuremath{\cdot}"),
    ("\u{207B}", "^{-}"),
    ("\u{00B9}", "^{1}"),
    ("\u{00B2}", "^{2}"),
    ("\u{00B3}", "^{3}"),
    ("\u{00B5}", r"\ensuremath{\mu}"),
    ("\u{03BC}", r"\ensuremath{\mu}"),
    ("\u{201C}", "``"),
    ("\u{201D}", "''"),
    ("\u{2018}", "`"),
    ("\u{2019}", "'"),
];

/// Passes in application order.
pub const SUBSTITUTION_PASSES: &[&[(&str, &str)]] = &[COMPOUND, SINGLE];

/// Apply every substitution pass in order.
pub fn replace_symbols(text: &str) -> String {
    let mut out = text.to_string();
    for pass in SUBSTITUTION_PASSES {
        for (from, to) in pass.iter() {
            if out.contains(from) {
                out = out.replace(from, to);
            }
        }
    }
    out
}
