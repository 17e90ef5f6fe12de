//! Normalization and fingerprinting of LaTeX snippets.
//!
//! Snippets lifted out of HTML documents are rewritten into compiler-ready
//! LaTeX by a fixed sequence of passes, then hashed to form the render cache
//! key. Passes run in this order:
//!
//! 1. Delimiter canonicalization (equations)
//! 2. Entity repair, plus column separator spacing for equations
//! 3. Unicode to LaTeX substitution (equations)
//! 4. `%` and `{#` escaping (equations)
//! 5. Tab, blank line and comment line removal
//! 6. Nested inline math repair
//!
//! Every pass is idempotent, so normalizing already-normalized text is a
//! no-op. This crate does no I/O.

mod delimiters;
mod entities;
mod escape;
mod fingerprint;
mod kind;
mod lines;
mod math;
mod unicode;

pub use fingerprint::{fingerprint, fingerprint_str, Fingerprint, FingerprintError};
pub use kind::{PictureKind, UnknownKindError};
pub use unicode::{replace_symbols, SUBSTITUTION_PASSES};

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors from normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// Nothing renderable remains once dead lines and delimiters are removed.
    #[error("{kind} source is empty after normalization")]
    EmptySource { kind: PictureKind },
}

/// LaTeX text that has been through [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NormalizedSource(String);

impl NormalizedSource {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedSource {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw snippet for the given kind.
pub fn normalize(kind: PictureKind, raw: &str) -> Result<NormalizedSource, NormalizeError> {
    let is_equation = kind == PictureKind::Equation;

    let mut text = raw.trim().to_string();
    if is_equation {
        text = delimiters::canonicalize(&text);
    }

    text = entities::repair(&text);
    if is_equation {
        text = entities::space_column_separators(&text);
        text = unicode::replace_symbols(&text);
        text = escape::escape_percent(&text);
        text = escape::escape_hex_colours(&text);
    }

    text = lines::clean(&text);
    text = math::strip_nested_delimiters(&text);

    let content = if is_equation {
        delimiters::inner_content(&text)
    } else {
        text.as_str()
    };
    if content.is_empty() {
        return Err(NormalizeError::EmptySource { kind });
    }

    Ok(NormalizedSource(text))
}

/// Normalize and fingerprint in one step.
pub fn normalize_and_fingerprint(
    kind: PictureKind,
    raw: &str,
) -> Result<(NormalizedSource, Fingerprint), NormalizeError> {
    let source = normalize(kind, raw)?;
    let fp = fingerprint(&source);
    Ok((source, fp))
}
