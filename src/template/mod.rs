//! Document templates
//!
//! Each picture kind has a complete LaTeX document with a single `__CODE__`
//! placeholder. Binding replaces that placeholder with the trimmed normalized
//! source; nothing else in the template is interpreted.
//!
//! Built-in templates are compiled into the binary. A directory holding
//! `<kind>.tex` files can override any of them.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use latex2image_text::{NormalizedSource, PictureKind};
use thiserror::Error;

use crate::error::{RenderError, RenderResult};

/// Substitution point in every template.
pub const PLACEHOLDER: &str = "__CODE__";

const EQUATION_TEMPLATE: &str = include_str!("equation.tex");
const PSPICTURE_TEMPLATE: &str = include_str!("pspicture.tex");
const TIKZPICTURE_TEMPLATE: &str = include_str!("tikzpicture.tex");

/// Errors from loading templates.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template for {kind} has no __CODE__ placeholder")]
    MissingPlaceholder { kind: PictureKind },

    #[error("failed to read template {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
}

/// A complete document ready for the TeX compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilableDocument {
    pub kind: PictureKind,
    pub text: String,
}

impl CompilableDocument {
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Templates keyed by picture kind.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: BTreeMap<PictureKind, String>,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateSet {
    /// The templates shipped with the crate.
    pub fn builtin() -> Self {
        let templates = BTreeMap::from([
            (PictureKind::Equation, EQUATION_TEMPLATE.to_string()),
            (PictureKind::Pspicture, PSPICTURE_TEMPLATE.to_string()),
            (PictureKind::Tikzpicture, TIKZPICTURE_TEMPLATE.to_string()),
        ]);
        Self { templates }
    }

    /// A set with no templates; every bind fails until one is inserted.
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    /// Built-in templates overridden by any `<kind>.tex` found in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, TemplateError> {
        let mut set = Self::builtin();
        for kind in PictureKind::ALL {
            let path = dir.join(format!("{}.tex", kind.as_str()));
            if !path.exists() {
                continue;
            }
            let text = fs::read_to_string(&path).map_err(|error| TemplateError::Io {
                path: path.clone(),
                error,
            })?;
            set.insert(kind, text)?;
            tracing::debug!(kind = %kind, path = %path.display(), "loaded template override");
        }
        Ok(set)
    }

    /// Install a template, rejecting text without a placeholder.
    pub fn insert(&mut self, kind: PictureKind, text: impl Into<String>) -> Result<(), TemplateError> {
        let text = text.into();
        if !text.contains(PLACEHOLDER) {
            return Err(TemplateError::MissingPlaceholder { kind });
        }
        self.templates.insert(kind, text);
        Ok(())
    }

    pub fn get(&self, kind: PictureKind) -> Option<&str> {
        self.templates.get(&kind).map(String::as_str)
    }

    /// Bind normalized source into the template for `kind`.
    ///
    /// Exactly one placeholder is replaced. A kind without a template is an
    /// `UnknownKind` error.
    pub fn bind(&self, kind: PictureKind, source: &NormalizedSource) -> RenderResult<CompilableDocument> {
        let template = self
            .get(kind)
            .ok_or_else(|| RenderError::UnknownKind(kind.to_string()))?;
        Ok(CompilableDocument {
            kind,
            text: template.replacen(PLACEHOLDER, source.as_str().trim(), 1),
        })
    }
}

/// Bind using the built-in templates.
pub fn bind(kind: PictureKind, source: &NormalizedSource) -> RenderResult<CompilableDocument> {
    TemplateSet::builtin().bind(kind, source)
}
