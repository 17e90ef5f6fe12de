//! Render error taxonomy.
//!
//! Two classes of failure:
//! - Operational failures caused by the author's LaTeX or the local TeX
//!   install (`is_recoverable() == true`). The render cache reports these and
//!   skips the snippet; batches keep going.
//! - Data, programming and filesystem errors, which abort the individual
//!   render and are propagated to the caller.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use latex2image_text::{FingerprintError, NormalizeError, PictureKind, UnknownKindError};
use thiserror::Error;

/// Result alias for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors from binding, compiling and caching a snippet.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{kind} source is empty after normalization")]
    EmptySource { kind: PictureKind },

    #[error("unknown picture kind: {0}")]
    UnknownKind(String),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(#[from] FingerprintError),

    #[error("no TeX compiler found (searched {} locations)", .searched.len())]
    CompilerNotFound { searched: Vec<PathBuf> },

    #[error("LaTeX failed to compile the image: {tex_path}")]
    Compilation {
        tex_path: PathBuf,
        log: String,
        document: String,
    },

    #[error("{program} did not finish within {limit:?}")]
    Timeout { program: PathBuf, limit: Duration },

    #[error("failed to run {program}: {error}")]
    Spawn {
        program: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("rasterizer produced no image from {pdf_path}")]
    Rasterize { pdf_path: PathBuf, log: String },

    #[error("failed to write cache entry {path}: {error}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("scratch workspace I/O error: {0}")]
    Workspace(#[source] io::Error),

    #[error("included file path must be relative and stay inside the workspace: {0}")]
    InvalidInclude(PathBuf),
}

impl RenderError {
    /// Operational failures that skip one snippet rather than abort.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::CompilerNotFound { .. }
                | RenderError::Compilation { .. }
                | RenderError::Timeout { .. }
                | RenderError::Spawn { .. }
                | RenderError::Rasterize { .. }
        )
    }

    /// Compiler or rasterizer output attached to the error, if any.
    pub fn log(&self) -> Option<&str> {
        match self {
            RenderError::Compilation { log, .. } | RenderError::Rasterize { log, .. } => {
                Some(log.as_str())
            }
            _ => None,
        }
    }
}

impl From<NormalizeError> for RenderError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::EmptySource { kind } => RenderError::EmptySource { kind },
        }
    }
}

impl From<UnknownKindError> for RenderError {
    fn from(err: UnknownKindError) -> Self {
        RenderError::UnknownKind(err.0)
    }
}
