//! Scratch workspaces
//!
//! One temporary directory per compilation attempt. The directory is removed
//! by [`ScratchWorkspace::release`], or on drop if an early return or panic
//! skips the explicit release.

use std::io;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;

use crate::error::{RenderError, RenderResult};

const WORKSPACE_PREFIX: &str = "latex2image-";

/// Ephemeral directory owned by a single compilation.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Create a fresh directory under the system temp dir.
    pub fn acquire() -> RenderResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .map_err(RenderError::Workspace)?;
        Ok(Self { dir })
    }

    /// Create a fresh directory under `parent`.
    pub fn acquire_in(parent: &Path) -> RenderResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .map_err(RenderError::Workspace)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory. A directory that is already gone is not an error.
    pub fn release(self) -> io::Result<()> {
        match self.dir.close() {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Release, logging instead of returning any failure.
    pub fn release_logged(self) {
        let path = self.path().to_path_buf();
        if let Err(e) = self.release() {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch workspace");
        }
    }
}

/// An auxiliary file copied into the workspace before compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedFile {
    /// Path relative to the workspace root
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl IncludedFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Write beneath `root`, creating parent directories.
    pub fn write_into(&self, root: &Path) -> RenderResult<PathBuf> {
        let stays_inside = !self.path.as_os_str().is_empty()
            && self
                .path
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !stays_inside {
            return Err(RenderError::InvalidInclude(self.path.clone()));
        }

        let target = root.join(&self.path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(RenderError::Workspace)?;
        }
        std::fs::write(&target, &self.contents).map_err(RenderError::Workspace)?;
        Ok(target)
    }
}
