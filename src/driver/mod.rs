//! Compilation and rasterization driver
//!
//! Turns a bound document into a PNG inside a fresh scratch workspace:
//! 1. Acquire the workspace
//! 2. Write `figure.tex` (UTF-8 bytes) and any included files
//! 3. Run the TeX compiler
//! 4. Require `figure.pdf`, otherwise fail with the compiler log
//! 5. Rasterize to `figure.png` at the configured DPI
//!
//! The external tools sit behind [`TexBackend`] so the driver can run
//! against the real toolchain or an in-process stand-in.

pub mod process;
pub mod workspace;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{RenderError, RenderResult};
use crate::template::CompilableDocument;

pub use process::{compiler_args, run_command, ProcessBackend};
pub use workspace::{IncludedFile, ScratchWorkspace};

pub const TEX_FILE: &str = "figure.tex";
pub const PDF_FILE: &str = "figure.pdf";
pub const PNG_FILE: &str = "figure.png";
pub const LOG_FILE: &str = "figure.log";

/// Default rasterization resolution.
pub const DEFAULT_DPI: u32 = 300;

/// Captured result of one external tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// The external compiler and rasterizer.
///
/// Implementations report spawn problems and missing tools as errors. A tool
/// that runs but fails is reported through [`ProcessOutput`]; the driver
/// decides success by looking for the expected artifact.
pub trait TexBackend: Send + Sync {
    /// Compile `tex_path`, writing all output into `output_dir`.
    fn compile(&self, tex_path: &Path, output_dir: &Path) -> RenderResult<ProcessOutput>;

    /// Convert `pdf_path` into `png_path` at `dpi`.
    fn rasterize(&self, pdf_path: &Path, png_path: &Path, dpi: u32) -> RenderResult<ProcessOutput>;
}

impl<T: TexBackend + ?Sized> TexBackend for Arc<T> {
    fn compile(&self, tex_path: &Path, output_dir: &Path) -> RenderResult<ProcessOutput> {
        (**self).compile(tex_path, output_dir)
    }

    fn rasterize(&self, pdf_path: &Path, png_path: &Path, dpi: u32) -> RenderResult<ProcessOutput> {
        (**self).rasterize(pdf_path, png_path, dpi)
    }
}

/// Artifacts of a successful compilation, still inside their workspace.
///
/// Dropping this removes the workspace and the files with it.
#[derive(Debug)]
pub struct CompiledArtifact {
    pub png: PathBuf,
    pub pdf: PathBuf,
    workspace: ScratchWorkspace,
}

impl CompiledArtifact {
    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    /// Remove the workspace now.
    pub fn release(self) {
        self.workspace.release_logged();
    }
}

/// Runs documents through a [`TexBackend`].
#[derive(Debug, Clone)]
pub struct Driver<B> {
    backend: B,
    dpi: u32,
    scratch_dir: Option<PathBuf>,
}

impl<B: TexBackend> Driver<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            dpi: DEFAULT_DPI,
            scratch_dir: None,
        }
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Create workspaces under `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn compile(&self, document: &CompilableDocument) -> RenderResult<CompiledArtifact> {
        self.compile_with_includes(document, &[])
    }

    /// Compile and rasterize `document` with `includes` placed beside it.
    ///
    /// On any error the workspace is removed before returning.
    pub fn compile_with_includes(
        &self,
        document: &CompilableDocument,
        includes: &[IncludedFile],
    ) -> RenderResult<CompiledArtifact> {
        let workspace = match &self.scratch_dir {
            Some(dir) => ScratchWorkspace::acquire_in(dir)?,
            None => ScratchWorkspace::acquire()?,
        };

        match self.run_in(workspace.path(), document, includes) {
            Ok((png, pdf)) => Ok(CompiledArtifact {
                png,
                pdf,
                workspace,
            }),
            Err(e) => {
                workspace.release_logged();
                Err(e)
            }
        }
    }

    fn run_in(
        &self,
        dir: &Path,
        document: &CompilableDocument,
        includes: &[IncludedFile],
    ) -> RenderResult<(PathBuf, PathBuf)> {
        let tex_path = dir.join(TEX_FILE);
        fs::write(&tex_path, document.as_str().as_bytes()).map_err(RenderError::Workspace)?;
        for include in includes {
            include.write_into(dir)?;
        }

        let output = self.backend.compile(&tex_path, dir)?;
        let pdf_path = dir.join(PDF_FILE);
        if !pdf_path.is_file() {
            let log = fs::read_to_string(dir.join(LOG_FILE)).unwrap_or_else(|_| output.combined());
            tracing::debug!(kind = %document.kind, exit_code = ?output.exit_code, "compiler produced no PDF");
            return Err(RenderError::Compilation {
                tex_path,
                log,
                document: document.text.clone(),
            });
        }

        let png_path = dir.join(PNG_FILE);
        let output = self.backend.rasterize(&pdf_path, &png_path, self.dpi)?;
        if !png_path.is_file() {
            return Err(RenderError::Rasterize {
                pdf_path,
                log: output.combined(),
            });
        }

        Ok((png_path, pdf_path))
    }
}
