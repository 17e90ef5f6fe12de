//! External tool resolution
//!
//! Locates the TeX compiler and describes the rasterizer invocation.
//!
//! Compiler resolution order:
//! 1. Explicit override path (trusted as given)
//! 2. Entries of `LATEX_PATH` (or `PATH` when unset) whose path contains
//!    "tex", joined with the compiler program name
//! 3. Conventional install directories (`/usr/local/bin`, `/usr/bin`)
//!
//! The environment is captured once into a [`CompilerSearch`] so resolution
//! is a pure function of its inputs.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};

/// Environment variable overriding the search path for the compiler.
pub const LATEX_PATH_ENV: &str = "LATEX_PATH";

/// Compiler program looked up in search directories.
pub const DEFAULT_COMPILER: &str = "pdflatex";

/// Directories probed when no search path entry matches.
pub const CONVENTIONAL_DIRS: &[&str] = &["/usr/local/bin", "/usr/bin"];

/// Outcome of compiler resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerLookup {
    Found(PathBuf),
    NotFound { searched: Vec<PathBuf> },
}

impl CompilerLookup {
    pub fn path(&self) -> Option<&Path> {
        match self {
            CompilerLookup::Found(path) => Some(path),
            CompilerLookup::NotFound { .. } => None,
        }
    }

    /// The compiler path, or `CompilerNotFound`.
    pub fn require(&self) -> RenderResult<&Path> {
        match self {
            CompilerLookup::Found(path) => Ok(path),
            CompilerLookup::NotFound { searched } => Err(RenderError::CompilerNotFound {
                searched: searched.clone(),
            }),
        }
    }
}

/// Inputs to compiler resolution.
#[derive(Debug, Clone)]
pub struct CompilerSearch {
    /// Explicitly configured compiler
    pub override_path: Option<PathBuf>,
    /// Value of `LATEX_PATH`
    pub latex_path: Option<OsString>,
    /// Value of `PATH`
    pub path: Option<OsString>,
    /// Fallback directories
    pub conventional_dirs: Vec<PathBuf>,
    /// Program name joined onto search directories
    pub program: String,
}

impl Default for CompilerSearch {
    fn default() -> Self {
        Self {
            override_path: None,
            latex_path: None,
            path: None,
            conventional_dirs: CONVENTIONAL_DIRS.iter().map(PathBuf::from).collect(),
            program: DEFAULT_COMPILER.to_string(),
        }
    }
}

impl CompilerSearch {
    /// Capture the process environment.
    pub fn from_env(override_path: Option<PathBuf>) -> Self {
        Self {
            override_path,
            latex_path: env::var_os(LATEX_PATH_ENV),
            path: env::var_os("PATH"),
            ..Self::default()
        }
    }

    /// Resolve against the real filesystem.
    pub fn resolve(&self) -> CompilerLookup {
        self.resolve_with(|path| path.is_file())
    }

    /// Resolve using `exists` to test candidate paths.
    pub fn resolve_with(&self, exists: impl Fn(&Path) -> bool) -> CompilerLookup {
        if let Some(ref path) = self.override_path {
            return CompilerLookup::Found(path.clone());
        }

        let mut searched = Vec::new();

        let search_path = self.latex_path.as_deref().or(self.path.as_deref());
        if let Some(search_path) = search_path {
            for dir in tex_dirs(search_path) {
                let candidate = dir.join(&self.program);
                if exists(&candidate) {
                    return CompilerLookup::Found(candidate);
                }
                searched.push(candidate);
            }
        }

        for dir in &self.conventional_dirs {
            let candidate = dir.join(&self.program);
            if exists(&candidate) {
                return CompilerLookup::Found(candidate);
            }
            searched.push(candidate);
        }

        CompilerLookup::NotFound { searched }
    }
}

fn tex_dirs(search_path: &OsStr) -> impl Iterator<Item = PathBuf> + '_ {
    env::split_paths(search_path).filter(|dir| dir.to_string_lossy().contains("tex"))
}

/// Resolve the compiler from the process environment.
pub fn resolve_compiler(override_path: Option<PathBuf>) -> CompilerLookup {
    let lookup = CompilerSearch::from_env(override_path).resolve();
    match &lookup {
        CompilerLookup::Found(path) => tracing::debug!(compiler = %path.display(), "resolved TeX compiler"),
        CompilerLookup::NotFound { searched } => {
            tracing::warn!(candidates = searched.len(), "no TeX compiler found")
        }
    }
    lookup
}

/// Which PDF-to-PNG converter to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterizerKind {
    /// ImageMagick `convert -density <dpi> in.pdf out.png`
    #[default]
    Imagemagick,
    /// Poppler `pdftoppm -png -r <dpi> -singlefile in.pdf out`
    Pdftoppm,
}

impl RasterizerKind {
    pub fn default_program(&self) -> &'static str {
        match self {
            RasterizerKind::Imagemagick => "convert",
            RasterizerKind::Pdftoppm => "pdftoppm",
        }
    }
}

/// A configured rasterizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rasterizer {
    pub kind: RasterizerKind,
    pub program: PathBuf,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new(RasterizerKind::default(), None)
    }
}

impl Rasterizer {
    pub fn new(kind: RasterizerKind, program: Option<PathBuf>) -> Self {
        Self {
            kind,
            program: program.unwrap_or_else(|| PathBuf::from(kind.default_program())),
        }
    }

    /// Arguments converting `pdf` into `png` at `dpi`.
    pub fn args(&self, pdf: &Path, png: &Path, dpi: u32) -> Vec<OsString> {
        match self.kind {
            RasterizerKind::Imagemagick => vec![
                OsString::from("-density"),
                OsString::from(dpi.to_string()),
                pdf.as_os_str().to_owned(),
                png.as_os_str().to_owned(),
            ],
            RasterizerKind::Pdftoppm => vec![
                OsString::from("-png"),
                OsString::from("-r"),
                OsString::from(dpi.to_string()),
                OsString::from("-singlefile"),
                pdf.as_os_str().to_owned(),
                png.with_extension("").into_os_string(),
            ],
        }
    }
}
