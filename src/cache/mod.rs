//! Content-addressed render cache
//!
//! Persisted images live at `<root>/<kind>/<fingerprint>.png`, with the PDF
//! they were rasterized from beside them as `<fingerprint>.pdf`. That layout
//! is read by other tooling and must not change.
//!
//! Rendering a request:
//! 1. If the PNG already exists, return it without compiling
//! 2. Otherwise bind the template and compile in a scratch workspace
//! 3. Operational failures (bad LaTeX, missing tools) are reported and
//!    returned as [`RenderOutcome::Failed`]; nothing is written
//! 4. On success copy the PDF, then the PNG, into place
//! 5. Release the workspace
//!
//! The PNG is placed last, so its presence implies a complete entry.

mod copy;
mod inflight;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use latex2image_text::{fingerprint, normalize, Fingerprint, NormalizedSource, PictureKind};

use crate::driver::{CompiledArtifact, Driver, IncludedFile, TexBackend};
use crate::error::{RenderError, RenderResult};
use crate::report::{FailureRecord, Reporter, TracingReporter};
use crate::template::TemplateSet;

pub use copy::{copy_if_newer, CopyOutcome, MTIME_TOLERANCE};
pub use inflight::{InflightClaim, InflightKeys};

/// Default cache location, relative to the book being built.
pub const DEFAULT_CACHE_ROOT: &str = ".bookbuilder/images";

/// Identity of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: PictureKind,
    pub fingerprint: Fingerprint,
}

impl CacheKey {
    pub fn new(kind: PictureKind, fingerprint: Fingerprint) -> Self {
        Self { kind, fingerprint }
    }

    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(self.kind.as_str())
    }

    pub fn png_path(&self, root: &Path) -> PathBuf {
        self.dir(root).join(self.fingerprint.file_name("png"))
    }

    pub fn pdf_path(&self, root: &Path) -> PathBuf {
        self.dir(root).join(self.fingerprint.file_name("pdf"))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.fingerprint)
    }
}

/// One snippet to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub kind: PictureKind,
    pub fingerprint: Fingerprint,
    pub source: NormalizedSource,
    /// Where the snippet came from, for failure reports
    pub context: Option<String>,
    pub includes: Vec<IncludedFile>,
}

impl RenderRequest {
    /// Request keyed by the fingerprint of `source`.
    pub fn new(kind: PictureKind, source: NormalizedSource) -> Self {
        let fingerprint = fingerprint(&source);
        Self {
            kind,
            fingerprint,
            source,
            context: None,
            includes: Vec::new(),
        }
    }

    /// Normalize `raw` and build a request for it.
    pub fn from_raw(kind: PictureKind, raw: &str) -> RenderResult<Self> {
        Ok(Self::new(kind, normalize(kind, raw)?))
    }

    /// Use a caller-supplied fingerprint as the cache key.
    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_includes(mut self, includes: Vec<IncludedFile>) -> Self {
        self.includes = includes;
        self
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(self.kind, self.fingerprint.clone())
    }
}

/// Result of a render that did not hit a propagated error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Entry already existed; nothing was compiled
    Cached(PathBuf),
    /// Compiled and stored just now
    Rendered(PathBuf),
    /// Compilation failed; the caller should leave the element unconverted
    Failed(FailureRecord),
}

impl RenderOutcome {
    /// Persisted PNG path, unless the render failed.
    pub fn path(&self) -> Option<&Path> {
        match self {
            RenderOutcome::Cached(path) | RenderOutcome::Rendered(path) => Some(path),
            RenderOutcome::Failed(_) => None,
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            RenderOutcome::Cached(path) | RenderOutcome::Rendered(path) => Some(path),
            RenderOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RenderOutcome::Failed(_))
    }
}

/// Persistent mapping from (kind, fingerprint) to rendered images.
pub struct RenderCache<B> {
    root: PathBuf,
    driver: Driver<B>,
    templates: TemplateSet,
    reporter: Arc<dyn Reporter>,
    inflight: InflightKeys,
}

impl<B> fmt::Debug for RenderCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCache")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl<B: TexBackend> RenderCache<B> {
    /// A cache at `root` using built-in templates and tracing output.
    pub fn new(root: impl Into<PathBuf>, driver: Driver<B>) -> Self {
        Self {
            root: root.into(),
            driver,
            templates: TemplateSet::builtin(),
            reporter: Arc::new(TracingReporter),
            inflight: InflightKeys::new(),
        }
    }

    pub fn with_templates(mut self, templates: TemplateSet) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn driver(&self) -> &Driver<B> {
        &self.driver
    }

    /// Existing entry for `key`, without rendering.
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = key.png_path(&self.root);
        path.is_file().then_some(path)
    }

    /// Render `request`, or return the cached image.
    ///
    /// Recoverable failures come back as `Ok(RenderOutcome::Failed)`. Template
    /// lookup, workspace and cache write errors are returned as `Err`.
    pub fn render(&self, request: &RenderRequest) -> RenderResult<RenderOutcome> {
        let key = request.key();
        if let Some(path) = self.lookup(&key) {
            self.reporter.cache_hit(key.kind, &key.fingerprint, &path);
            return Ok(RenderOutcome::Cached(path));
        }

        let _claim = self.inflight.claim(&key);
        if let Some(path) = self.lookup(&key) {
            self.reporter.cache_hit(key.kind, &key.fingerprint, &path);
            return Ok(RenderOutcome::Cached(path));
        }

        tracing::debug!(key = %key, "cache miss");
        let document = self.templates.bind(request.kind, &request.source)?;
        let artifact = match self.driver.compile_with_includes(&document, &request.includes) {
            Ok(artifact) => artifact,
            Err(e) if e.is_recoverable() => {
                let record = FailureRecord::new(
                    request.kind,
                    request.fingerprint.clone(),
                    request.source.as_str(),
                    request.context.clone(),
                    &e,
                );
                self.reporter.failed(&record);
                return Ok(RenderOutcome::Failed(record));
            }
            Err(e) => return Err(e),
        };

        let stored = self.store(&key, &artifact);
        artifact.release();
        let path = stored?;

        self.reporter.rendered(key.kind, &key.fingerprint, &path);
        Ok(RenderOutcome::Rendered(path))
    }

    fn store(&self, key: &CacheKey, artifact: &CompiledArtifact) -> RenderResult<PathBuf> {
        let pdf_dest = key.pdf_path(&self.root);
        place(&artifact.pdf, &pdf_dest)?;

        let png_dest = key.png_path(&self.root);
        place(&artifact.png, &png_dest)?;
        Ok(png_dest)
    }
}

fn place(src: &Path, dest: &Path) -> RenderResult<CopyOutcome> {
    copy_if_newer(src, dest).map_err(|error| RenderError::CacheWrite {
        path: dest.to_path_buf(),
        error,
    })
}
