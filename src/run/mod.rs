//! Single-snippet render entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use latex2image_text::{normalize, Fingerprint, PictureKind};

use crate::cache::{RenderCache, RenderRequest};
use crate::config::RenderConfig;
use crate::driver::{Driver, TexBackend};
use crate::error::RenderResult;
use crate::report::TracingReporter;

/// Render one snippet into `cache_root` with the real toolchain.
///
/// `source` may be raw or already normalized; normalizing twice is a no-op.
/// Returns the persisted PNG path, or `None` when the snippet failed to
/// compile (the failure has been reported through `tracing`).
///
/// # Arguments
/// * `fingerprint` - Cache key; normally `fingerprint(&normalize(kind, source)?)`
/// * `compiler` - Explicit compiler path, bypassing `LATEX_PATH`/`PATH` discovery
pub fn run_latex(
    kind: PictureKind,
    fingerprint: &Fingerprint,
    source: &str,
    cache_root: &Path,
    dpi: u32,
    compiler: Option<PathBuf>,
) -> RenderResult<Option<PathBuf>> {
    let config = RenderConfig {
        cache_root: cache_root.to_path_buf(),
        dpi,
        compiler,
        ..RenderConfig::default()
    };
    let driver = Driver::new(config.process_backend()).with_dpi(dpi);
    let cache = RenderCache::new(cache_root, driver)
        .with_reporter(Arc::new(TracingReporter));
    run_latex_with(&cache, kind, fingerprint, source)
}

/// [`run_latex`] against an existing cache.
pub fn run_latex_with<B: TexBackend>(
    cache: &RenderCache<B>,
    kind: PictureKind,
    fingerprint: &Fingerprint,
    source: &str,
) -> RenderResult<Option<PathBuf>> {
    let request =
        RenderRequest::new(kind, normalize(kind, source)?).with_fingerprint(fingerprint.clone());
    Ok(cache.render(&request)?.into_path())
}
