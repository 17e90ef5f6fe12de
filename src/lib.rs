//! latex2image - LaTeX snippet to PNG render cache
//!
//! Converts equations and TikZ/PSTricks pictures embedded in book sources
//! into PNG images. Snippets are normalized, fingerprinted and compiled once;
//! later builds find the image under `<cache_root>/<kind>/<fingerprint>.png`
//! and skip the TeX toolchain entirely.
//!
//! Text normalization and fingerprinting live in the `latex2image-text`
//! crate and are re-exported here.

pub mod batch;
pub mod cache;
pub mod config;
pub mod driver;
pub mod error;
pub mod mock;
pub mod report;
pub mod rewrite;
pub mod run;
pub mod template;
pub mod toolchain;

pub use batch::{render_batch, split_snippets, BatchSummary};
pub use cache::{CacheKey, RenderCache, RenderOutcome, RenderRequest};
pub use config::{ConfigError, ConfigOverrides, RenderConfig};
pub use driver::{CompiledArtifact, Driver, IncludedFile, ProcessBackend, TexBackend};
pub use error::{RenderError, RenderResult};
pub use report::{FailureRecord, ProgressReporter, RecordingReporter, Reporter, TracingReporter};
pub use rewrite::{replace_latex_with_images, LatexElement, LatexTree};
pub use run::{run_latex, run_latex_with};
pub use template::{bind, CompilableDocument, TemplateSet};
pub use toolchain::{resolve_compiler, CompilerLookup, CompilerSearch, Rasterizer, RasterizerKind};

pub use latex2image_text::{
    fingerprint, fingerprint_str, normalize, normalize_and_fingerprint, Fingerprint,
    NormalizedSource, PictureKind,
};
