//! Document rewriting
//!
//! Replaces marked LaTeX elements in a document tree with image references.
//! Walking and mutating the markup itself is left to the caller through
//! [`LatexTree`] and [`LatexElement`]; this module only decides what each
//! element becomes.

use latex2image_text::PictureKind;
use serde::Serialize;

use crate::cache::{RenderCache, RenderOutcome, RenderRequest};
use crate::driver::TexBackend;
use crate::error::{RenderError, RenderResult};

/// An element whose text content is a LaTeX equation.
pub trait LatexElement {
    /// Raw text content, with markup entities possibly still encoded.
    fn latex_text(&self) -> String;

    /// Replace the element's content with an image referencing `src`.
    fn replace_with_image(&mut self, src: &str);

    /// Where this element lives, for failure reports.
    fn describe(&self) -> String;
}

/// A document holding [`LatexElement`]s.
pub trait LatexTree {
    type Element: LatexElement;

    /// Elements carrying `class`, in document order.
    fn elements_with_class(&mut self, class: &str) -> Vec<&mut Self::Element>;
}

/// Per-document rewrite counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteSummary {
    pub replaced: usize,
    /// Elements left unconverted because they failed to compile
    pub failed: usize,
    /// Elements with nothing renderable in them
    pub skipped: usize,
}

/// Image URL for a fingerprint.
pub fn image_src(image_base_url: &str, file_name: &str) -> String {
    format!("{}/{file_name}", image_base_url.trim_end_matches('/'))
}

/// Render every element with `class` as an equation and point it at the image.
///
/// Elements that fail to compile or normalize to nothing are left unchanged
/// and the walk continues. Errors that are not about the element itself (a
/// cache write failure, a missing template) abort the walk.
pub fn replace_latex_with_images<T, B>(
    tree: &mut T,
    class: &str,
    cache: &RenderCache<B>,
    image_base_url: &str,
) -> RenderResult<RewriteSummary>
where
    T: LatexTree,
    B: TexBackend,
{
    let mut summary = RewriteSummary::default();
    for element in tree.elements_with_class(class) {
        let context = element.describe();
        let request = match RenderRequest::from_raw(PictureKind::Equation, &element.latex_text()) {
            Ok(request) => request.with_context(context.clone()),
            Err(e @ RenderError::EmptySource { .. }) => {
                tracing::warn!(context = %context, "skipping element: {e}");
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        match cache.render(&request)? {
            RenderOutcome::Cached(_) | RenderOutcome::Rendered(_) => {
                let src = image_src(image_base_url, &request.fingerprint.file_name("png"));
                element.replace_with_image(&src);
                summary.replaced += 1;
            }
            RenderOutcome::Failed(_) => summary.failed += 1,
        }
    }
    tracing::debug!(
        class,
        replaced = summary.replaced,
        failed = summary.failed,
        skipped = summary.skipped,
        "rewrote document"
    );
    Ok(summary)
}
