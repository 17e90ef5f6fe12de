//! Mock TeX backend
//!
//! Stands in for the compiler and rasterizer in tests. Instead of running
//! external tools it writes placeholder `figure.pdf` and `figure.png` files,
//! counts invocations and records every document it was asked to compile.
//!
//! The PDF holds the document text and the PNG holds a PNG signature followed
//! by the PDF bytes, so tests can tell which source produced a cache entry.

mod failure;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::driver::{ProcessOutput, TexBackend, LOG_FILE, PDF_FILE};
use crate::error::{RenderError, RenderResult};

pub use failure::{FailureInjector, MockBehavior};

/// Leading bytes of every PNG the mock writes.
pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Compiler log written when the mock fails a compilation.
pub const MOCK_ERROR_LOG: &str = "! Undefined control sequence.\n! Emergency stop.\n";

const NO_PNG_MARKER: &str = ".mock-no-png";

#[derive(Debug)]
pub struct MockBackend {
    injector: FailureInjector,
    delay: Option<Duration>,
    compiles: AtomicUsize,
    rasterizes: AtomicUsize,
    last_dpi: AtomicU32,
    documents: Mutex<Vec<String>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::with_injector(FailureInjector::always(MockBehavior::Succeed))
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self::with_injector(FailureInjector::always(behavior))
    }

    pub fn with_injector(injector: FailureInjector) -> Self {
        Self {
            injector,
            delay: None,
            compiles: AtomicUsize::new(0),
            rasterizes: AtomicUsize::new(0),
            last_dpi: AtomicU32::new(0),
            documents: Mutex::new(Vec::new()),
        }
    }

    /// Sleep this long inside every compile.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    pub fn rasterize_count(&self) -> usize {
        self.rasterizes.load(Ordering::SeqCst)
    }

    pub fn last_dpi(&self) -> Option<u32> {
        match self.last_dpi.load(Ordering::SeqCst) {
            0 => None,
            dpi => Some(dpi),
        }
    }

    /// Documents passed to `compile`, in call order.
    pub fn documents(&self) -> Vec<String> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }
}

impl TexBackend for MockBackend {
    fn compile(&self, tex_path: &Path, output_dir: &Path) -> RenderResult<ProcessOutput> {
        let behavior = self.injector.next();
        if behavior == MockBehavior::CompilerMissing {
            return Err(RenderError::CompilerNotFound {
                searched: vec![output_dir.join("pdflatex")],
            });
        }

        self.compiles.fetch_add(1, Ordering::SeqCst);
        let text = fs::read_to_string(tex_path).map_err(RenderError::Workspace)?;
        if let Ok(mut docs) = self.documents.lock() {
            docs.push(text.clone());
        }
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        if behavior == MockBehavior::NoPdf {
            fs::write(output_dir.join(LOG_FILE), MOCK_ERROR_LOG).map_err(RenderError::Workspace)?;
            return Ok(ProcessOutput {
                exit_code: Some(1),
                success: false,
                stdout: MOCK_ERROR_LOG.to_string(),
                stderr: String::new(),
            });
        }

        fs::write(output_dir.join(PDF_FILE), format!("%PDF-1.5\n{text}"))
            .map_err(RenderError::Workspace)?;
        // NoPng is decided at rasterize time; remember it through a marker file.
        if behavior == MockBehavior::NoPng {
            fs::write(output_dir.join(NO_PNG_MARKER), b"").map_err(RenderError::Workspace)?;
        }
        Ok(ProcessOutput {
            exit_code: Some(0),
            success: true,
            ..Default::default()
        })
    }

    fn rasterize(&self, pdf_path: &Path, png_path: &Path, dpi: u32) -> RenderResult<ProcessOutput> {
        self.rasterizes.fetch_add(1, Ordering::SeqCst);
        self.last_dpi.store(dpi, Ordering::SeqCst);

        let marker = pdf_path.with_file_name(NO_PNG_MARKER);
        if marker.exists() {
            return Ok(ProcessOutput {
                exit_code: Some(1),
                success: false,
                stdout: String::new(),
                stderr: "convert: no images defined".to_string(),
            });
        }

        let mut png = PNG_SIGNATURE.to_vec();
        png.extend(fs::read(pdf_path).map_err(RenderError::Workspace)?);
        fs::write(png_path, png).map_err(RenderError::Workspace)?;
        Ok(ProcessOutput {
            exit_code: Some(0),
            success: true,
            ..Default::default()
        })
    }
}
