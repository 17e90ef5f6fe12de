//! Render event reporting
//!
//! The render cache never writes to a console or global logger directly.
//! It calls an injected [`Reporter`] for every cache hit, new render and
//! caught failure.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use latex2image_text::{Fingerprint, PictureKind};
use serde::Serialize;

use crate::error::RenderError;

/// A caught render failure, attributed to its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub kind: PictureKind,
    pub fingerprint: Fingerprint,
    /// Normalized source that failed
    pub source: String,
    /// Where the snippet came from (document path, element id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(
        kind: PictureKind,
        fingerprint: Fingerprint,
        source: impl Into<String>,
        context: Option<String>,
        error: &RenderError,
    ) -> Self {
        Self {
            kind,
            fingerprint,
            source: source.into(),
            context,
            error: error.to_string(),
            log: error.log().map(str::to_string),
            occurred_at: Utc::now(),
        }
    }
}

/// Receives render events.
pub trait Reporter: Send + Sync {
    fn cache_hit(&self, _kind: PictureKind, _fingerprint: &Fingerprint, _path: &Path) {}

    fn rendered(&self, _kind: PictureKind, _fingerprint: &Fingerprint, _path: &Path) {}

    fn failed(&self, _record: &FailureRecord) {}
}

/// Reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn cache_hit(&self, kind: PictureKind, fingerprint: &Fingerprint, path: &Path) {
        tracing::debug!(%kind, %fingerprint, path = %path.display(), "cache hit");
    }

    fn rendered(&self, kind: PictureKind, fingerprint: &Fingerprint, path: &Path) {
        tracing::info!(%kind, %fingerprint, path = %path.display(), "rendered");
    }

    fn failed(&self, record: &FailureRecord) {
        tracing::error!(
            kind = %record.kind,
            fingerprint = %record.fingerprint,
            context = record.context.as_deref().unwrap_or("-"),
            source = %record.source,
            "{}",
            record.error
        );
        if let Some(log) = &record.log {
            tracing::debug!(fingerprint = %record.fingerprint, "compiler log:\n{log}");
        }
    }
}

/// Writes one progress character per render: `.` rendered, `s` skipped.
///
/// Failures are written out in full on their own lines.
#[derive(Debug)]
pub struct ProgressReporter<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> ProgressReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = out.write_all(text.as_bytes());
            let _ = out.flush();
        }
    }
}

impl<W: Write + Send> Reporter for ProgressReporter<W> {
    fn cache_hit(&self, _kind: PictureKind, _fingerprint: &Fingerprint, _path: &Path) {
        self.write("s");
    }

    fn rendered(&self, _kind: PictureKind, _fingerprint: &Fingerprint, _path: &Path) {
        self.write(".");
    }

    fn failed(&self, record: &FailureRecord) {
        let mut text = format!("\n{}\n", record.error);
        if let Some(context) = &record.context {
            text.push_str(&format!("  in: {context}\n"));
        }
        text.push_str(&format!("  {} {}\n", record.kind, record.fingerprint));
        text.push_str(&format!("  source: {}\n", record.source));
        self.write(&text);
    }
}

/// One event captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportEvent {
    CacheHit { kind: PictureKind, fingerprint: Fingerprint, path: PathBuf },
    Rendered { kind: PictureKind, fingerprint: Fingerprint, path: PathBuf },
    Failed(FailureRecord),
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReportEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::Failed(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ReportEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Reporter for RecordingReporter {
    fn cache_hit(&self, kind: PictureKind, fingerprint: &Fingerprint, path: &Path) {
        self.push(ReportEvent::CacheHit {
            kind,
            fingerprint: fingerprint.clone(),
            path: path.to_path_buf(),
        });
    }

    fn rendered(&self, kind: PictureKind, fingerprint: &Fingerprint, path: &Path) {
        self.push(ReportEvent::Rendered {
            kind,
            fingerprint: fingerprint.clone(),
            path: path.to_path_buf(),
        });
    }

    fn failed(&self, record: &FailureRecord) {
        self.push(ReportEvent::Failed(record.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use latex2image_text::fingerprint_str;

    fn record() -> FailureRecord {
        let err = RenderError::Compilation {
            tex_path: PathBuf::from("/tmp/x/figure.tex"),
            log: "! Missing $ inserted.".into(),
            document: String::new(),
        };
        FailureRecord::new(
            PictureKind::Equation,
            fingerprint_str(r"\(x^\)"),
            r"\(x^\)",
            Some("chapter1.html#eq-3".into()),
            &err,
        )
    }

    #[test]
    fn test_progress_characters() {
        let reporter = ProgressReporter::new(Vec::new());
        let fp = fingerprint_str("a");
        reporter.rendered(PictureKind::Equation, &fp, Path::new("a.png"));
        reporter.cache_hit(PictureKind::Equation, &fp, Path::new("a.png"));
        reporter.cache_hit(PictureKind::Equation, &fp, Path::new("a.png"));
        assert_eq!(reporter.into_inner(), b".ss");
    }

    #[test]
    fn test_progress_failure_names_source_and_context() {
        let reporter = ProgressReporter::new(Vec::new());
        reporter.failed(&record());
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(text.contains("LaTeX failed to compile the image"));
        assert!(text.contains("in: chapter1.html#eq-3"));
        assert!(text.contains(r"source: \(x^\)"));
    }

    #[test]
    fn test_failure_record_json() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["kind"], "equation");
        assert_eq!(json["context"], "chapter1.html#eq-3");
        assert_eq!(json["log"], "! Missing $ inserted.");
        assert!(json["occurred_at"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        let fp = fingerprint_str("b");
        reporter.cache_hit(PictureKind::Tikzpicture, &fp, Path::new("b.png"));
        reporter.failed(&record());
        let events = reporter.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ReportEvent::CacheHit { .. }));
        assert_eq!(reporter.failures().len(), 1);
    }
}
