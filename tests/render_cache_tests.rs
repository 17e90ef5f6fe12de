//! Render cache tests against the in-process mock backend.
//!
//! Covers the cache layout, hit/miss behavior, failure reporting, scratch
//! workspace cleanup and concurrent renders of the same key.

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use latex2image::mock::{MockBackend, MockBehavior, PNG_SIGNATURE};
use latex2image::report::ReportEvent;
use latex2image::{
    fingerprint_str, normalize, render_batch, BatchSummary, Driver, PictureKind,
    RecordingReporter, RenderCache, RenderOutcome, RenderRequest,
};

fn mock_cache(
    temp_dir: &TempDir,
    backend: Arc<MockBackend>,
) -> RenderCache<Arc<MockBackend>> {
    let scratch = temp_dir.path().join("scratch");
    fs::create_dir_all(&scratch).unwrap();
    RenderCache::new(
        temp_dir.path().join("images"),
        Driver::new(backend).with_scratch_dir(scratch),
    )
}

fn scratch_entries(temp_dir: &TempDir) -> usize {
    fs::read_dir(temp_dir.path().join("scratch")).unwrap().count()
}

// =============================================================================
// Test 1: End-to-end equation render lands at <root>/equation/<digest>.png
// =============================================================================

#[test]
fn test_end_to_end_equation() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new());
    let cache = mock_cache(&temp_dir, Arc::clone(&backend));

    let request = RenderRequest::from_raw(PictureKind::Equation, r"\[5x \% y\]").unwrap();
    assert_eq!(request.source.as_str(), r"\(5x \% y\)");
    assert_eq!(request.fingerprint, fingerprint_str(r"\(5x \% y\)"));

    let outcome = cache.render(&request).unwrap();
    let expected = temp_dir
        .path()
        .join("images/equation")
        .join(format!("{}.png", request.fingerprint));
    assert_eq!(outcome, RenderOutcome::Rendered(expected.clone()));
    assert!(expected.with_extension("pdf").is_file());

    let png = fs::read(&expected).unwrap();
    assert!(png.starts_with(PNG_SIGNATURE));
    let documents = backend.documents();
    assert_eq!(documents.len(), 1);
    assert!(documents[0].contains(r"\(5x \% y\)"));
    assert!(documents[0].contains(r"\begin{document}"));

    assert_eq!(scratch_entries(&temp_dir), 0);
}

// =============================================================================
// Test 2: A cache hit never invokes the compiler
// =============================================================================

#[test]
fn test_cache_hit_avoids_compilation() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new());
    let cache = mock_cache(&temp_dir, Arc::clone(&backend));
    let request = RenderRequest::from_raw(PictureKind::Tikzpicture, r"\draw (0,0) -- (1,0);").unwrap();

    // Pre-populate as another build would have left it
    let png = request.key().png_path(cache.root());
    fs::create_dir_all(png.parent().unwrap()).unwrap();
    fs::write(&png, b"from an earlier build").unwrap();

    for _ in 0..3 {
        assert_eq!(cache.render(&request).unwrap(), RenderOutcome::Cached(png.clone()));
    }
    assert_eq!(backend.compile_count(), 0);
    assert_eq!(backend.rasterize_count(), 0);
    assert_eq!(fs::read(&png).unwrap(), b"from an earlier build");
}

// =============================================================================
// Test 3: Compiler failure is reported and writes nothing
// =============================================================================

#[test]
fn test_compiler_failure_reported() {
    let temp_dir = TempDir::new().unwrap();
    let reporter = Arc::new(RecordingReporter::new());
    let cache = mock_cache(&temp_dir, Arc::new(MockBackend::with_behavior(MockBehavior::NoPdf)))
        .with_reporter(reporter.clone());
    let request = RenderRequest::from_raw(PictureKind::Equation, r"\undefinedmacro{x}")
        .unwrap()
        .with_context("chapter-02.html#eq-7");

    let outcome = cache.render(&request).unwrap();
    assert!(outcome.is_failed());
    assert_eq!(outcome.path(), None);
    assert!(!request.key().png_path(cache.root()).exists());
    assert_eq!(scratch_entries(&temp_dir), 0);

    let failures = reporter.failures();
    assert_eq!(failures.len(), 1);
    let record = &failures[0];
    assert_eq!(record.source, request.source.as_str());
    assert_eq!(record.fingerprint, request.fingerprint);
    assert_eq!(record.context.as_deref(), Some("chapter-02.html#eq-7"));
    assert!(record.error.contains("LaTeX failed to compile"));
}

#[test]
fn test_missing_compiler_reported() {
    let temp_dir = TempDir::new().unwrap();
    let reporter = Arc::new(RecordingReporter::new());
    let cache = mock_cache(
        &temp_dir,
        Arc::new(MockBackend::with_behavior(MockBehavior::CompilerMissing)),
    )
    .with_reporter(reporter.clone());
    let request = RenderRequest::from_raw(PictureKind::Pspicture, r"\psframe(0,0)(1,1)").unwrap();

    assert!(cache.render(&request).unwrap().is_failed());
    assert!(reporter.failures()[0].error.contains("no TeX compiler found"));
    assert_eq!(scratch_entries(&temp_dir), 0);
}

// =============================================================================
// Test 4: Kinds are cached separately
// =============================================================================

#[test]
fn test_same_source_different_kinds() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new());
    let cache = mock_cache(&temp_dir, Arc::clone(&backend));

    let tikz = RenderRequest::from_raw(PictureKind::Tikzpicture, r"\node {a};").unwrap();
    let pst = RenderRequest::from_raw(PictureKind::Pspicture, r"\node {a};").unwrap();
    assert_eq!(tikz.fingerprint, pst.fingerprint);

    let a = cache.render(&tikz).unwrap();
    let b = cache.render(&pst).unwrap();
    assert_ne!(a.path(), b.path());
    assert_eq!(backend.compile_count(), 2);
    assert!(a.path().unwrap().starts_with(cache.root().join("tikzpicture")));
    assert!(b.path().unwrap().starts_with(cache.root().join("pspicture")));
}

// =============================================================================
// Test 5: Concurrent misses on one key compile once
// =============================================================================

#[test]
fn test_concurrent_same_key_compiles_once() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new().with_delay(Duration::from_millis(50)));
    let reporter = Arc::new(RecordingReporter::new());
    let cache = mock_cache(&temp_dir, Arc::clone(&backend)).with_reporter(reporter.clone());
    let request = RenderRequest::from_raw(PictureKind::Equation, r"\sum_{i=1}^n i").unwrap();

    let outcomes: Vec<RenderOutcome> = thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| cache.render(&request).unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(backend.compile_count(), 1);
    let rendered = outcomes
        .iter()
        .filter(|o| matches!(o, RenderOutcome::Rendered(_)))
        .count();
    assert_eq!(rendered, 1);
    let path = request.key().png_path(cache.root());
    assert!(outcomes.iter().all(|o| o.path() == Some(path.as_path())));

    let hits = reporter
        .events()
        .iter()
        .filter(|e| matches!(e, ReportEvent::CacheHit { .. }))
        .count();
    assert_eq!(hits, 7);
}

// =============================================================================
// Test 6: Batch of mixed snippets
// =============================================================================

#[test]
fn test_batch_mixed_results() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new());
    let cache = mock_cache(&temp_dir, Arc::clone(&backend));

    let sources = ["a+b", "c+d", "a+b", "e^f", "c+d"];
    let requests: Vec<_> = sources
        .iter()
        .map(|s| RenderRequest::from_raw(PictureKind::Equation, s).unwrap())
        .collect();

    let results = render_batch(&cache, &requests, 4);
    let summary = BatchSummary::from_results(&results);
    assert_eq!(summary.rendered, 3);
    assert_eq!(summary.cached, 2);
    assert!(summary.all_succeeded());
    assert_eq!(backend.compile_count(), 3);

    // Second build: everything is a hit
    let summary = BatchSummary::from_results(&render_batch(&cache, &requests, 4));
    assert_eq!(summary.cached, 5);
    assert_eq!(backend.compile_count(), 3);
}

// =============================================================================
// Test 7: Entry paths depend only on normalized text
// =============================================================================

#[test]
fn test_entity_encoded_source_hits_decoded_entry() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new());
    let cache = mock_cache(&temp_dir, Arc::clone(&backend));

    let encoded = RenderRequest::from_raw(PictureKind::Equation, r"\(a &lt; b\)").unwrap();
    let decoded = RenderRequest::new(
        PictureKind::Equation,
        normalize(PictureKind::Equation, r"\(a < b\)").unwrap(),
    );

    cache.render(&encoded).unwrap();
    assert!(matches!(cache.render(&decoded).unwrap(), RenderOutcome::Cached(_)));
    assert_eq!(backend.compile_count(), 1);
}
