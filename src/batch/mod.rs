//! Parallel rendering of independent requests
//!
//! Requests are pulled from a shared index by a fixed number of scoped
//! worker threads. Results are returned in input order; the order in which
//! renders actually run is unspecified. One request failing never stops the
//! others.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use serde::Serialize;

use crate::cache::{RenderCache, RenderOutcome, RenderRequest};
use crate::driver::TexBackend;
use crate::error::RenderResult;

/// Snippet separator in batch input files.
pub const DEFAULT_SEPARATOR: &str = "----";

/// Counts of batch results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub rendered: usize,
    pub cached: usize,
    pub failed: usize,
    /// Requests aborted by a propagated error
    pub errors: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[RenderResult<RenderOutcome>]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result {
                Ok(RenderOutcome::Rendered(_)) => summary.rendered += 1,
                Ok(RenderOutcome::Cached(_)) => summary.cached += 1,
                Ok(RenderOutcome::Failed(_)) => summary.failed += 1,
                Err(_) => summary.errors += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.rendered + self.cached + self.failed + self.errors
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Render every request using up to `workers` threads.
pub fn render_batch<B: TexBackend>(
    cache: &RenderCache<B>,
    requests: &[RenderRequest],
    workers: usize,
) -> Vec<RenderResult<RenderOutcome>> {
    let workers = workers.clamp(1, requests.len().max(1));
    let next = AtomicUsize::new(0);

    tracing::debug!(requests = requests.len(), workers, "starting batch");
    let mut indexed: Vec<(usize, RenderResult<RenderOutcome>)> = thread::scope(|s| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(s.spawn(|| {
                let mut done = Vec::new();
                loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(request) = requests.get(index) else {
                        break;
                    };
                    let result = cache.render(request);
                    if let Err(e) = &result {
                        tracing::error!(key = %request.key(), error = %e, "render aborted");
                    }
                    done.push((index, result));
                }
                done
            }));
        }

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(done) => done,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
}

/// Split batch input on lines equal to `separator`, dropping blank snippets.
pub fn split_snippets<'a>(input: &'a str, separator: &str) -> Vec<&'a str> {
    let mut snippets = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in input.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == separator {
            snippets.push(&input[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    snippets.push(&input[start..]);
    snippets.retain(|s| !s.trim().is_empty());
    snippets
}
