//! Failure injection for the mock backend.

use std::sync::atomic::{AtomicU32, Ordering};

/// What the mock does when asked to compile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MockBehavior {
    /// Write a PDF, then a PNG
    #[default]
    Succeed,
    /// Run but leave no PDF, with an error in `figure.log`
    NoPdf,
    /// Report that no compiler could be found
    CompilerMissing,
    /// Compile, but leave no PNG after rasterizing
    NoPng,
}

/// Behavior that applies for a limited number of calls.
#[derive(Debug)]
pub struct FailureInjector {
    behavior: MockBehavior,
    /// Remaining calls before falling back to success (None = always)
    remaining: Option<AtomicU32>,
}

impl FailureInjector {
    pub fn always(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            remaining: None,
        }
    }

    /// Misbehave `count` times, then succeed.
    pub fn times(behavior: MockBehavior, count: u32) -> Self {
        Self {
            behavior,
            remaining: Some(AtomicU32::new(count)),
        }
    }

    /// Behavior for the next call.
    pub fn next(&self) -> MockBehavior {
        match &self.remaining {
            None => self.behavior,
            Some(remaining) => {
                let taken = remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if taken {
                    self.behavior
                } else {
                    MockBehavior::Succeed
                }
            }
        }
    }
}
