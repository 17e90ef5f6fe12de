//! In-process registry of cache keys currently being rendered.
//!
//! A second caller missing on the same key waits for the first to finish and
//! then re-checks the cache, so one process compiles each key once. Other
//! processes are not coordinated.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

use super::CacheKey;

#[derive(Debug, Default)]
pub struct InflightKeys {
    active: Mutex<HashSet<CacheKey>>,
    released: Condvar,
}

impl InflightKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other caller holds `key`, then hold it.
    pub fn claim(&self, key: &CacheKey) -> InflightClaim<'_> {
        let start = Instant::now();
        let mut waited = false;
        let mut active = self.lock();
        while active.contains(key) {
            waited = true;
            active = self
                .released
                .wait(active)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        active.insert(key.clone());

        if waited {
            tracing::debug!(
                key = %key,
                waited_ms = start.elapsed().as_millis() as u64,
                "waited for in-flight render"
            );
        }
        InflightClaim {
            keys: self,
            key: key.clone(),
            waited,
        }
    }

    pub fn is_active(&self, key: &CacheKey) -> bool {
        self.lock().contains(key)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<CacheKey>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Held while a key renders; released on drop.
#[derive(Debug)]
pub struct InflightClaim<'a> {
    keys: &'a InflightKeys,
    key: CacheKey,
    waited: bool,
}

impl InflightClaim<'_> {
    /// Whether another caller held the key when this claim was requested.
    pub fn waited(&self) -> bool {
        self.waited
    }
}

impl Drop for InflightClaim<'_> {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
        self.keys.released.notify_all();
    }
}
