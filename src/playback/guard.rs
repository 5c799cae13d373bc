//! Single-flight guard for the shared playback surface.
//!
//! Every selection takes a token. Starting a new selection, for the same or a
//! different video, invalidates all earlier tokens; only the newest holder may
//! touch the surface.

use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct SelectionGuard {
    latest: Arc<Mutex<u64>>,
}

impl SelectionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersedes every outstanding token and returns a fresh one
    pub fn begin(&self, video_id: &str) -> SelectionToken {
        let mut latest = lock(&self.latest);
        *latest += 1;
        tracing::debug!("selection #{} started for {}", *latest, video_id);
        SelectionToken {
            value: *latest,
            latest: Arc::clone(&self.latest),
        }
    }
}

#[derive(Debug)]
pub struct SelectionToken {
    value: u64,
    latest: Arc<Mutex<u64>>,
}

impl SelectionToken {
    pub fn is_current(&self) -> bool {
        *lock(&self.latest) == self.value
    }

    /// Runs `action` only while this token is still the newest.
    ///
    /// The guard stays locked for the duration of `action`, so no newer
    /// selection can start halfway through a surface update.
    pub fn run_if_current<T>(&self, action: impl FnOnce() -> T) -> Option<T> {
        let latest = lock(&self.latest);
        if *latest != self.value {
            return None;
        }
        let result = action();
        drop(latest);
        Some(result)
    }
}

fn lock(latest: &Mutex<u64>) -> MutexGuard<'_, u64> {
    latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
