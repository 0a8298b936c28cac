//! Byte-level progress callbacks. Purely cosmetic; nothing in the write path
//! depends on what an observer does.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait ProgressObserver: fmt::Debug + Send + Sync {
    /// Called after `bytes` were read from or written to `path`.
    fn on_bytes(&self, path: &Path, bytes: u64);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn on_bytes(&self, _path: &Path, _bytes: u64) {}
}

/// Emits a `trace!` per file and keeps a running total.
#[derive(Debug, Default)]
pub struct TracingProgress {
    total: AtomicU64,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl ProgressObserver for TracingProgress {
    fn on_bytes(&self, path: &Path, bytes: u64) {
        let total = self.total.fetch_add(bytes, Ordering::Relaxed) + bytes;
        tracing::trace!(path = %path.display(), bytes, total, "progress");
    }
}
