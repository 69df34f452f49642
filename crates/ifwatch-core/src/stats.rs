use std::sync::atomic::{AtomicI64, Ordering};

/// Read-only diagnostics counters maintained by the event loop
#[derive(Debug, Default)]
pub struct WatcherStats {
    live: AtomicI64,
}

impl WatcherStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of watchers currently admitted and not yet removed
    pub fn live_watchers(&self) -> i64 {
        self.live.load(Ordering::Relaxed)
    }

    pub(crate) fn watcher_added(&self) {
        self.live.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn watcher_removed(&self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}
