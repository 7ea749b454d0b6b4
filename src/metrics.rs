use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counters kept by the concrete backends.
#[derive(Default)]
pub struct BackendMetrics {
    queries: AtomicU64,
    adds: AtomicU64,
    removes: AtomicU64,
    read_flushes: AtomicU64,
    commit_flushes: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendMetricsSnapshot {
    pub query_count: u64,
    pub add_count: u64,
    pub remove_count: u64,
    pub read_flush_count: u64,
    pub commit_flush_count: u64,
}

impl BackendMetrics {
    pub fn snapshot(&self) -> BackendMetricsSnapshot {
        BackendMetricsSnapshot {
            query_count: self.queries.load(Ordering::Relaxed),
            add_count: self.adds.load(Ordering::Relaxed),
            remove_count: self.removes.load(Ordering::Relaxed),
            read_flush_count: self.read_flushes.load(Ordering::Relaxed),
            commit_flush_count: self.commit_flushes.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.queries.store(0, Ordering::Relaxed);
        self.adds.store(0, Ordering::Relaxed);
        self.removes.store(0, Ordering::Relaxed);
        self.read_flushes.store(0, Ordering::Relaxed);
        self.commit_flushes.store(0, Ordering::Relaxed);
    }

    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_add(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_flush(&self) {
        self.read_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit_flush(&self) {
        self.commit_flushes.fetch_add(1, Ordering::Relaxed);
    }
}
