//! Whole-store in-memory snapshot cache.
//!
//! [`FullSnapshotCache`] keeps at most one copy of every explicit and inferred
//! statement of its backend and answers non-point queries by filtering that
//! copy. Building the copy is abandoned when the [`MemoryProbe`] reports too
//! little headroom; the cache then falls through to the backend and waits a
//! number of queries before trying again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::{
    backend::StatementBackend,
    cache::CacheStats,
    config::CacheConfig,
    errors::TripleStoreError,
    model::{Statement, StatementPattern, Term},
    stream::StatementStream,
};

/// Reports how much memory a snapshot build may still use.
pub trait MemoryProbe: Send + Sync {
    /// Remaining bytes, given that the running build already holds
    /// `in_flight_bytes`.
    fn headroom(&self, in_flight_bytes: u64) -> u64;
}

/// Fixed byte budget, less whatever the running build already holds.
#[derive(Clone, Copy, Debug)]
pub struct BudgetProbe {
    budget_bytes: u64,
}

impl BudgetProbe {
    pub fn new(budget_bytes: u64) -> Self {
        Self { budget_bytes }
    }

    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self::new(cfg.snapshot_memory_budget_bytes)
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }
}

impl MemoryProbe for BudgetProbe {
    fn headroom(&self, in_flight_bytes: u64) -> u64 {
        self.budget_bytes.saturating_sub(in_flight_bytes)
    }
}

type Snapshot = Arc<Vec<Statement>>;

pub struct FullSnapshotCache<B> {
    backend: B,
    snapshot: ArcSwapOption<Vec<Statement>>,
    /// Bumped by every write; a build only installs if it is unchanged.
    generation: Mutex<u64>,
    backoff: AtomicU32,
    probe: Arc<dyn MemoryProbe>,
    threshold_bytes: u64,
    min_statements: usize,
    check_interval: usize,
    backoff_calls: u32,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    low_memory_aborts: AtomicU64,
}

impl<B: StatementBackend> FullSnapshotCache<B> {
    pub fn new(backend: B, cfg: &CacheConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            backend,
            snapshot: ArcSwapOption::empty(),
            generation: Mutex::new(0),
            backoff: AtomicU32::new(0),
            probe,
            threshold_bytes: cfg.low_memory_threshold_bytes,
            min_statements: cfg.low_memory_min_statements,
            check_interval: cfg.low_memory_check_interval.max(1),
            backoff_calls: cfg.low_memory_backoff_calls,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            low_memory_aborts: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.load().is_some()
    }

    /// Number of snapshot builds abandoned for lack of memory.
    pub fn low_memory_aborts(&self) -> u64 {
        self.low_memory_aborts.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.snapshot.load_full().map_or(0, |s| s.len()),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Drop the snapshot; the next eligible query rebuilds it.
    pub fn invalidate(&self) {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.snapshot.store(None);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    fn after_write<T>(&self, result: Result<T, TripleStoreError>) -> Result<T, TripleStoreError> {
        self.invalidate();
        result
    }

    fn current_snapshot(&self) -> Result<Option<Snapshot>, TripleStoreError> {
        if let Some(snapshot) = self.snapshot.load_full() {
            return Ok(Some(snapshot));
        }
        let backing_off = self
            .backoff
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if backing_off {
            return Ok(None);
        }

        let generation = *self.generation.lock();
        let Some(statements) = self.build()? else {
            return Ok(None);
        };
        let snapshot = Arc::new(statements);
        let current = self.generation.lock();
        if *current != generation {
            return Ok(None);
        }
        self.snapshot.store(Some(snapshot.clone()));
        log::debug!("full snapshot: built with {} statements", snapshot.len());
        Ok(Some(snapshot))
    }

    /// Read the whole backend, or `None` if memory ran low on the way.
    fn build(&self) -> Result<Option<Vec<Statement>>, TripleStoreError> {
        let mut statements = Vec::new();
        let mut in_flight: u64 = 0;
        for inferred in [false, true] {
            let stream = self
                .backend
                .query(&StatementPattern::any().inferred(inferred))?;
            for item in stream {
                let statement = item?;
                in_flight += statement.approximate_size() as u64;
                statements.push(statement);

                let read = statements.len();
                if read >= self.min_statements
                    && read % self.check_interval == 0
                    && self.probe.headroom(in_flight) < self.threshold_bytes
                {
                    self.backoff.store(self.backoff_calls, Ordering::Release);
                    self.low_memory_aborts.fetch_add(1, Ordering::Relaxed);
                    log::debug!(
                        "full snapshot: low memory after {read} statements, \
                         skipping the next {} builds",
                        self.backoff_calls
                    );
                    return Ok(None);
                }
            }
        }
        Ok(Some(statements))
    }
}

impl<B: StatementBackend> StatementBackend for FullSnapshotCache<B> {
    fn init(&self) -> Result<(), TripleStoreError> {
        self.backend.init()
    }

    fn add(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        self.after_write(self.backend.add(statement))
    }

    fn remove(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        self.after_write(self.backend.remove(statement))
    }

    fn add_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        self.after_write(self.backend.add_all(statements))
    }

    fn remove_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        self.after_write(self.backend.remove_all(statements))
    }

    fn query(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError> {
        if pattern.is_fully_bound() {
            return self.backend.query(pattern);
        }
        match self.current_snapshot()? {
            Some(snapshot) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(StatementStream::from_shared(snapshot).filter_pattern(pattern.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.backend.query(pattern)
            }
        }
    }

    fn flush_for_reading(&self) -> Result<(), TripleStoreError> {
        self.backend.flush_for_reading()
    }

    fn flush_for_commit(&self) -> Result<(), TripleStoreError> {
        self.after_write(self.backend.flush_for_commit())
    }

    fn clear(&self, inferred: bool, contexts: &[Option<Term>]) -> Result<(), TripleStoreError> {
        self.after_write(self.backend.clear(inferred, contexts))
    }

    fn remove_by_query(&self, pattern: &StatementPattern) -> Result<bool, TripleStoreError> {
        self.after_write(self.backend.remove_by_query(pattern))
    }

    fn estimated_size(&self) -> Result<u64, TripleStoreError> {
        match self.snapshot.load_full() {
            Some(snapshot) => Ok(snapshot.len() as u64),
            None => self.backend.estimated_size(),
        }
    }
}
