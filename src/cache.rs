//! Pattern result cache.
//!
//! Query results are remembered per [`StatementPattern`] once a caller has
//! read a result stream to the end. Every mutating call bumps a single epoch
//! counter and clears the cache; a result whose scan started under an older
//! epoch is never stored.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::{
    backend::StatementBackend,
    config::CacheConfig,
    errors::TripleStoreError,
    model::{Statement, StatementPattern, Term},
    stream::{StatementResult, StatementStream, StreamSource},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Cached patterns, or statements held by a full snapshot.
    pub entries: usize,
    pub invalidations: u64,
}

type CachedResult = Arc<Vec<Statement>>;

struct CacheEntries {
    lru: LruCache<StatementPattern, CachedResult>,
    statements: usize,
}

struct CacheShared {
    epoch: AtomicU64,
    entries: Mutex<CacheEntries>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    max_entry_statements: usize,
    max_cached_statements: usize,
}

impl CacheShared {
    fn lookup(&self, pattern: &StatementPattern) -> Option<CachedResult> {
        let hit = self.entries.lock().lru.get(pattern).cloned();
        match hit {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }

    fn invalidate(&self) {
        let mut entries = self.entries.lock();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        entries.lru.clear();
        entries.statements = 0;
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Store a drained result if no mutation happened since `epoch`.
    fn commit(&self, pattern: StatementPattern, epoch: u64, statements: Vec<Statement>) {
        let mut entries = self.entries.lock();
        if self.epoch.load(Ordering::Acquire) != epoch {
            log::debug!("pattern cache: discarding result for {pattern:?}, epoch moved");
            return;
        }
        let size = statements.len();
        if size > self.max_cached_statements {
            return;
        }
        entries.statements += size;
        if let Some((_, replaced)) = entries.lru.push(pattern, Arc::new(statements)) {
            entries.statements -= replaced.len();
        }
        while entries.statements > self.max_cached_statements {
            match entries.lru.pop_lru() {
                Some((_, evicted)) => entries.statements -= evicted.len(),
                None => break,
            }
        }
        log::debug!(
            "pattern cache: stored {size} statements ({} entries)",
            entries.lru.len()
        );
    }
}

/// Read cache decorator keyed by query pattern.
///
/// Entries live in an LRU bounded both by entry count and by the total number
/// of cached statements. Patterns with subject, predicate and object all
/// bound are never cached.
pub struct PatternResultCache<B> {
    backend: B,
    shared: Arc<CacheShared>,
}

impl<B: StatementBackend> PatternResultCache<B> {
    pub fn new(backend: B, cfg: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(cfg.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend,
            shared: Arc::new(CacheShared {
                epoch: AtomicU64::new(0),
                entries: Mutex::new(CacheEntries {
                    lru: LruCache::new(capacity),
                    statements: 0,
                }),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                invalidations: AtomicU64::new(0),
                max_entry_statements: cfg.max_entry_statements,
                max_cached_statements: cfg.max_cached_statements,
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::Acquire)
    }

    /// Drop every entry and advance the epoch.
    pub fn invalidate(&self) {
        self.shared.invalidate();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            entries: self.shared.entries.lock().lru.len(),
            invalidations: self.shared.invalidations.load(Ordering::Relaxed),
        }
    }

    fn after_write<T>(&self, result: Result<T, TripleStoreError>) -> Result<T, TripleStoreError> {
        self.shared.invalidate();
        result
    }
}

impl<B: StatementBackend> StatementBackend for PatternResultCache<B> {
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
        if let Some(hit) = self.shared.lookup(pattern) {
            return Ok(StatementStream::from_shared(hit));
        }
        let epoch = self.shared.epoch.load(Ordering::Acquire);
        let inner = self.backend.query(pattern)?;
        Ok(StatementStream::from_source(MaterializingSource {
            inner: Some(inner),
            pattern: pattern.clone(),
            epoch,
            buffer: Some(Vec::new()),
            drained: false,
            shared: self.shared.clone(),
        }))
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
        self.backend.estimated_size()
    }
}

/// Passes the backend stream through while copying it into a side buffer.
///
/// The buffer is dropped once it outgrows the per-entry cap or the backend
/// reports an error; it is offered to the cache only if the stream was read
/// to the end.
struct MaterializingSource {
    inner: Option<StatementStream>,
    pattern: StatementPattern,
    epoch: u64,
    buffer: Option<Vec<Statement>>,
    drained: bool,
    shared: Arc<CacheShared>,
}

impl StreamSource for MaterializingSource {
    fn next_statement(&mut self) -> Option<StatementResult> {
        let inner = self.inner.as_mut()?;
        match inner.next() {
            Some(Ok(statement)) => {
                if let Some(buffer) = self.buffer.as_mut() {
                    buffer.push(statement.clone());
                    if buffer.len() > self.shared.max_entry_statements {
                        self.buffer = None;
                    }
                }
                Some(Ok(statement))
            }
            Some(Err(err)) => {
                self.buffer = None;
                Some(Err(err))
            }
            None => {
                self.drained = true;
                None
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.close();
        }
        let buffer = self.buffer.take();
        if let (true, Some(buffer)) = (self.drained, buffer) {
            let pattern = std::mem::take(&mut self.pattern);
            self.shared.commit(pattern, self.epoch, buffer);
        }
    }
}
