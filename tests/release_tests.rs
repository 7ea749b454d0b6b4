use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use triplestack::stream::StatementResult;
use triplestack::{
    CacheConfig, PatternResultCache, SnapshotOverlay, Statement, StatementBackend,
    StatementPattern, StatementStream, StreamSource, TripleStoreError,
};

struct TrackedSource {
    items: std::vec::IntoIter<Statement>,
    closes: Arc<AtomicUsize>,
}

impl StreamSource for TrackedSource {
    fn next_statement(&mut self) -> Option<StatementResult> {
        self.items.next().map(Ok)
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Read-only engine counting how often its cursors are released.
struct TrackingBackend {
    statements: Vec<Statement>,
    queries: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl TrackingBackend {
    fn new(count: usize) -> Self {
        Self {
            statements: (0..count)
                .map(|i| Statement::new(format!("ex:s{i}"), "ex:p", "ex:o"))
                .collect(),
            queries: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl StatementBackend for TrackingBackend {
    fn add(&self, _statement: &Statement) -> Result<(), TripleStoreError> {
        Ok(())
    }

    fn remove(&self, _statement: &Statement) -> Result<(), TripleStoreError> {
        Ok(())
    }

    fn query(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let matching: Vec<Statement> = self
            .statements
            .iter()
            .filter(|statement| pattern.matches(statement))
            .cloned()
            .collect();
        Ok(StatementStream::from_source(TrackedSource {
            items: matching.into_iter(),
            closes: self.closes.clone(),
        }))
    }

    fn flush_for_reading(&self) -> Result<(), TripleStoreError> {
        Ok(())
    }

    fn flush_for_commit(&self) -> Result<(), TripleStoreError> {
        Ok(())
    }
}

#[test]
fn test_overlay_partial_read_releases_backend_cursor_once() {
    let backend = TrackingBackend::new(5);
    let closes = backend.closes.clone();
    let overlay = SnapshotOverlay::new(backend);
    overlay.add(&Statement::new("ex:local", "ex:p", "ex:o")).unwrap();

    let mut stream = overlay.query(&StatementPattern::any()).unwrap();
    assert!(stream.next().is_some());
    assert!(stream.next().is_some());
    assert_eq!(closes.load(Ordering::SeqCst), 0);

    stream.close();
    stream.close();
    drop(stream);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_overlay_dropped_stream_releases_backend_cursor() {
    let backend = TrackingBackend::new(3);
    let closes = backend.closes.clone();
    let overlay = SnapshotOverlay::new(backend);

    let mut stream = overlay.query(&StatementPattern::any()).unwrap();
    assert!(stream.next().is_some());
    drop(stream);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pattern_cache_releases_backend_cursor_once() {
    let backend = TrackingBackend::new(4);
    let closes = backend.closes.clone();
    let queries = backend.queries.clone();
    let cache = PatternResultCache::new(backend, &CacheConfig::default());
    let pattern = StatementPattern::any().predicate("ex:p");

    let mut partial = cache.query(&pattern).unwrap();
    assert!(partial.next().is_some());
    partial.close();
    partial.close();
    drop(partial);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().entries, 0);

    assert_eq!(cache.query(&pattern).unwrap().count_statements().unwrap(), 4);
    assert_eq!(closes.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().entries, 1);

    let mut hit = cache.query(&pattern).unwrap();
    assert!(hit.next().is_some());
    hit.close();
    drop(hit);
    assert_eq!(closes.load(Ordering::SeqCst), 2);
    assert_eq!(queries.load(Ordering::SeqCst), 2);
}
