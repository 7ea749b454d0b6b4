//! In-memory statement set.
//!
//! Writers mutate a copy-on-write state behind an `RwLock<Arc<_>>`; a query
//! clones the `Arc` and streams from it without holding the lock, so open
//! streams never block writers and writers never invalidate open streams.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::{
    errors::TripleStoreError,
    metrics::{BackendMetrics, BackendMetricsSnapshot},
    model::{Statement, StatementPattern},
    stream::{StatementResult, StatementStream, StreamSource},
};

use super::StatementBackend;

#[derive(Clone, Default)]
struct MemoryState {
    statements: Vec<Statement>,
    positions: AHashMap<Statement, usize>,
}

impl MemoryState {
    fn insert(&mut self, statement: &Statement) -> bool {
        if self.positions.contains_key(statement) {
            return false;
        }
        self.positions.insert(statement.clone(), self.statements.len());
        self.statements.push(statement.clone());
        true
    }

    fn remove(&mut self, statement: &Statement) -> bool {
        let Some(position) = self.positions.remove(statement) else {
            return false;
        };
        self.statements.swap_remove(position);
        if let Some(moved) = self.statements.get(position) {
            self.positions.insert(moved.clone(), position);
        }
        true
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<Arc<MemoryState>>,
    metrics: BackendMetrics,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-loaded with `statements`.
    pub fn with_statements<I>(statements: I) -> Self
    where
        I: IntoIterator<Item = Statement>,
    {
        let mut state = MemoryState::default();
        for statement in statements {
            state.insert(&statement);
        }
        Self {
            state: RwLock::new(Arc::new(state)),
            metrics: BackendMetrics::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, statement: &Statement) -> bool {
        self.state.read().positions.contains_key(statement)
    }

    pub fn metrics_snapshot(&self) -> BackendMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }
}

impl StatementBackend for MemoryBackend {
    fn add(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        self.metrics.record_add();
        let mut guard = self.state.write();
        Arc::make_mut(&mut guard).insert(statement);
        Ok(())
    }

    fn remove(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        self.metrics.record_remove();
        let mut guard = self.state.write();
        if guard.positions.contains_key(statement) {
            Arc::make_mut(&mut guard).remove(statement);
        }
        Ok(())
    }

    fn add_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut guard);
        for statement in statements {
            self.metrics.record_add();
            state.insert(statement);
        }
        Ok(())
    }

    fn remove_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut guard);
        for statement in statements {
            self.metrics.record_remove();
            state.remove(statement);
        }
        Ok(())
    }

    fn query(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError> {
        self.metrics.record_query();
        let state = self.state.read().clone();

        if let Some(exact) = pattern.exact_statement() {
            return Ok(if state.positions.contains_key(&exact) {
                StatementStream::once(exact)
            } else {
                StatementStream::empty()
            });
        }

        Ok(StatementStream::from_source(MemoryScan {
            state: Some(state),
            position: 0,
            pattern: pattern.clone(),
        }))
    }

    fn flush_for_reading(&self) -> Result<(), TripleStoreError> {
        self.metrics.record_read_flush();
        Ok(())
    }

    fn flush_for_commit(&self) -> Result<(), TripleStoreError> {
        self.metrics.record_commit_flush();
        Ok(())
    }

    fn remove_by_query(&self, pattern: &StatementPattern) -> Result<bool, TripleStoreError> {
        let mut guard = self.state.write();
        let matches: Vec<Statement> = guard
            .statements
            .iter()
            .filter(|statement| pattern.matches(statement))
            .cloned()
            .collect();
        if matches.is_empty() {
            return Ok(false);
        }
        let state = Arc::make_mut(&mut guard);
        for statement in &matches {
            self.metrics.record_remove();
            state.remove(statement);
        }
        Ok(true)
    }

    fn estimated_size(&self) -> Result<u64, TripleStoreError> {
        Ok(self.len() as u64)
    }
}

struct MemoryScan {
    state: Option<Arc<MemoryState>>,
    position: usize,
    pattern: StatementPattern,
}

impl StreamSource for MemoryScan {
    fn next_statement(&mut self) -> Option<StatementResult> {
        let state = self.state.as_ref()?;
        while let Some(statement) = state.statements.get(self.position) {
            self.position += 1;
            if self.pattern.matches(statement) {
                return Some(Ok(statement.clone()));
            }
        }
        None
    }

    fn close(&mut self) {
        self.state = None;
    }
}
