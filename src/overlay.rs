//! Read-committed isolation overlay.
//!
//! A [`SnapshotOverlay`] gives one transaction a private copy-on-write view of
//! a shared backend: writes land in in-memory `added`/`removed` sets that only
//! this overlay sees, and reads merge those sets over the backend's committed
//! state. Nothing reaches the backend until [`StatementBackend::flush_for_commit`].

use std::sync::Arc;

use ahash::AHashSet;
use parking_lot::RwLock;

use crate::{
    backend::StatementBackend,
    errors::TripleStoreError,
    model::{Statement, StatementPattern},
    stream::{StatementResult, StatementStream, StreamSource},
};

type StatementSet = Arc<AHashSet<Statement>>;

#[derive(Default)]
struct OverlayState {
    added: StatementSet,
    removed: StatementSet,
}

pub struct SnapshotOverlay<B> {
    backend: B,
    state: RwLock<OverlayState>,
}

impl<B: StatementBackend> SnapshotOverlay<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: RwLock::new(OverlayState::default()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of uncommitted additions.
    pub fn pending_additions(&self) -> usize {
        self.state.read().added.len()
    }

    /// Number of uncommitted removals.
    pub fn pending_removals(&self) -> usize {
        self.state.read().removed.len()
    }

    /// Drop every uncommitted change.
    pub fn discard(&self) {
        let mut state = self.state.write();
        state.added = StatementSet::default();
        state.removed = StatementSet::default();
    }
}

impl<B: StatementBackend> StatementBackend for SnapshotOverlay<B> {
    fn add(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        let mut state = self.state.write();
        Arc::make_mut(&mut state.added).insert(statement.clone());
        if state.removed.contains(statement) {
            Arc::make_mut(&mut state.removed).remove(statement);
        }
        Ok(())
    }

    fn remove(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        let mut state = self.state.write();
        Arc::make_mut(&mut state.removed).insert(statement.clone());
        // Keeps `added` and `removed` disjoint, so the exact-match path below
        // cannot resurrect a statement removed after being added.
        if state.added.contains(statement) {
            Arc::make_mut(&mut state.added).remove(statement);
        }
        Ok(())
    }

    fn query(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError> {
        let (added, removed) = {
            let state = self.state.read();
            (state.added.clone(), state.removed.clone())
        };

        if let Some(exact) = pattern.exact_statement() {
            if added.contains(&exact) {
                return Ok(StatementStream::once(exact));
            }
            if removed.contains(&exact) {
                return Ok(StatementStream::empty());
            }
            return self.backend.query(pattern);
        }

        let local: Vec<Statement> = added
            .iter()
            .filter(|statement| pattern.matches(statement) && !removed.contains(*statement))
            .cloned()
            .collect();
        let backend = self.backend.query(pattern)?;
        Ok(StatementStream::from_source(OverlayScan {
            local: local.into_iter(),
            backend: Some(backend),
            added,
            removed,
        }))
    }

    fn flush_for_reading(&self) -> Result<(), TripleStoreError> {
        Ok(())
    }

    fn flush_for_commit(&self) -> Result<(), TripleStoreError> {
        let (added, removed) = {
            let mut state = self.state.write();
            (
                std::mem::take(&mut state.added),
                std::mem::take(&mut state.removed),
            )
        };
        let additions: Vec<Statement> = added
            .iter()
            .filter(|statement| !removed.contains(*statement))
            .cloned()
            .collect();
        let removals: Vec<Statement> = removed.iter().cloned().collect();

        log::trace!(
            "overlay commit: {} additions, {} removals",
            additions.len(),
            removals.len()
        );
        self.backend.add_all(&additions)?;
        self.backend.remove_all(&removals)?;
        self.backend.flush_for_reading()
    }

    fn estimated_size(&self) -> Result<u64, TripleStoreError> {
        let state = self.state.read();
        let base = self.backend.estimated_size()?;
        Ok((base + state.added.len() as u64).saturating_sub(state.removed.len() as u64))
    }
}

/// Local additions first, then the backend's matches minus anything the
/// overlay added (already yielded) or removed.
struct OverlayScan {
    local: std::vec::IntoIter<Statement>,
    backend: Option<StatementStream>,
    added: StatementSet,
    removed: StatementSet,
}

impl StreamSource for OverlayScan {
    fn next_statement(&mut self) -> Option<StatementResult> {
        if let Some(statement) = self.local.next() {
            return Some(Ok(statement));
        }
        let backend = self.backend.as_mut()?;
        loop {
            match backend.next()? {
                Ok(statement)
                    if self.added.contains(&statement) || self.removed.contains(&statement) =>
                {
                    continue;
                }
                other => return Some(other),
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn statement(subject: &str) -> Statement {
        Statement::new(subject, "ex:p", "ex:o")
    }

    #[test]
    fn test_writes_stay_private_until_commit() {
        let backend = Arc::new(MemoryBackend::with_statements(vec![statement("ex:a")]));
        let overlay = SnapshotOverlay::new(backend.clone());

        overlay.add(&statement("ex:b")).unwrap();
        overlay.remove(&statement("ex:a")).unwrap();

        let visible = overlay
            .query(&StatementPattern::any())
            .unwrap()
            .collect_statements()
            .unwrap();
        assert_eq!(visible, vec![statement("ex:b")]);
        assert!(backend.contains(&statement("ex:a")));
        assert!(!backend.contains(&statement("ex:b")));

        overlay.flush_for_commit().unwrap();
        assert!(!backend.contains(&statement("ex:a")));
        assert!(backend.contains(&statement("ex:b")));
        assert_eq!(overlay.pending_additions(), 0);
        assert_eq!(overlay.pending_removals(), 0);
    }

    #[test]
    fn test_remove_after_add_hides_exact_match() {
        let overlay = SnapshotOverlay::new(MemoryBackend::new());
        let target = statement("ex:s");
        overlay.add(&target).unwrap();
        overlay.remove(&target).unwrap();

        let exact = overlay
            .query(&StatementPattern::exact(&target))
            .unwrap()
            .count_statements()
            .unwrap();
        assert_eq!(exact, 0);
        let wildcard = overlay
            .query(&StatementPattern::any())
            .unwrap()
            .count_statements()
            .unwrap();
        assert_eq!(wildcard, 0);
    }

    #[test]
    fn test_added_statement_already_in_backend_is_yielded_once() {
        let backend = MemoryBackend::with_statements(vec![statement("ex:a")]);
        let overlay = SnapshotOverlay::new(backend);
        overlay.add(&statement("ex:a")).unwrap();
        let count = overlay
            .query(&StatementPattern::any())
            .unwrap()
            .count_statements()
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_discard_rolls_back() {
        let backend = Arc::new(MemoryBackend::new());
        let overlay = SnapshotOverlay::new(backend.clone());
        overlay.add(&statement("ex:a")).unwrap();
        overlay.discard();
        overlay.flush_for_commit().unwrap();
        assert!(backend.is_empty());
    }
}
