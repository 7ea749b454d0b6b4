//! Transactional sources and their read/write views.
//!
//! A [`TransactionalSource`] pairs one backend stack with the store's shared
//! [`NamespaceStore`] and an `inferred` flag. Everything read or written
//! through it carries that flag. [`TransactionalSource::fork`] is the
//! isolation boundary: the fork's writes go to a private
//! [`SnapshotOverlay`] until [`TransactionalSource::flush`].

use std::sync::Arc;

use crate::{
    backend::{SharedBackend, StatementBackend},
    errors::TripleStoreError,
    model::{Statement, StatementPattern, Term},
    namespace::NamespaceStore,
    overlay::SnapshotOverlay,
    stream::{ContextIdStream, OrderedStream, SortKey, StatementStream},
};

#[derive(Clone)]
pub struct TransactionalSource {
    backend: SharedBackend,
    namespaces: Arc<NamespaceStore>,
    inferred: bool,
    overlay: Option<Arc<SnapshotOverlay<SharedBackend>>>,
}

impl TransactionalSource {
    pub fn new(backend: SharedBackend, namespaces: Arc<NamespaceStore>, inferred: bool) -> Self {
        Self {
            backend,
            namespaces,
            inferred,
            overlay: None,
        }
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn is_inferred(&self) -> bool {
        self.inferred
    }

    /// Whether this source is a fork with its own uncommitted view.
    pub fn is_fork(&self) -> bool {
        self.overlay.is_some()
    }

    /// A source of the same kind whose writes stay private until flushed.
    pub fn fork(&self) -> TransactionalSource {
        let overlay = Arc::new(SnapshotOverlay::new(self.backend.clone()));
        let backend: SharedBackend = overlay.clone();
        TransactionalSource {
            backend,
            namespaces: self.namespaces.clone(),
            inferred: self.inferred,
            overlay: Some(overlay),
        }
    }

    /// Push this source's writes into the backend beneath it. On a fork this
    /// applies the overlay to the parent; on a root source it commits.
    pub fn flush(&self) -> Result<(), TripleStoreError> {
        self.backend.flush_for_commit()
    }

    /// Drop a fork's uncommitted writes. No-op on a root source.
    pub fn discard(&self) {
        if let Some(overlay) = &self.overlay {
            overlay.discard();
        }
    }

    pub fn dataset(&self) -> Dataset {
        Dataset {
            backend: self.backend.clone(),
            namespaces: self.namespaces.clone(),
            inferred: self.inferred,
        }
    }

    pub fn sink(&self) -> Sink {
        Sink {
            backend: self.backend.clone(),
            namespaces: self.namespaces.clone(),
            inferred: self.inferred,
        }
    }
}

/// Read access to a source.
pub struct Dataset {
    backend: SharedBackend,
    namespaces: Arc<NamespaceStore>,
    inferred: bool,
}

impl Dataset {
    pub fn get_namespace(&self, prefix: &str) -> Option<String> {
        self.namespaces.get(prefix)
    }

    pub fn namespaces(&self) -> Vec<(String, String)> {
        self.namespaces.list()
    }

    /// Distinct named graphs, discovered lazily from a full scan.
    pub fn context_ids(&self) -> Result<ContextIdStream, TripleStoreError> {
        let all = StatementPattern::any().inferred(self.inferred);
        Ok(ContextIdStream::new(self.backend.query(&all)?))
    }

    /// Statements matching `pattern`. The pattern's inferred flag is replaced
    /// by this source's.
    pub fn statements(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError> {
        if pattern.is_inferred() == self.inferred {
            self.backend.query(pattern)
        } else {
            self.backend.query(&pattern.with_inferred(self.inferred))
        }
    }

    /// Like [`Dataset::statements`], sorted by `key`.
    pub fn ordered_statements(
        &self,
        pattern: &StatementPattern,
        key: SortKey,
    ) -> Result<StatementStream, TripleStoreError> {
        Ok(OrderedStream::new(self.statements(pattern)?, key).into_stream())
    }
}

/// Write access to a source.
pub struct Sink {
    backend: SharedBackend,
    namespaces: Arc<NamespaceStore>,
    inferred: bool,
}

impl Sink {
    fn own(&self, statement: &Statement) -> Option<Statement> {
        (statement.inferred != self.inferred).then(|| statement.clone().with_inferred(self.inferred))
    }

    pub fn approve(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        match self.own(statement) {
            Some(owned) => self.backend.add(&owned),
            None => self.backend.add(statement),
        }
    }

    pub fn deprecate(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        match self.own(statement) {
            Some(owned) => self.backend.remove(&owned),
            None => self.backend.remove(statement),
        }
    }

    /// Deprecation by loose terms is not supported; pass the full statement
    /// to [`Sink::deprecate`] instead.
    pub fn deprecate_terms(
        &self,
        subject: &Term,
        predicate: &Term,
        object: &Term,
        context: Option<&Term>,
    ) -> Result<(), TripleStoreError> {
        log::warn!(
            "deprecate by terms rejected: {subject} {predicate} {object} {}",
            context.map_or_else(|| "default graph".to_string(), ToString::to_string)
        );
        Err(TripleStoreError::unsupported(
            "deprecating by subject, predicate, object and context is not supported; \
             deprecate the full statement",
        ))
    }

    /// Remove every statement of this source in `contexts` (all when empty).
    pub fn clear(&self, contexts: &[Option<Term>]) -> Result<(), TripleStoreError> {
        self.backend.clear(self.inferred, contexts)
    }

    pub fn remove_by_query(&self, pattern: &StatementPattern) -> Result<bool, TripleStoreError> {
        self.backend.remove_by_query(&pattern.with_inferred(self.inferred))
    }

    pub fn set_namespace(&self, prefix: &str, name: &str) -> Result<(), TripleStoreError> {
        self.namespaces.set(prefix, name)
    }

    pub fn remove_namespace(&self, prefix: &str) {
        self.namespaces.remove(prefix);
    }

    pub fn clear_namespaces(&self) {
        self.namespaces.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn source(inferred: bool) -> TransactionalSource {
        TransactionalSource::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(NamespaceStore::new()),
            inferred,
        )
    }

    #[test]
    fn test_sink_stamps_inferred_flag() {
        let source = source(true);
        source
            .sink()
            .approve(&Statement::new("ex:s", "rdf:type", "ex:T"))
            .unwrap();
        let found = source
            .dataset()
            .statements(&StatementPattern::any())
            .unwrap()
            .collect_statements()
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].inferred);
    }

    #[test]
    fn test_fork_isolates_until_flush() {
        let root = source(false);
        let fork = root.fork();
        assert!(fork.is_fork());
        fork.sink().approve(&Statement::new("ex:s", "ex:p", "ex:o")).unwrap();

        let count = |s: &TransactionalSource| {
            s.dataset()
                .statements(&StatementPattern::any())
                .unwrap()
                .count_statements()
                .unwrap()
        };
        assert_eq!(count(&fork), 1);
        assert_eq!(count(&root), 0);

        fork.flush().unwrap();
        assert_eq!(count(&root), 1);
    }

    #[test]
    fn test_deprecate_terms_fails_fast() {
        let source = source(false);
        let err = source
            .sink()
            .deprecate_terms(&Term::iri("ex:s"), &Term::iri("ex:p"), &Term::iri("ex:o"), None)
            .unwrap_err();
        assert!(matches!(err, TripleStoreError::Unsupported(_)));
    }

    #[test]
    fn test_context_ids_are_distinct() {
        let source = source(false);
        let sink = source.sink();
        sink.approve(&Statement::new("ex:a", "ex:p", "ex:o").in_context("ex:g1")).unwrap();
        sink.approve(&Statement::new("ex:b", "ex:p", "ex:o").in_context("ex:g1")).unwrap();
        sink.approve(&Statement::new("ex:c", "ex:p", "ex:o").in_context("ex:g2")).unwrap();
        sink.approve(&Statement::new("ex:d", "ex:p", "ex:o")).unwrap();

        let mut contexts: Vec<Term> = source
            .dataset()
            .context_ids()
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        contexts.sort();
        assert_eq!(contexts, vec![Term::iri("ex:g1"), Term::iri("ex:g2")]);
    }

    #[test]
    fn test_namespaces_are_shared_between_views() {
        let source = source(false);
        source.sink().set_namespace("ex", "http://example.org/").unwrap();
        assert_eq!(
            source.dataset().get_namespace("ex").as_deref(),
            Some("http://example.org/")
        );
        source.sink().clear_namespaces();
        assert!(source.dataset().namespaces().is_empty());
    }
}
