//! Store façade: one explicit and one inferred source over a shared
//! namespace table, plus optional evaluation statistics.

use std::sync::Arc;

use crate::{
    backend::{SharedBackend, StatementBackend},
    errors::TripleStoreError,
    model::StatementPattern,
    namespace::NamespaceStore,
    source::{Dataset, Sink, TransactionalSource},
    statistics::EvaluationStatistics,
};

pub struct TripleStore {
    explicit: TransactionalSource,
    inferred: TransactionalSource,
    namespaces: Arc<NamespaceStore>,
    statistics: Option<Arc<EvaluationStatistics>>,
}

impl TripleStore {
    /// Wrap two fully decorated backend stacks. `statistics`, when given,
    /// must be the instance those stacks feed.
    pub fn new(
        explicit: SharedBackend,
        inferred: SharedBackend,
        statistics: Option<Arc<EvaluationStatistics>>,
    ) -> Self {
        let namespaces = Arc::new(NamespaceStore::new());
        Self {
            explicit: TransactionalSource::new(explicit, namespaces.clone(), false),
            inferred: TransactionalSource::new(inferred, namespaces.clone(), true),
            namespaces,
            statistics,
        }
    }

    pub fn explicit(&self) -> &TransactionalSource {
        &self.explicit
    }

    pub fn inferred(&self) -> &TransactionalSource {
        &self.inferred
    }

    pub fn source(&self, inferred: bool) -> &TransactionalSource {
        if inferred {
            &self.inferred
        } else {
            &self.explicit
        }
    }

    pub fn namespaces(&self) -> &Arc<NamespaceStore> {
        &self.namespaces
    }

    pub fn statistics(&self) -> Option<&Arc<EvaluationStatistics>> {
        self.statistics.as_ref()
    }

    /// Start a read-committed transaction over both sources.
    pub fn begin(&self) -> StoreTransaction {
        StoreTransaction {
            explicit: self.explicit.fork(),
            inferred: self.inferred.fork(),
            root_explicit: self.explicit.clone(),
            root_inferred: self.inferred.clone(),
        }
    }

    /// Estimated matches for `pattern`. Uses the statistics when installed,
    /// otherwise counts the matches.
    pub fn cardinality(&self, pattern: &StatementPattern) -> Result<f64, TripleStoreError> {
        match &self.statistics {
            Some(statistics) => Ok(statistics.cardinality(pattern)),
            None => {
                let count = self
                    .source(pattern.is_inferred())
                    .dataset()
                    .statements(pattern)?
                    .count_statements()?;
                Ok(count as f64)
            }
        }
    }

    /// Explicit plus inferred statement count.
    pub fn size(&self) -> Result<u64, TripleStoreError> {
        Ok(self.explicit.backend().estimated_size()? + self.inferred.backend().estimated_size()?)
    }

    /// Recount the statistics from the committed contents of both sources.
    pub fn rebuild_statistics(&self) -> Result<(), TripleStoreError> {
        let Some(statistics) = &self.statistics else {
            return Ok(());
        };
        let explicit = self.explicit.backend().query(&StatementPattern::any())?;
        let inferred = self
            .inferred
            .backend()
            .query(&StatementPattern::any().inferred(true))?;
        statistics.rebuild(explicit.chain(inferred))
    }

    /// Durably persist everything committed so far.
    pub fn flush(&self) -> Result<(), TripleStoreError> {
        self.explicit.flush()?;
        self.inferred.flush()
    }
}

/// Forks of both sources. Dropping a transaction without committing
/// discards its writes.
pub struct StoreTransaction {
    explicit: TransactionalSource,
    inferred: TransactionalSource,
    root_explicit: TransactionalSource,
    root_inferred: TransactionalSource,
}

impl StoreTransaction {
    pub fn source(&self, inferred: bool) -> &TransactionalSource {
        if inferred {
            &self.inferred
        } else {
            &self.explicit
        }
    }

    pub fn dataset(&self, inferred: bool) -> Dataset {
        self.source(inferred).dataset()
    }

    pub fn sink(&self, inferred: bool) -> Sink {
        self.source(inferred).sink()
    }

    /// Apply both forks to the store and persist.
    ///
    /// Not atomic across the two sources: if the inferred fork fails to
    /// apply, the explicit half has already reached the store and is
    /// persisted by the next flush. The error is returned before either root
    /// is flushed, and whatever the failed fork still held is discarded.
    pub fn commit(self) -> Result<(), TripleStoreError> {
        if let Err(err) = self.explicit.flush() {
            self.explicit.discard();
            self.inferred.discard();
            return Err(err);
        }
        if let Err(err) = self.inferred.flush() {
            self.inferred.discard();
            return Err(err);
        }
        self.root_explicit.flush()?;
        self.root_inferred.flush()
    }

    pub fn rollback(self) {
        self.explicit.discard();
        self.inferred.discard();
    }
}
