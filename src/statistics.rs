//! Cardinality estimates for the query planner.
//!
//! [`EvaluationStatistics`] counts statements into hashed buckets per
//! subject, predicate, object and context, plus two-dimensional
//! subject×predicate and predicate×object grids. Additions and removals are
//! counted separately; every estimate is `added - removed` for the bucket, so
//! it is an upper bound that can drift when the same statement is added twice
//! or a missing one is removed. [`EvaluationStatistics::staleness`] measures
//! that drift and [`EvaluationStatistics::rebuild`] resets it.

use std::sync::Arc;

use ahash::RandomState;
use parking_lot::Mutex;

use crate::{
    backend::StatementBackend,
    errors::TripleStoreError,
    model::{Statement, StatementPattern, Term},
    stream::StatementStream,
};

const SINGLE_DIMENSION_BUCKETS: usize = 1024;
const TWO_DIMENSION_BUCKETS: usize = 64;
/// Added to both sides of a staleness comparison; small stores are never
/// reported as stale.
const STALENESS_MARGIN: f64 = 500.0;

struct Counters {
    size: u64,
    subject: Vec<u64>,
    predicate: Vec<u64>,
    object: Vec<u64>,
    context: Vec<u64>,
    default_context: u64,
    subject_predicate: Vec<u64>,
    predicate_object: Vec<u64>,
}

impl Counters {
    fn new() -> Self {
        Self {
            size: 0,
            subject: vec![0; SINGLE_DIMENSION_BUCKETS],
            predicate: vec![0; SINGLE_DIMENSION_BUCKETS],
            object: vec![0; SINGLE_DIMENSION_BUCKETS],
            context: vec![0; SINGLE_DIMENSION_BUCKETS],
            default_context: 0,
            subject_predicate: vec![0; TWO_DIMENSION_BUCKETS * TWO_DIMENSION_BUCKETS],
            predicate_object: vec![0; TWO_DIMENSION_BUCKETS * TWO_DIMENSION_BUCKETS],
        }
    }

    fn record(&mut self, buckets: &Buckets) {
        self.size += 1;
        self.subject[buckets.subject] += 1;
        self.predicate[buckets.predicate] += 1;
        self.object[buckets.object] += 1;
        match buckets.context {
            Some(context) => self.context[context] += 1,
            None => self.default_context += 1,
        }
        self.subject_predicate[buckets.subject_predicate] += 1;
        self.predicate_object[buckets.predicate_object] += 1;
    }
}

struct Buckets {
    subject: usize,
    predicate: usize,
    object: usize,
    context: Option<usize>,
    subject_predicate: usize,
    predicate_object: usize,
}

struct Counts {
    added: Counters,
    removed: Counters,
}

fn net(added: u64, removed: u64) -> f64 {
    added as f64 - removed as f64
}

pub struct EvaluationStatistics {
    hasher: RandomState,
    counts: Mutex<Counts>,
}

impl Default for EvaluationStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationStatistics {
    pub fn new() -> Self {
        Self {
            hasher: RandomState::with_seeds(
                0x243f_6a88_85a3_08d3,
                0x1319_8a2e_0370_7344,
                0xa409_3822_299f_31d0,
                0x082e_fa98_ec4e_6c89,
            ),
            counts: Mutex::new(Counts {
                added: Counters::new(),
                removed: Counters::new(),
            }),
        }
    }

    fn hash(&self, term: &Term) -> usize {
        self.hasher.hash_one(term) as usize
    }

    fn single(&self, term: &Term) -> usize {
        self.hash(term) % SINGLE_DIMENSION_BUCKETS
    }

    fn pair(&self, first: &Term, second: &Term) -> usize {
        (self.hash(first) % TWO_DIMENSION_BUCKETS) * TWO_DIMENSION_BUCKETS
            + self.hash(second) % TWO_DIMENSION_BUCKETS
    }

    fn buckets(&self, statement: &Statement) -> Buckets {
        Buckets {
            subject: self.single(&statement.subject),
            predicate: self.single(&statement.predicate),
            object: self.single(&statement.object),
            context: statement.context.as_ref().map(|c| self.single(c)),
            subject_predicate: self.pair(&statement.subject, &statement.predicate),
            predicate_object: self.pair(&statement.predicate, &statement.object),
        }
    }

    pub fn record_added(&self, statement: &Statement) {
        let buckets = self.buckets(statement);
        self.counts.lock().added.record(&buckets);
    }

    pub fn record_removed(&self, statement: &Statement) {
        let buckets = self.buckets(statement);
        self.counts.lock().removed.record(&buckets);
    }

    /// Forget everything counted so far.
    pub fn reset(&self) {
        let mut counts = self.counts.lock();
        counts.added = Counters::new();
        counts.removed = Counters::new();
    }

    /// Reset, then count `statements` as the current contents.
    pub fn rebuild<I>(&self, statements: I) -> Result<(), TripleStoreError>
    where
        I: IntoIterator<Item = Result<Statement, TripleStoreError>>,
    {
        let mut fresh = Counters::new();
        for statement in statements {
            fresh.record(&self.buckets(&statement?));
        }
        let mut counts = self.counts.lock();
        counts.added = fresh;
        counts.removed = Counters::new();
        log::debug!("evaluation statistics rebuilt: {} statements", counts.added.size);
        Ok(())
    }

    /// Estimated number of statements.
    pub fn estimated_size(&self) -> f64 {
        let counts = self.counts.lock();
        net(counts.added.size, counts.removed.size).max(0.0)
    }

    /// Estimated number of statements matching `pattern`.
    pub fn cardinality(&self, pattern: &StatementPattern) -> f64 {
        let subject = pattern.subject_term().map(|t| self.single(t));
        let predicate = pattern.predicate_term().map(|t| self.single(t));
        let object = pattern.object_term().map(|t| self.single(t));
        let context = pattern
            .single_context()
            .map(|c| c.as_ref().map(|t| self.single(t)));
        let subject_predicate = match (pattern.subject_term(), pattern.predicate_term()) {
            (Some(s), Some(p)) => Some(self.pair(s, p)),
            _ => None,
        };
        let predicate_object = match (pattern.predicate_term(), pattern.object_term()) {
            (Some(p), Some(o)) => Some(self.pair(p, o)),
            _ => None,
        };

        let counts = self.counts.lock();
        let (added, removed) = (&counts.added, &counts.removed);
        let bucket = |a: &[u64], r: &[u64], i: usize| net(a[i], r[i]);

        let mut min = net(added.size, removed.size);
        if let Some(i) = subject {
            min = min.min(bucket(&added.subject, &removed.subject, i));
        }
        if let Some(i) = predicate {
            min = min.min(bucket(&added.predicate, &removed.predicate, i));
        }
        if let Some(i) = object {
            min = min.min(bucket(&added.object, &removed.object, i));
        }
        match context {
            Some(Some(i)) => min = min.min(bucket(&added.context, &removed.context, i)),
            Some(None) => min = min.min(net(added.default_context, removed.default_context)),
            None => {}
        }
        if min < 2.0 {
            return min.max(0.0);
        }

        if let Some(i) = subject_predicate {
            min = min.min(bucket(&added.subject_predicate, &removed.subject_predicate, i));
        }
        if let Some(i) = predicate_object {
            min = min.min(bucket(&added.predicate_object, &removed.predicate_object, i));
        }
        min.max(0.0)
    }

    /// Relative divergence between the estimate and an authoritative size.
    /// Zero means in sync; `1.0` means off by the whole store.
    pub fn staleness(&self, expected_size: u64) -> f64 {
        let estimated = self.estimated_size() + STALENESS_MARGIN;
        let expected = expected_size as f64 + STALENESS_MARGIN;
        let diff = (estimated - expected).abs();
        let staleness = if diff == 0.0 {
            0.0
        } else if expected > estimated {
            diff / expected
        } else {
            diff / estimated
        };
        log::debug!(
            "expected size {expected}; estimated size {estimated}; staleness {staleness}"
        );
        staleness
    }
}

/// Decorator feeding every write into shared [`EvaluationStatistics`].
///
/// Bulk removals are resolved to concrete statements first so removed
/// counts stay exact.
pub struct StatisticsBackend<B> {
    backend: B,
    statistics: Arc<EvaluationStatistics>,
}

impl<B: StatementBackend> StatisticsBackend<B> {
    pub fn new(backend: B, statistics: Arc<EvaluationStatistics>) -> Self {
        Self { backend, statistics }
    }

    pub fn statistics(&self) -> &Arc<EvaluationStatistics> {
        &self.statistics
    }

    fn remove_matching(&self, pattern: &StatementPattern) -> Result<bool, TripleStoreError> {
        let matches = self.backend.query(pattern)?.collect_statements()?;
        self.backend.remove_all(&matches)?;
        for statement in &matches {
            self.statistics.record_removed(statement);
        }
        Ok(!matches.is_empty())
    }
}

impl<B: StatementBackend> StatementBackend for StatisticsBackend<B> {
    fn init(&self) -> Result<(), TripleStoreError> {
        self.backend.init()
    }

    fn add(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        self.backend.add(statement)?;
        self.statistics.record_added(statement);
        Ok(())
    }

    fn remove(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        self.backend.remove(statement)?;
        self.statistics.record_removed(statement);
        Ok(())
    }

    fn add_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        self.backend.add_all(statements)?;
        statements
            .iter()
            .for_each(|statement| self.statistics.record_added(statement));
        Ok(())
    }

    fn remove_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        self.backend.remove_all(statements)?;
        statements
            .iter()
            .for_each(|statement| self.statistics.record_removed(statement));
        Ok(())
    }

    fn query(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError> {
        self.backend.query(pattern)
    }

    fn flush_for_reading(&self) -> Result<(), TripleStoreError> {
        self.backend.flush_for_reading()
    }

    fn flush_for_commit(&self) -> Result<(), TripleStoreError> {
        self.backend.flush_for_commit()
    }

    fn clear(&self, inferred: bool, contexts: &[Option<Term>]) -> Result<(), TripleStoreError> {
        let pattern = StatementPattern::new(None, None, None, inferred, contexts.iter().cloned());
        self.remove_matching(&pattern).map(|_| ())
    }

    fn remove_by_query(&self, pattern: &StatementPattern) -> Result<bool, TripleStoreError> {
        self.remove_matching(pattern)
    }

    fn estimated_size(&self) -> Result<u64, TripleStoreError> {
        self.backend.estimated_size()
    }
}
