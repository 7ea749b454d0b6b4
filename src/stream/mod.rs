//! Lazy, closeable statement streams.
//!
//! Every query in the stack answers with a [`StatementStream`]. A stream owns
//! whatever it reads from (backend cursors, cache buffers, snapshot handles)
//! and releases it exactly once: on explicit [`StatementStream::close`], on
//! exhaustion, or on drop, whichever comes first.

mod contexts;
mod filter;
mod ordered;

use std::sync::Arc;

pub use contexts::ContextIdStream;
pub use filter::FilterStream;
pub use ordered::{OrderedStream, SortKey};

use crate::{errors::TripleStoreError, model::Statement};

pub type StatementResult = Result<Statement, TripleStoreError>;

/// The producer behind a [`StatementStream`].
///
/// `close` is called at most once by the owning stream.
pub trait StreamSource: Send {
    fn next_statement(&mut self) -> Option<StatementResult>;

    fn close(&mut self) {}
}

/// Owned lazy statement iterator with idempotent close.
pub struct StatementStream {
    source: Box<dyn StreamSource>,
    closed: bool,
}

impl StatementStream {
    pub fn from_source<S: StreamSource + 'static>(source: S) -> Self {
        Self {
            source: Box::new(source),
            closed: false,
        }
    }

    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn once(statement: Statement) -> Self {
        Self::from_vec(vec![statement])
    }

    pub fn from_vec(statements: Vec<Statement>) -> Self {
        Self::from_source(VecSource {
            inner: statements.into_iter(),
        })
    }

    /// Replay a shared, immutable statement list without copying it up front.
    pub fn from_shared(statements: Arc<Vec<Statement>>) -> Self {
        Self::from_source(SharedSource {
            statements,
            position: 0,
        })
    }

    /// Adapt any sendable iterator of results.
    pub fn from_results<I>(results: I) -> Self
    where
        I: Iterator<Item = StatementResult> + Send + 'static,
    {
        Self::from_source(IterSource { inner: results })
    }

    /// Keep only statements matching `pattern`.
    pub fn filter_pattern(self, pattern: crate::model::StatementPattern) -> Self {
        Self::from_source(FilterStream::new(self, pattern))
    }

    /// Release the underlying source. Calling this more than once is a no-op.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.source.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drain into a vector, stopping at the first error.
    pub fn collect_statements(mut self) -> Result<Vec<Statement>, TripleStoreError> {
        let mut statements = Vec::new();
        for item in self.by_ref() {
            statements.push(item?);
        }
        Ok(statements)
    }

    /// Drain and count, stopping at the first error.
    pub fn count_statements(mut self) -> Result<usize, TripleStoreError> {
        let mut count = 0;
        for item in self.by_ref() {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

impl Iterator for StatementStream {
    type Item = StatementResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        let item = self.source.next_statement();
        if item.is_none() {
            self.close();
        }
        item
    }
}

impl Drop for StatementStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl FromIterator<Statement> for StatementStream {
    fn from_iter<T: IntoIterator<Item = Statement>>(iter: T) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

struct VecSource {
    inner: std::vec::IntoIter<Statement>,
}

impl StreamSource for VecSource {
    fn next_statement(&mut self) -> Option<StatementResult> {
        self.inner.next().map(Ok)
    }
}

struct SharedSource {
    statements: Arc<Vec<Statement>>,
    position: usize,
}

impl StreamSource for SharedSource {
    fn next_statement(&mut self) -> Option<StatementResult> {
        let statement = self.statements.get(self.position)?.clone();
        self.position += 1;
        Some(Ok(statement))
    }
}

struct IterSource<I> {
    inner: I,
}

impl<I> StreamSource for IterSource<I>
where
    I: Iterator<Item = StatementResult> + Send,
{
    fn next_statement(&mut self) -> Option<StatementResult> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        remaining: usize,
        closes: Arc<AtomicUsize>,
    }

    impl StreamSource for CountingSource {
        fn next_statement(&mut self) -> Option<StatementResult> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(Ok(Statement::new("ex:s", "ex:p", "ex:o")))
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut stream = StatementStream::from_source(CountingSource {
            remaining: 3,
            closes: closes.clone(),
        });
        assert!(stream.next().is_some());
        stream.close();
        stream.close();
        assert!(stream.next().is_none());
        drop(stream);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exhaustion_closes_source() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut stream = StatementStream::from_source(CountingSource {
            remaining: 2,
            closes: closes.clone(),
        });
        assert_eq!(stream.by_ref().count(), 2);
        assert!(stream.is_closed());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases_unfinished_stream() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let mut stream = StatementStream::from_source(CountingSource {
                remaining: 10,
                closes: closes.clone(),
            });
            stream.next();
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_replay() {
        let shared = Arc::new(vec![
            Statement::new("ex:a", "ex:p", "ex:o"),
            Statement::new("ex:b", "ex:p", "ex:o"),
        ]);
        let first = StatementStream::from_shared(shared.clone()).collect_statements().unwrap();
        let second = StatementStream::from_shared(shared).collect_statements().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_results_stream_surfaces_errors() {
        let results = vec![
            Ok(Statement::new("ex:a", "ex:p", "ex:o")),
            Err(TripleStoreError::storage("cursor lost")),
            Ok(Statement::new("ex:b", "ex:p", "ex:o")),
        ];
        let mut stream = StatementStream::from_results(results.into_iter());
        assert!(matches!(stream.next(), Some(Ok(_))));
        assert!(matches!(stream.next(), Some(Err(TripleStoreError::StorageError(_)))));

        let stream = StatementStream::from_results(
            vec![Err(TripleStoreError::storage("cursor lost"))].into_iter(),
        );
        assert!(stream.collect_statements().is_err());
    }
}
