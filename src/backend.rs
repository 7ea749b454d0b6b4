//! Storage backend contract.
//!
//! A backend owns one logical statement set and is the only place statements
//! are durably stored. Every decorator in this crate (overlay, write buffer,
//! caches, statistics) is itself a [`StatementBackend`] wrapping another one,
//! so stacks compose freely. Concrete engines live in the submodules.

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use std::sync::Arc;

use crate::{
    errors::TripleStoreError,
    model::{Statement, StatementPattern, Term},
    stream::StatementStream,
};

/// Capability every pluggable storage engine implements.
///
/// Not-found is never an error: an empty stream, `false` or zero says so.
/// Statements visible before [`flush_for_reading`](Self::flush_for_reading)
/// stay visible after it; no ordering of query results is guaranteed.
/// Implementations serialize their own mutation if they need to.
pub trait StatementBackend: Send + Sync {
    fn init(&self) -> Result<(), TripleStoreError> {
        Ok(())
    }

    fn add(&self, statement: &Statement) -> Result<(), TripleStoreError>;

    fn remove(&self, statement: &Statement) -> Result<(), TripleStoreError>;

    fn add_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        for statement in statements {
            self.add(statement)?;
        }
        Ok(())
    }

    fn remove_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        for statement in statements {
            self.remove(statement)?;
        }
        Ok(())
    }

    fn query(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError>;

    /// Make prior writes visible to subsequent reads on this backend.
    fn flush_for_reading(&self) -> Result<(), TripleStoreError>;

    /// Durably persist prior writes.
    fn flush_for_commit(&self) -> Result<(), TripleStoreError>;

    /// Remove every statement with the given inferred flag in `contexts`
    /// (all contexts when empty).
    fn clear(&self, inferred: bool, contexts: &[Option<Term>]) -> Result<(), TripleStoreError> {
        let pattern = StatementPattern::new(None, None, None, inferred, contexts.iter().cloned());
        self.remove_by_query(&pattern).map(|_| ())
    }

    /// Remove every match of `pattern`; reports whether anything matched.
    fn remove_by_query(&self, pattern: &StatementPattern) -> Result<bool, TripleStoreError> {
        // Collect first: removing while a cursor is open is not part of the contract.
        let matches = self.query(pattern)?.collect_statements()?;
        for statement in &matches {
            self.remove(statement)?;
        }
        Ok(!matches.is_empty())
    }

    /// Explicit plus inferred statement count. The default scans everything;
    /// engines that can do better should override it.
    fn estimated_size(&self) -> Result<u64, TripleStoreError> {
        let explicit = self.query(&StatementPattern::any())?.count_statements()?;
        let inferred = self
            .query(&StatementPattern::any().inferred(true))?
            .count_statements()?;
        Ok((explicit + inferred) as u64)
    }
}

/// Shared handle to a type-erased backend stack.
pub type SharedBackend = Arc<dyn StatementBackend>;

impl<B> StatementBackend for Arc<B>
where
    B: StatementBackend + ?Sized,
{
    fn init(&self) -> Result<(), TripleStoreError> {
        (**self).init()
    }

    fn add(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        (**self).add(statement)
    }

    fn remove(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        (**self).remove(statement)
    }

    fn add_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        (**self).add_all(statements)
    }

    fn remove_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        (**self).remove_all(statements)
    }

    fn query(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError> {
        (**self).query(pattern)
    }

    fn flush_for_reading(&self) -> Result<(), TripleStoreError> {
        (**self).flush_for_reading()
    }

    fn flush_for_commit(&self) -> Result<(), TripleStoreError> {
        (**self).flush_for_commit()
    }

    fn clear(&self, inferred: bool, contexts: &[Option<Term>]) -> Result<(), TripleStoreError> {
        (**self).clear(inferred, contexts)
    }

    fn remove_by_query(&self, pattern: &StatementPattern) -> Result<bool, TripleStoreError> {
        (**self).remove_by_query(pattern)
    }

    fn estimated_size(&self) -> Result<u64, TripleStoreError> {
        (**self).estimated_size()
    }
}

impl<B> StatementBackend for Box<B>
where
    B: StatementBackend + ?Sized,
{
    fn init(&self) -> Result<(), TripleStoreError> {
        (**self).init()
    }

    fn add(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        (**self).add(statement)
    }

    fn remove(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        (**self).remove(statement)
    }

    fn add_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        (**self).add_all(statements)
    }

    fn remove_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        (**self).remove_all(statements)
    }

    fn query(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError> {
        (**self).query(pattern)
    }

    fn flush_for_reading(&self) -> Result<(), TripleStoreError> {
        (**self).flush_for_reading()
    }

    fn flush_for_commit(&self) -> Result<(), TripleStoreError> {
        (**self).flush_for_commit()
    }

    fn clear(&self, inferred: bool, contexts: &[Option<Term>]) -> Result<(), TripleStoreError> {
        (**self).clear(inferred, contexts)
    }

    fn remove_by_query(&self, pattern: &StatementPattern) -> Result<bool, TripleStoreError> {
        (**self).remove_by_query(pattern)
    }

    fn estimated_size(&self) -> Result<u64, TripleStoreError> {
        (**self).estimated_size()
    }
}
