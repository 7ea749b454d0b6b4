//! Batching decorator for writes.
//!
//! Same-direction writes (a run of adds or a run of removes) are queued and
//! forwarded as one batch; a change of direction, any read, and every other
//! operation flushes the queue first. Callers therefore observe adds and
//! removes in the order they issued them, while bulk loads still batch.

use parking_lot::Mutex;

use crate::{
    backend::StatementBackend,
    errors::TripleStoreError,
    model::{Statement, StatementPattern, Term},
    stream::StatementStream,
};

#[derive(Default)]
struct Pending {
    to_add: Vec<Statement>,
    to_remove: Vec<Statement>,
}

pub struct WriteBuffer<B> {
    backend: B,
    pending: Mutex<Pending>,
}

impl<B: StatementBackend> WriteBuffer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            pending: Mutex::new(Pending::default()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn pending_len(&self) -> usize {
        let pending = self.pending.lock();
        pending.to_add.len() + pending.to_remove.len()
    }

    /// Forward everything queued to the backend and make it readable.
    pub fn flush(&self) -> Result<(), TripleStoreError> {
        let mut pending = self.pending.lock();
        self.flush_locked(&mut pending)
    }

    fn flush_locked(&self, pending: &mut Pending) -> Result<(), TripleStoreError> {
        if pending.to_add.is_empty() && pending.to_remove.is_empty() {
            return Ok(());
        }
        log::trace!(
            "write buffer flush: {} additions, {} removals",
            pending.to_add.len(),
            pending.to_remove.len()
        );
        // A batch stays queued until the backend accepts it.
        if !pending.to_add.is_empty() {
            self.backend.add_all(&pending.to_add)?;
            pending.to_add.clear();
        }
        if !pending.to_remove.is_empty() {
            self.backend.remove_all(&pending.to_remove)?;
            pending.to_remove.clear();
        }
        self.backend.flush_for_reading()
    }
}

impl<B: StatementBackend> StatementBackend for WriteBuffer<B> {
    fn init(&self) -> Result<(), TripleStoreError> {
        self.backend.init()
    }

    fn add(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        let mut pending = self.pending.lock();
        if !pending.to_remove.is_empty() {
            self.flush_locked(&mut pending)?;
        }
        pending.to_add.push(statement.clone());
        Ok(())
    }

    fn remove(&self, statement: &Statement) -> Result<(), TripleStoreError> {
        let mut pending = self.pending.lock();
        if !pending.to_add.is_empty() {
            self.flush_locked(&mut pending)?;
        }
        pending.to_remove.push(statement.clone());
        Ok(())
    }

    fn add_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        let mut pending = self.pending.lock();
        if !pending.to_remove.is_empty() {
            self.flush_locked(&mut pending)?;
        }
        pending.to_add.extend_from_slice(statements);
        Ok(())
    }

    fn remove_all(&self, statements: &[Statement]) -> Result<(), TripleStoreError> {
        let mut pending = self.pending.lock();
        if !pending.to_add.is_empty() {
            self.flush_locked(&mut pending)?;
        }
        pending.to_remove.extend_from_slice(statements);
        Ok(())
    }

    fn query(&self, pattern: &StatementPattern) -> Result<StatementStream, TripleStoreError> {
        self.flush()?;
        self.backend.query(pattern)
    }

    fn flush_for_reading(&self) -> Result<(), TripleStoreError> {
        self.flush()
    }

    fn flush_for_commit(&self) -> Result<(), TripleStoreError> {
        self.flush()?;
        self.backend.flush_for_commit()
    }

    fn clear(&self, inferred: bool, contexts: &[Option<Term>]) -> Result<(), TripleStoreError> {
        self.flush()?;
        self.backend.clear(inferred, contexts)
    }

    fn remove_by_query(&self, pattern: &StatementPattern) -> Result<bool, TripleStoreError> {
        self.flush()?;
        self.backend.remove_by_query(pattern)
    }

    fn estimated_size(&self) -> Result<u64, TripleStoreError> {
        self.flush()?;
        self.backend.estimated_size()
    }
}
