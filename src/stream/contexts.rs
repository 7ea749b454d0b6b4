use ahash::AHashSet;

use crate::{errors::TripleStoreError, model::Term};

use super::StatementStream;

/// Lazily enumerates the distinct named graphs seen in a statement stream.
///
/// Each `next()` pulls from the source until an unseen context turns up;
/// statements in the default graph are skipped.
pub struct ContextIdStream {
    source: StatementStream,
    seen: AHashSet<Term>,
}

impl ContextIdStream {
    pub fn new(source: StatementStream) -> Self {
        Self {
            source,
            seen: AHashSet::new(),
        }
    }

    pub fn close(&mut self) {
        self.source.close();
    }
}

impl Iterator for ContextIdStream {
    type Item = Result<Term, TripleStoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let statement = match self.source.next()? {
                Ok(statement) => statement,
                Err(err) => return Some(Err(err)),
            };
            if let Some(context) = statement.context {
                if self.seen.insert(context.clone()) {
                    return Some(Ok(context));
                }
            }
        }
    }
}
