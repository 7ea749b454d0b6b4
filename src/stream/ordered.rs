use crate::{errors::TripleStoreError, model::Statement};

use super::{StatementResult, StatementStream, StreamSource};

/// Statement component an [`OrderedStream`] sorts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SortKey {
    Subject,
    Predicate,
    Object,
    Context,
}

impl SortKey {
    /// String form the ordering compares. The default graph sorts first.
    pub fn key_of(self, statement: &Statement) -> String {
        match self {
            SortKey::Subject => statement.subject.to_string(),
            SortKey::Predicate => statement.predicate.to_string(),
            SortKey::Object => statement.object.to_string(),
            SortKey::Context => statement
                .context
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

/// Materializes its source on first pull and replays it sorted by one
/// component.
///
/// The source is fully drained and closed before the first item is returned,
/// so callers get merge-join-ready ordering from backends that provide none.
pub struct OrderedStream {
    source: Option<StatementStream>,
    key: SortKey,
    sorted: Option<std::vec::IntoIter<Statement>>,
}

impl OrderedStream {
    pub fn new(source: StatementStream, key: SortKey) -> Self {
        Self {
            source: Some(source),
            key,
            sorted: None,
        }
    }

    pub fn into_stream(self) -> StatementStream {
        StatementStream::from_source(self)
    }

    fn materialize(&mut self) -> Result<(), TripleStoreError> {
        let Some(mut source) = self.source.take() else {
            return Ok(());
        };
        let mut buffer = Vec::new();
        let drained: Result<(), TripleStoreError> = source.by_ref().try_for_each(|item| {
            buffer.push(item?);
            Ok(())
        });
        source.close();
        drained?;

        let key = self.key;
        buffer.sort_by_cached_key(|statement| key.key_of(statement));
        self.sorted = Some(buffer.into_iter());
        Ok(())
    }
}

impl StreamSource for OrderedStream {
    fn next_statement(&mut self) -> Option<StatementResult> {
        if self.sorted.is_none() {
            if let Err(err) = self.materialize() {
                self.sorted = Some(Vec::new().into_iter());
                return Some(Err(err));
            }
        }
        self.sorted.as_mut()?.next().map(Ok)
    }

    fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        self.sorted = None;
    }
}
