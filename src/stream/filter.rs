use crate::model::StatementPattern;

use super::{StatementResult, StatementStream, StreamSource};

/// Lazily drops statements that do not match a pattern.
///
/// Errors from the wrapped stream pass through untouched.
pub struct FilterStream {
    inner: StatementStream,
    pattern: StatementPattern,
}

impl FilterStream {
    pub fn new(inner: StatementStream, pattern: StatementPattern) -> Self {
        Self { inner, pattern }
    }
}

impl StreamSource for FilterStream {
    fn next_statement(&mut self) -> Option<StatementResult> {
        loop {
            match self.inner.next()? {
                Ok(statement) if self.pattern.matches(&statement) => return Some(Ok(statement)),
                Ok(_) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
