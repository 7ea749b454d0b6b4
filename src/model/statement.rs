use std::fmt;

use serde::{Deserialize, Serialize};

use super::term::Term;

/// An immutable graph statement.
///
/// `context == None` places the statement in the default graph. The
/// `inferred` flag is part of the statement's identity: an asserted and an
/// inferred copy of the same triple are distinct statements.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub context: Option<Term>,
    pub inferred: bool,
}

impl Statement {
    /// Create an explicit statement in the default graph.
    pub fn new(subject: impl Into<Term>, predicate: impl Into<Term>, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            context: None,
            inferred: false,
        }
    }

    /// Place the statement in a named graph.
    pub fn in_context(mut self, context: impl Into<Term>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Mark the statement as inferred.
    pub fn inferred(mut self) -> Self {
        self.inferred = true;
        self
    }

    pub fn with_inferred(mut self, inferred: bool) -> Self {
        self.inferred = inferred;
        self
    }

    /// Approximate heap footprint, used for memory accounting in caches.
    pub fn approximate_size(&self) -> usize {
        self.subject.approximate_size()
            + self.predicate.approximate_size()
            + self.object.approximate_size()
            + self.context.as_ref().map_or(0, Term::approximate_size)
            + std::mem::size_of::<bool>()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}", self.subject, self.predicate, self.object)?;
        if let Some(context) = &self.context {
            write!(f, ", {context}")?;
        }
        if self.inferred {
            write!(f, ") [inferred]")
        } else {
            write!(f, ")")
        }
    }
}
