//! Wildcard statement patterns, used both as query arguments and as cache keys.

use super::{statement::Statement, term::Term};

/// A wildcard query over statements.
///
/// `None` in the subject, predicate or object slot matches any value. An
/// empty context list matches any context; otherwise a statement matches when
/// its context equals one of the listed entries, where `None` stands for the
/// default graph. The context list is kept sorted and de-duplicated so that
/// two patterns naming the same contexts in a different order are equal and
/// hash identically.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StatementPattern {
    subject: Option<Term>,
    predicate: Option<Term>,
    object: Option<Term>,
    inferred: bool,
    contexts: Vec<Option<Term>>,
}

impl StatementPattern {
    /// Match every explicit statement.
    pub fn any() -> Self {
        Self {
            subject: None,
            predicate: None,
            object: None,
            inferred: false,
            contexts: Vec::new(),
        }
    }

    /// Build a pattern from all of its parts at once.
    pub fn new(
        subject: Option<Term>,
        predicate: Option<Term>,
        object: Option<Term>,
        inferred: bool,
        contexts: impl IntoIterator<Item = Option<Term>>,
    ) -> Self {
        let mut pattern = Self {
            subject,
            predicate,
            object,
            inferred,
            contexts: contexts.into_iter().collect(),
        };
        pattern.normalize_contexts();
        pattern
    }

    /// The pattern whose single match is `statement`.
    pub fn exact(statement: &Statement) -> Self {
        Self {
            subject: Some(statement.subject.clone()),
            predicate: Some(statement.predicate.clone()),
            object: Some(statement.object.clone()),
            inferred: statement.inferred,
            contexts: vec![statement.context.clone()],
        }
    }

    pub fn subject(mut self, subject: impl Into<Term>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn predicate(mut self, predicate: impl Into<Term>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    pub fn object(mut self, object: impl Into<Term>) -> Self {
        self.object = Some(object.into());
        self
    }

    /// Restrict to a named graph. May be called repeatedly to widen the set.
    pub fn context(mut self, context: impl Into<Term>) -> Self {
        self.contexts.push(Some(context.into()));
        self.normalize_contexts();
        self
    }

    /// Restrict to the default graph (may be combined with named graphs).
    pub fn default_context(mut self) -> Self {
        self.contexts.push(None);
        self.normalize_contexts();
        self
    }

    pub fn inferred(mut self, inferred: bool) -> Self {
        self.inferred = inferred;
        self
    }

    pub fn subject_term(&self) -> Option<&Term> {
        self.subject.as_ref()
    }

    pub fn predicate_term(&self) -> Option<&Term> {
        self.predicate.as_ref()
    }

    pub fn object_term(&self) -> Option<&Term> {
        self.object.as_ref()
    }

    pub fn contexts(&self) -> &[Option<Term>] {
        &self.contexts
    }

    pub fn is_inferred(&self) -> bool {
        self.inferred
    }

    /// True when subject, predicate and object are all bound.
    pub fn is_fully_bound(&self) -> bool {
        self.subject.is_some() && self.predicate.is_some() && self.object.is_some()
    }

    /// The only context this pattern accepts, if it names exactly one.
    pub fn single_context(&self) -> Option<&Option<Term>> {
        match self.contexts.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// The statement this pattern denotes when every slot is pinned to
    /// a single value.
    pub fn exact_statement(&self) -> Option<Statement> {
        let context = self.single_context()?;
        Some(Statement {
            subject: self.subject.clone()?,
            predicate: self.predicate.clone()?,
            object: self.object.clone()?,
            context: context.clone(),
            inferred: self.inferred,
        })
    }

    pub fn matches(&self, statement: &Statement) -> bool {
        statement.inferred == self.inferred
            && slot_matches(&self.subject, &statement.subject)
            && slot_matches(&self.predicate, &statement.predicate)
            && slot_matches(&self.object, &statement.object)
            && self.matches_context(&statement.context)
    }

    pub fn matches_context(&self, context: &Option<Term>) -> bool {
        self.contexts.is_empty() || self.contexts.binary_search(context).is_ok()
    }

    /// Same pattern with `inferred` as its flag.
    pub fn with_inferred(&self, inferred: bool) -> Self {
        let mut pattern = self.clone();
        pattern.inferred = inferred;
        pattern
    }

    fn normalize_contexts(&mut self) {
        self.contexts.sort();
        self.contexts.dedup();
    }
}

impl Default for StatementPattern {
    fn default() -> Self {
        Self::any()
    }
}

fn slot_matches(slot: &Option<Term>, value: &Term) -> bool {
    slot.as_ref().is_none_or(|bound| bound == value)
}
