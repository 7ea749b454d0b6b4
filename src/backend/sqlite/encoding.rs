//! Column encoding for terms. Terms are stored as their JSON form, which is
//! deterministic, so equality on the encoded text is equality on terms.

use crate::{
    errors::TripleStoreError,
    model::{Statement, Term},
};

/// Stored in place of the default graph so it participates in the primary key.
pub const DEFAULT_CONTEXT: &str = "";

pub fn encode_term(term: &Term) -> Result<String, TripleStoreError> {
    serde_json::to_string(term).map_err(|e| TripleStoreError::encoding(e.to_string()))
}

pub fn decode_term(encoded: &str) -> Result<Term, TripleStoreError> {
    serde_json::from_str(encoded).map_err(|e| TripleStoreError::encoding(e.to_string()))
}

pub fn encode_context(context: &Option<Term>) -> Result<String, TripleStoreError> {
    match context {
        Some(term) => encode_term(term),
        None => Ok(DEFAULT_CONTEXT.to_string()),
    }
}

pub fn decode_context(encoded: &str) -> Result<Option<Term>, TripleStoreError> {
    if encoded == DEFAULT_CONTEXT {
        Ok(None)
    } else {
        decode_term(encoded).map(Some)
    }
}

/// Encoded key columns in table order.
pub struct EncodedStatement {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub context: String,
    pub inferred: bool,
}

impl EncodedStatement {
    pub fn encode(statement: &Statement) -> Result<Self, TripleStoreError> {
        Ok(Self {
            subject: encode_term(&statement.subject)?,
            predicate: encode_term(&statement.predicate)?,
            object: encode_term(&statement.object)?,
            context: encode_context(&statement.context)?,
            inferred: statement.inferred,
        })
    }

    pub fn decode(self) -> Result<Statement, TripleStoreError> {
        Ok(Statement {
            subject: decode_term(&self.subject)?,
            predicate: decode_term(&self.predicate)?,
            object: decode_term(&self.object)?,
            context: decode_context(&self.context)?,
            inferred: self.inferred,
        })
    }
}
