//! Graph terms: the opaque, identity-comparable values statements are built from.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A graph term.
///
/// Terms are cheap to clone (string payloads are reference counted) and
/// compare structurally. The [`fmt::Display`] form is the canonical string
/// form used wherever terms must be ordered textually.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Term {
    Iri(Arc<str>),
    BlankNode(Arc<str>),
    Literal {
        value: Arc<str>,
        datatype: Option<Arc<str>>,
        language: Option<Arc<str>>,
    },
}

impl Term {
    pub fn iri(value: impl AsRef<str>) -> Self {
        Term::Iri(Arc::from(value.as_ref()))
    }

    pub fn blank(id: impl AsRef<str>) -> Self {
        Term::BlankNode(Arc::from(id.as_ref()))
    }

    /// Plain literal without datatype or language tag.
    pub fn literal(value: impl AsRef<str>) -> Self {
        Term::Literal {
            value: Arc::from(value.as_ref()),
            datatype: None,
            language: None,
        }
    }

    pub fn typed_literal(value: impl AsRef<str>, datatype: impl AsRef<str>) -> Self {
        Term::Literal {
            value: Arc::from(value.as_ref()),
            datatype: Some(Arc::from(datatype.as_ref())),
            language: None,
        }
    }

    pub fn lang_literal(value: impl AsRef<str>, language: impl AsRef<str>) -> Self {
        Term::Literal {
            value: Arc::from(value.as_ref()),
            datatype: None,
            language: Some(Arc::from(language.as_ref())),
        }
    }

    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    /// The lexical value without any decoration.
    pub fn value(&self) -> &str {
        match self {
            Term::Iri(value) | Term::BlankNode(value) => value,
            Term::Literal { value, .. } => value,
        }
    }

    /// Approximate heap footprint, used for memory accounting in caches.
    pub fn approximate_size(&self) -> usize {
        let payload = match self {
            Term::Iri(value) | Term::BlankNode(value) => value.len(),
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                value.len()
                    + datatype.as_ref().map_or(0, |d| d.len())
                    + language.as_ref().map_or(0, |l| l.len())
            }
        };
        std::mem::size_of::<Term>() + payload
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(value) => write!(f, "<{value}>"),
            Term::BlankNode(id) => write!(f, "_:{id}"),
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                write!(f, "\"{}\"", value.escape_default())?;
                if let Some(language) = language {
                    write!(f, "@{language}")
                } else if let Some(datatype) = datatype {
                    write!(f, "^^<{datatype}>")
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::iri(value)
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Term::iri(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(Term::iri("ex:s").to_string(), "<ex:s>");
        assert_eq!(Term::blank("b0").to_string(), "_:b0");
        assert_eq!(Term::literal("hi").to_string(), "\"hi\"");
        assert_eq!(Term::lang_literal("hi", "en").to_string(), "\"hi\"@en");
        assert_eq!(
            Term::typed_literal("1", "xsd:int").to_string(),
            "\"1\"^^<xsd:int>"
        );
    }

    #[test]
    fn test_literal_and_iri_with_same_value_differ() {
        assert_ne!(Term::iri("x"), Term::literal("x"));
        assert_eq!(Term::iri("x").value(), Term::literal("x").value());
    }

    #[test]
    fn test_json_round_trip_is_stable() {
        let term = Term::typed_literal("42", "xsd:integer");
        let encoded = serde_json::to_string(&term).unwrap();
        let decoded: Term = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, term);
        assert_eq!(serde_json::to_string(&decoded).unwrap(), encoded);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(Term::iri("ex:s").is_iri());
        assert!(!Term::iri("ex:s").is_literal());
        assert!(Term::lang_literal("hi", "en").is_literal());
        assert!(!Term::blank("b0").is_iri());
        assert!(!Term::blank("b0").is_literal());
    }
}
