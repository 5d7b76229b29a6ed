//! RDF terms and ground quads
//!
//! A [`Term`] is an IRI, a literal (value + optional language tag + optional
//! datatype IRI), or a blank node qualified by the content hash of the
//! dataset it was stored from. Blank nodes arriving at ingest carry an empty
//! dataset qualifier; the ingest path rewrites them to their dataset's hash
//! so that blank nodes from different datasets never collide.
//!
//! ## Canonical bytes
//!
//! Every term has a canonical byte form used as its dictionary key:
//!
//! | Kind    | Form                                  |
//! |---------|---------------------------------------|
//! | IRI     | `<iri>`                               |
//! | Literal | `"escaped"`, `"escaped"@lang`, `"escaped"^^<dt>` |
//! | Blank   | `_:{dataset}#{label}`                 |
//!
//! The leading byte disambiguates the three kinds, so distinct terms never
//! share a key.
//!
//! All string payloads are `Arc<str>` so clones are cheap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// An RDF term as stored in (or resolved against) the dictionary
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    /// An IRI
    Iri(Arc<str>),
    /// A literal with optional language tag and datatype IRI
    Literal {
        /// Lexical value
        value: Arc<str>,
        /// Language tag (e.g. "en"), mutually exclusive with `datatype` in
        /// well-formed RDF but not enforced here
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<Arc<str>>,
        /// Datatype IRI
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<Arc<str>>,
    },
    /// A blank node, qualified by its dataset's content hash once stored.
    /// An empty `dataset` means "local to the document being ingested".
    Blank {
        /// Content hash of the owning dataset (empty until ingested)
        dataset: Arc<str>,
        /// Canonical blank node label (e.g. "_:c14n0" stripped to "c14n0")
        label: Arc<str>,
    },
}

impl Term {
    /// Create an IRI term
    pub fn iri(iri: impl AsRef<str>) -> Self {
        Term::Iri(Arc::from(iri.as_ref()))
    }

    /// Create a plain string literal
    pub fn literal(value: impl AsRef<str>) -> Self {
        Term::Literal {
            value: Arc::from(value.as_ref()),
            language: None,
            datatype: None,
        }
    }

    /// Create a language-tagged literal
    pub fn literal_lang(value: impl AsRef<str>, language: impl AsRef<str>) -> Self {
        Term::Literal {
            value: Arc::from(value.as_ref()),
            language: Some(Arc::from(language.as_ref())),
            datatype: None,
        }
    }

    /// Create a typed literal
    pub fn literal_typed(value: impl AsRef<str>, datatype: impl AsRef<str>) -> Self {
        Term::Literal {
            value: Arc::from(value.as_ref()),
            language: None,
            datatype: Some(Arc::from(datatype.as_ref())),
        }
    }

    /// Create an unqualified blank node (as it appears in an ingest document)
    pub fn blank(label: impl AsRef<str>) -> Self {
        Term::Blank {
            dataset: Arc::from(""),
            label: Arc::from(label.as_ref()),
        }
    }

    /// Create a blank node qualified by its dataset hash
    pub fn qualified_blank(dataset: impl AsRef<str>, label: impl AsRef<str>) -> Self {
        Term::Blank {
            dataset: Arc::from(dataset.as_ref()),
            label: Arc::from(label.as_ref()),
        }
    }

    /// Check if this term is a blank node
    pub fn is_blank(&self) -> bool {
        matches!(self, Term::Blank { .. })
    }

    /// Canonical byte form, used as the dictionary key
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_string().into_bytes()
    }

    /// Canonical string form (N-Quads style)
    pub fn canonical_string(&self) -> String {
        match self {
            Term::Iri(iri) => format!("<{}>", iri),
            Term::Literal {
                value,
                language,
                datatype,
            } => {
                let mut out = format!("\"{}\"", escape_literal(value));
                if let Some(lang) = language {
                    out.push('@');
                    out.push_str(lang);
                } else if let Some(dt) = datatype {
                    out.push_str("^^<");
                    out.push_str(dt);
                    out.push('>');
                }
                out
            }
            Term::Blank { dataset, label } => format!("_:{}#{}", dataset, label),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "{}", iri),
            Term::Literal { value, .. } => write!(f, "{}", value),
            Term::Blank { dataset, label } => {
                if dataset.is_empty() {
                    write!(f, "_:{}", label)
                } else {
                    write!(f, "_:{}#{}", dataset, label)
                }
            }
        }
    }
}

/// Escape a literal value for the canonical form (N-Quads escaping)
fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// A ground quad, as produced by an external normalizer
///
/// The graph component is a label (`None` = the default graph); it is carried
/// into provenance records but plays no role in index keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quad {
    /// Subject term
    pub s: Term,
    /// Predicate term
    pub p: Term,
    /// Object term
    pub o: Term,
    /// Graph label, `None` for the default graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<Arc<str>>,
}

impl Quad {
    /// Create a quad in the default graph
    pub fn new(s: Term, p: Term, o: Term) -> Self {
        Self {
            s,
            p,
            o,
            graph: None,
        }
    }

    /// Create a quad in a named graph
    pub fn in_graph(s: Term, p: Term, o: Term, graph: impl AsRef<str>) -> Self {
        Self {
            s,
            p,
            o,
            graph: Some(Arc::from(graph.as_ref())),
        }
    }
}
