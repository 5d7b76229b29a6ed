//! Pattern types for query representation
//!
//! A pattern is a list of quads whose terms are either ground or variables.
//! Variables are identified by blank-node labels, matching the convention of
//! the JSON-LD layer that produces patterns.

use hexad_core::Term;
use std::sync::Arc;

/// A term in a pattern quad - variable or ground
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternTerm {
    /// Variable, identified by its blank-node label
    Var(Arc<str>),
    /// Ground term to be resolved through the dictionary
    Ground(Term),
}

impl PatternTerm {
    /// Create a variable term
    pub fn var(name: impl AsRef<str>) -> Self {
        PatternTerm::Var(Arc::from(name.as_ref()))
    }

    /// Create a ground term
    pub fn ground(term: Term) -> Self {
        PatternTerm::Ground(term)
    }

    /// Check if this term is a variable
    pub fn is_var(&self) -> bool {
        matches!(self, PatternTerm::Var(_))
    }

    /// Get the variable label if this is a Var term
    pub fn as_var(&self) -> Option<&Arc<str>> {
        match self {
            PatternTerm::Var(name) => Some(name),
            _ => None,
        }
    }

    /// Get the term if this is a Ground term
    pub fn as_ground(&self) -> Option<&Term> {
        match self {
            PatternTerm::Ground(term) => Some(term),
            _ => None,
        }
    }
}

/// A pattern quad
///
/// The graph label is carried for symmetry with ground quads but plays no
/// role in matching: constraints are built from (s, p, o) only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternQuad {
    /// Subject term
    pub s: PatternTerm,
    /// Predicate term
    pub p: PatternTerm,
    /// Object term
    pub o: PatternTerm,
    /// Optional graph label
    pub graph: Option<Arc<str>>,
}

impl PatternQuad {
    /// Create a new pattern quad in the default graph
    pub fn new(s: PatternTerm, p: PatternTerm, o: PatternTerm) -> Self {
        Self {
            s,
            p,
            o,
            graph: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_term_accessors() {
        let var = PatternTerm::var("b0");
        let ground = PatternTerm::ground(Term::iri("http://schema.org/name"));

        assert!(var.is_var());
        assert!(!ground.is_var());
        assert_eq!(var.as_var().map(|n| n.as_ref()), Some("b0"));
        assert!(ground.as_var().is_none());
        assert!(ground.as_ground().is_some());
    }

    #[test]
    fn test_pattern_quad_default_graph() {
        let quad = PatternQuad::new(
            PatternTerm::var("s"),
            PatternTerm::ground(Term::iri("http://schema.org/name")),
            PatternTerm::var("o"),
        );
        assert!(quad.graph.is_none());
        assert!(quad.s.is_var() && !quad.p.is_var() && quad.o.is_var());
    }
}
