//! # Hexad Query
//!
//! Subgraph matching engine for the Hexad graph database.
//!
//! This crate provides:
//! - Pattern types: quads mixing ground terms and variables
//! - `ConstraintGraph`: pattern compilation, cardinality scoring, execution
//!   ordering, and dependency analysis
//! - `Cursor`: the backtracking solution iterator driven by range scans
//!   over the hexastore indexes
//!
//! ## Quick Start
//!
//! ```ignore
//! use hexad_query::{query, PatternQuad, PatternTerm};
//!
//! let snapshot = store.snapshot()?;
//! let pattern = [PatternQuad::new(
//!     PatternTerm::var("who"),
//!     PatternTerm::ground(Term::iri("http://schema.org/name")),
//!     PatternTerm::ground(Term::literal("Jane Doe")),
//! )];
//! let mut cursor = query(snapshot.as_ref(), &pattern, None, None)?;
//! while let Some(assignment) = cursor.next(None)? {
//!     // one solution per iteration, lexicographic order
//! }
//! ```

pub mod constraint;
pub mod cursor;
pub mod error;
pub mod graph;
pub mod pattern;
pub mod variable;

// Re-exports
pub use constraint::{Constraint, DualLink, Place, Slot};
pub use cursor::{Assignment, Cursor};
pub use error::{QueryError, Result};
pub use graph::ConstraintGraph;
pub use pattern::{PatternQuad, PatternTerm};
pub use variable::Variable;

use hexad_core::kv::KvSnapshot;
use hexad_core::Term;

/// Compile a pattern and open a cursor over it in one step
pub fn query<'a>(
    kv: &'a dyn KvSnapshot,
    pattern: &[PatternQuad],
    domain: Option<&[&str]>,
    start: Option<&[Term]>,
) -> Result<Cursor<'a>> {
    let graph = ConstraintGraph::build(kv, pattern)?;
    Cursor::open(kv, graph, domain, start)
}
