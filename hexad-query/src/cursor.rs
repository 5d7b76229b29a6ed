//! Backtracking cursor over a constraint graph
//!
//! The cursor enumerates solutions in lexicographic order of the variables'
//! values taken in execution order. Advancement protocol:
//!
//! 1. The first `next` solves forward from position 0.
//! 2. Later calls advance the pivot variable (default: the deepest) past
//!    its current value.
//! 3. A new value at position `i` propagates into every dual constraint
//!    owned by `i` whose partner sorts later, invalidates every position in
//!    `Out[i]`, and solving continues at the lowest unbound position.
//! 4. Exhaustion at `i` clears it and resumes at `max(In[i])`; with no
//!    dependencies left, the cursor is done.
//!
//! A cursor owns its graph and reads through a single store snapshot; it is
//! single-threaded and never writes.

use crate::constraint::DualLink;
use crate::error::{QueryError, Result};
use crate::graph::ConstraintGraph;
use hexad_core::dict::Dictionary;
use hexad_core::key::TermId;
use hexad_core::kv::KvSnapshot;
use hexad_core::Term;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// One emitted solution: a term per exposed variable, in execution order
pub type Assignment = Vec<(Arc<str>, Term)>;

/// Solution iterator over a compiled pattern
pub struct Cursor<'a> {
    kv: &'a dyn KvSnapshot,
    graph: ConstraintGraph,
    /// Exposed variable positions, ascending execution order
    domain: Vec<usize>,
    domain_names: Vec<Arc<str>>,
    initialized: bool,
    done: bool,
    /// Materialization cache for emitted identifiers
    terms: FxHashMap<TermId, Term>,
}

impl<'a> Cursor<'a> {
    /// Open a cursor over a graph.
    ///
    /// `domain` restricts which variables appear in emitted assignments
    /// (default: all of them). `start` gives an initial candidate value per
    /// domain variable; iteration resumes at the first solution whose
    /// values are at or after that point. A start term unknown to the
    /// dictionary means the resume point is beyond everything stored, so
    /// the cursor is empty.
    pub fn open(
        kv: &'a dyn KvSnapshot,
        mut graph: ConstraintGraph,
        domain: Option<&[&str]>,
        start: Option<&[Term]>,
    ) -> Result<Self> {
        let mut done = graph.is_unsatisfiable() || graph.is_empty();

        let mut positions: Vec<usize> = match domain {
            Some(names) => names
                .iter()
                .map(|name| {
                    graph
                        .position(name)
                        .ok_or_else(|| QueryError::VariableNotFound((*name).to_string()))
                })
                .collect::<Result<_>>()?,
            None => (0..graph.len()).collect(),
        };

        if let Some(start) = start {
            if domain.is_none() {
                return Err(QueryError::InvalidQuery(
                    "a starting index requires an explicit domain".into(),
                ));
            }
            if start.len() != positions.len() {
                return Err(QueryError::InvalidQuery(format!(
                    "starting index has {} values for {} domain variables",
                    start.len(),
                    positions.len()
                )));
            }
            let dict = Dictionary::new(kv);
            for (&position, term) in positions.iter().zip(start) {
                match dict.lookup(term)? {
                    Some(entry) => graph.variable_mut(position).origin = entry.id,
                    None => {
                        tracing::debug!(term = %term, "starting index term not stored");
                        done = true;
                    }
                }
            }
        }

        positions.sort_unstable();
        positions.dedup();
        let domain_names: Vec<Arc<str>> = positions
            .iter()
            .map(|&p| graph.variable(p).name.clone())
            .collect();

        tracing::debug!(
            variables = graph.len(),
            domain = domain_names.len(),
            satisfiable = !done,
            "opened cursor"
        );

        Ok(Self {
            kv,
            graph,
            domain: positions,
            domain_names,
            initialized: false,
            done,
            terms: FxHashMap::default(),
        })
    }

    /// Exposed variable names, in execution order
    pub fn domain(&self) -> &[Arc<str>] {
        &self.domain_names
    }

    /// Produce the next solution, or `None` when the enumeration ends.
    ///
    /// `pivot` forces advancement to start at the named variable, skipping
    /// the remaining combinations of everything that sorts after it.
    pub fn next(&mut self, pivot: Option<&str>) -> Result<Option<Assignment>> {
        if self.done {
            return Ok(None);
        }
        let last = self.graph.len() - 1;
        let mut position = if !self.initialized {
            self.initialized = true;
            0
        } else {
            match pivot {
                Some(name) => self
                    .graph
                    .position(name)
                    .ok_or_else(|| QueryError::VariableNotFound(name.to_string()))?,
                None => last,
            }
        };

        loop {
            let advanced = self.graph.variable_mut(position).advance(self.kv)?;
            match advanced {
                Some(value) => {
                    self.bind(position, value)?;
                    match self.next_unbound(position + 1) {
                        Some(unbound) => position = unbound,
                        None => return Ok(Some(self.assignment()?)),
                    }
                }
                None => {
                    self.graph.variable_mut(position).clear();
                    match self.graph.in_deps(position).last().copied() {
                        Some(dependency) => position = dependency,
                        None => {
                            self.done = true;
                            return Ok(None);
                        }
                    }
                }
            }
        }
    }

    /// Current binding of a variable, materialized through the dictionary
    pub fn get(&mut self, name: &str) -> Result<Option<Term>> {
        let position = self
            .graph
            .position(name)
            .ok_or_else(|| QueryError::VariableNotFound(name.to_string()))?;
        match self.graph.variable(position).value {
            Some(id) => Ok(Some(self.lookup_term(id)?)),
            None => Ok(None),
        }
    }

    /// Stop the enumeration and release the cursor
    pub fn close(self) {
        tracing::debug!("closed cursor");
    }

    /// Record a binding: set the value, push it into the duals of later
    /// variables, and invalidate everything downstream of this position
    fn bind(&mut self, position: usize, value: TermId) -> Result<()> {
        self.graph.variable_mut(position).value = Some(value);

        let links: Vec<DualLink> = self
            .graph
            .variable(position)
            .d2
            .iter()
            .filter_map(|c| c.dual)
            .filter(|link| link.var > position)
            .collect();
        for link in links {
            self.graph.dual_mut(link)?.fill(value)?;
        }

        for dependent in self.graph.out_deps(position).to_vec() {
            self.graph.variable_mut(dependent).clear();
        }
        Ok(())
    }

    /// Lowest unbound position at or after `from`
    fn next_unbound(&self, from: usize) -> Option<usize> {
        (from..self.graph.len()).find(|&p| self.graph.variable(p).value.is_none())
    }

    /// Materialize the current solution over the domain
    fn assignment(&mut self) -> Result<Assignment> {
        let mut out = Vec::with_capacity(self.domain.len());
        for i in 0..self.domain.len() {
            let position = self.domain[i];
            let name = self.graph.variable(position).name.clone();
            let id = self.graph.variable(position).value.ok_or_else(|| {
                QueryError::Internal(format!("emitting with unbound variable {}", name))
            })?;
            let term = self.lookup_term(id)?;
            out.push((name, term));
        }
        Ok(out)
    }

    fn lookup_term(&mut self, id: TermId) -> Result<Term> {
        if let Some(term) = self.terms.get(&id) {
            return Ok(term.clone());
        }
        let term = Dictionary::new(self.kv).term(id)?.ok_or_else(|| {
            QueryError::Core(hexad_core::Error::corrupt(format!(
                "no stored term for identifier {}",
                id
            )))
        })?;
        self.terms.insert(id, term.clone());
        Ok(term)
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("domain", &self.domain_names)
            .field("initialized", &self.initialized)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
