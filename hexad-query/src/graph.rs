//! Constraint graph assembly
//!
//! [`ConstraintGraph::build`] compiles a pattern into per-variable constraint
//! sets, scores each variable against the store's cardinality statistics,
//! stably sorts variables ascending by score into the execution order, and
//! connects the dependency maps that drive backtracking:
//!
//! - `In[v]`: earlier positions whose bindings feed any of `v`'s constraints
//!   (transitively closed)
//! - `Out[v]`: the inversion; later positions to invalidate when `v` moves
//!
//! A pattern triple whose terms are all ground is skipped: it cannot
//! constrain any variable, and its presence in storage is not verified. A
//! triple whose terms are all variables has no ground anchor and is
//! rejected. A ground term missing from the dictionary makes the whole
//! graph unsatisfiable (zero solutions, not an error).

use crate::constraint::{Constraint, DualLink, Place, Slot};
use crate::error::{QueryError, Result};
use crate::pattern::{PatternQuad, PatternTerm};
use crate::variable::Variable;
use hexad_core::dict::{Dictionary, TermEntry};
use hexad_core::key::TermId;
use hexad_core::kv::KvSnapshot;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// A compiled pattern: variables in execution order plus dependency maps
#[derive(Debug)]
pub struct ConstraintGraph {
    vars: Vec<Variable>,
    index: FxHashMap<Arc<str>, usize>,
    in_deps: Vec<Vec<usize>>,
    out_deps: Vec<Vec<usize>>,
    unsatisfiable: bool,
}

impl ConstraintGraph {
    /// Compile a pattern against a store snapshot
    pub fn build(kv: &dyn KvSnapshot, pattern: &[PatternQuad]) -> Result<Self> {
        let mut builder = Builder {
            kv,
            vars: Vec::new(),
            index: FxHashMap::default(),
            entries: FxHashMap::default(),
            unsatisfiable: false,
        };
        for quad in pattern {
            builder.add_quad(quad)?;
        }
        builder.finish()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Check if the pattern had no variables
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Check if some ground term was unknown to the dictionary
    pub fn is_unsatisfiable(&self) -> bool {
        self.unsatisfiable
    }

    /// Execution-order position of a variable
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Variable names in execution order
    pub fn names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.vars.iter().map(|v| &v.name)
    }

    /// Variable at an execution-order position
    ///
    /// # Panics
    ///
    /// Panics if the position is out of range (indicates a bug).
    pub fn variable(&self, position: usize) -> &Variable {
        &self.vars[position]
    }

    pub(crate) fn variable_mut(&mut self, position: usize) -> &mut Variable {
        &mut self.vars[position]
    }

    /// Earlier positions this variable's constraints consume (ascending)
    pub fn in_deps(&self, position: usize) -> &[usize] {
        &self.in_deps[position]
    }

    /// Later positions depending on this variable (ascending)
    pub fn out_deps(&self, position: usize) -> &[usize] {
        &self.out_deps[position]
    }

    /// Resolve a dual link to its constraint
    pub(crate) fn dual_mut(&mut self, link: DualLink) -> Result<&mut Constraint> {
        self.vars
            .get_mut(link.var)
            .and_then(|v| v.d2.get_mut(link.constraint))
            .ok_or_else(|| {
                QueryError::Internal(format!(
                    "dangling dual link to variable {} constraint {}",
                    link.var, link.constraint
                ))
            })
    }
}

struct Builder<'a> {
    kv: &'a dyn KvSnapshot,
    vars: Vec<Variable>,
    index: FxHashMap<Arc<str>, usize>,
    /// Dictionary entries of the resolved ground terms, kept for scoring
    entries: FxHashMap<TermId, TermEntry>,
    unsatisfiable: bool,
}

impl<'a> Builder<'a> {
    fn add_quad(&mut self, quad: &PatternQuad) -> Result<()> {
        let sv = quad.s.as_var().cloned();
        let pv = quad.p.as_var().cloned();
        let ov = quad.o.as_var().cloned();

        match (sv, pv, ov) {
            // All ground: the triple is closed and constrains nothing.
            (None, None, None) => Ok(()),

            (Some(_), Some(_), Some(_)) => Err(QueryError::MalformedPattern(
                "triple with three variables has no ground anchor".into(),
            )),

            // First-degree: one variable, two ground terms in canonical order.
            (Some(s), None, None) => {
                let var = self.var_position(&s);
                if let (Some(m), Some(n)) = (self.resolve(&quad.p)?, self.resolve(&quad.o)?) {
                    self.insert_d1(var, Constraint::first_degree(Place::S, m, n));
                }
                Ok(())
            }
            (None, Some(p), None) => {
                let var = self.var_position(&p);
                if let (Some(m), Some(n)) = (self.resolve(&quad.o)?, self.resolve(&quad.s)?) {
                    self.insert_d1(var, Constraint::first_degree(Place::P, m, n));
                }
                Ok(())
            }
            (None, None, Some(o)) => {
                let var = self.var_position(&o);
                if let (Some(m), Some(n)) = (self.resolve(&quad.s)?, self.resolve(&quad.p)?) {
                    self.insert_d1(var, Constraint::first_degree(Place::O, m, n));
                }
                Ok(())
            }

            // Zero-degree reflexive: the same variable twice, one ground term.
            (Some(s), Some(p), None) if s == p => {
                let var = self.var_position(&s);
                if let Some(n) = self.resolve(&quad.o)? {
                    self.insert_dz(var, Constraint::reflexive(Place::SP, n));
                }
                Ok(())
            }
            (Some(s), None, Some(o)) if s == o => {
                let var = self.var_position(&s);
                if let Some(n) = self.resolve(&quad.p)? {
                    self.insert_dz(var, Constraint::reflexive(Place::OS, n));
                }
                Ok(())
            }
            (None, Some(p), Some(o)) if p == o => {
                let var = self.var_position(&p);
                if let Some(n) = self.resolve(&quad.s)? {
                    self.insert_dz(var, Constraint::reflexive(Place::PO, n));
                }
                Ok(())
            }

            // Second-degree: two distinct variables, cross-linked duals.
            (Some(s), Some(p), None) => {
                let u = self.var_position(&s);
                let v = self.var_position(&p);
                if let Some(o_id) = self.resolve(&quad.o)? {
                    let cu = Constraint::second_degree(Place::S, Slot::N, o_id, p.clone());
                    let cv = Constraint::second_degree(Place::P, Slot::M, o_id, s.clone());
                    self.insert_d2_pair(u, v, cu, cv);
                }
                Ok(())
            }
            (Some(s), None, Some(o)) => {
                let u = self.var_position(&s);
                let v = self.var_position(&o);
                if let Some(p_id) = self.resolve(&quad.p)? {
                    let cu = Constraint::second_degree(Place::S, Slot::M, p_id, o.clone());
                    let cv = Constraint::second_degree(Place::O, Slot::N, p_id, s.clone());
                    self.insert_d2_pair(u, v, cu, cv);
                }
                Ok(())
            }
            (None, Some(p), Some(o)) => {
                let u = self.var_position(&p);
                let v = self.var_position(&o);
                if let Some(s_id) = self.resolve(&quad.s)? {
                    let cu = Constraint::second_degree(Place::P, Slot::N, s_id, o.clone());
                    let cv = Constraint::second_degree(Place::O, Slot::M, s_id, p.clone());
                    self.insert_d2_pair(u, v, cu, cv);
                }
                Ok(())
            }
        }
    }

    /// Insertion-ordered variable registration
    fn var_position(&mut self, name: &Arc<str>) -> usize {
        if let Some(&position) = self.index.get(name) {
            return position;
        }
        let position = self.vars.len();
        self.vars.push(Variable::new(name.clone()));
        self.index.insert(name.clone(), position);
        position
    }

    /// Resolve a ground term to its identifier; a miss poisons the graph
    fn resolve(&mut self, term: &PatternTerm) -> Result<Option<TermId>> {
        let PatternTerm::Ground(term) = term else {
            return Err(QueryError::Internal(
                "attempted to resolve a variable as a ground term".into(),
            ));
        };
        if self.unsatisfiable {
            return Ok(None);
        }
        match Dictionary::new(self.kv).lookup(term)? {
            Some(entry) => {
                let id = entry.id;
                self.entries.insert(id, entry);
                Ok(Some(id))
            }
            None => {
                tracing::debug!(term = %term, "ground term not in dictionary; no solutions");
                self.unsatisfiable = true;
                Ok(None)
            }
        }
    }

    fn insert_d1(&mut self, var: usize, constraint: Constraint) {
        let exists = self.vars[var]
            .d1
            .iter()
            .any(|c| c.place == constraint.place && c.m == constraint.m && c.n == constraint.n);
        if !exists {
            self.vars[var].d1.push(constraint);
        }
    }

    fn insert_dz(&mut self, var: usize, constraint: Constraint) {
        let exists = self.vars[var]
            .dz
            .iter()
            .any(|c| c.place == constraint.place && c.n == constraint.n);
        if !exists {
            self.vars[var].dz.push(constraint);
        }
    }

    /// Insert a dual pair, cross-linked by (variable, index). A duplicate
    /// triple shape dedups symmetrically on both sides.
    fn insert_d2_pair(&mut self, u: usize, v: usize, mut cu: Constraint, mut cv: Constraint) {
        let exists = self.vars[u].d2.iter().any(|c| {
            c.place == cu.place && c.m == cu.m && c.n == cu.n && c.covar == cu.covar
        });
        if exists {
            return;
        }
        let iu = self.vars[u].d2.len();
        let iv = self.vars[v].d2.len();
        cu.dual = Some(DualLink {
            var: v,
            constraint: iv,
        });
        cv.dual = Some(DualLink {
            var: u,
            constraint: iu,
        });
        self.vars[u].d2.push(cu);
        self.vars[v].d2.push(cv);
    }

    fn finish(mut self) -> Result<ConstraintGraph> {
        let n = self.vars.len();

        if self.unsatisfiable {
            tracing::debug!(variables = n, "pattern references unknown terms");
            return Ok(ConstraintGraph {
                vars: self.vars,
                index: self.index,
                in_deps: vec![Vec::new(); n],
                out_deps: vec![Vec::new(); n],
                unsatisfiable: true,
            });
        }

        // Score, then stably sort ascending: tighter variables first, ties
        // in insertion order.
        for i in 0..n {
            let score = self.score_variable(&self.vars[i])?;
            self.vars[i].score = score;
        }
        let old_index = std::mem::take(&mut self.index);
        self.vars.sort_by(|a, b| a.score.cmp(&b.score));

        let mut new_position = vec![0usize; n];
        let mut index = FxHashMap::default();
        for (j, var) in self.vars.iter().enumerate() {
            let old = *old_index.get(&var.name).ok_or_else(|| {
                QueryError::Internal(format!("variable {} lost during sort", var.name))
            })?;
            new_position[old] = j;
            index.insert(var.name.clone(), j);
        }

        // Remap dual links to post-sort positions and classify each
        // second-degree constraint by whether its co-variable binds first.
        for (i, var) in self.vars.iter_mut().enumerate() {
            for c in &mut var.d2 {
                if let Some(dual) = &mut c.dual {
                    dual.var = new_position[dual.var];
                }
                let covar = c.covar.as_ref().ok_or_else(|| {
                    QueryError::Internal("second-degree constraint without co-variable".into())
                })?;
                let j = *index.get(covar).ok_or_else(|| {
                    QueryError::Internal(format!("unregistered co-variable {}", covar))
                })?;
                c.bound = j < i;
            }
        }

        // In[v]: earlier positions feeding v, transitively closed in one
        // ascending pass (In[u] is final before any u -> v edge is walked).
        let mut in_sets: Vec<FxHashSet<usize>> = (0..n).map(|_| FxHashSet::default()).collect();
        for i in 0..n {
            let mut later: Vec<usize> = self.vars[i]
                .d2
                .iter()
                .filter_map(|c| c.dual.map(|d| d.var))
                .filter(|&j| j > i)
                .collect();
            later.sort_unstable();
            later.dedup();
            for j in later {
                let inherited: Vec<usize> = in_sets[i].iter().copied().collect();
                in_sets[j].insert(i);
                in_sets[j].extend(inherited);
            }
        }
        let mut out_sets: Vec<FxHashSet<usize>> = (0..n).map(|_| FxHashSet::default()).collect();
        for (j, deps) in in_sets.iter().enumerate() {
            for &i in deps {
                out_sets[i].insert(j);
            }
        }

        let in_deps: Vec<Vec<usize>> = in_sets.into_iter().map(sorted_positions).collect();
        let out_deps: Vec<Vec<usize>> = out_sets.into_iter().map(sorted_positions).collect();

        tracing::debug!(variables = n, "assembled constraint graph");

        Ok(ConstraintGraph {
            vars: self.vars,
            index,
            in_deps,
            out_deps,
            unsatisfiable: false,
        })
    }

    /// Cardinality estimate per the scoring rules: tightest first-degree
    /// range if any, else the reflexive upper bound, else the sum of the
    /// second-degree one-term counts
    fn score_variable(&self, var: &Variable) -> Result<u64> {
        if !var.d1.is_empty() {
            let mut min = u64::MAX;
            for c in &var.d1 {
                min = min.min(c.pair_count(self.kv)?);
            }
            return Ok(min);
        }
        if !var.dz.is_empty() {
            return Ok(var
                .dz
                .iter()
                .map(|c| self.one_term_count(c))
                .min()
                .unwrap_or(0));
        }
        Ok(var
            .d2
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(self.one_term_count(c))))
    }

    /// Occurrence count of a constraint's pinned term at its position
    fn one_term_count(&self, constraint: &Constraint) -> u64 {
        constraint
            .pinned()
            .and_then(|(id, position)| self.entries.get(&id).map(|e| e.count(position)))
            .unwrap_or(0)
    }
}

fn sorted_positions(set: FxHashSet<usize>) -> Vec<usize> {
    let mut positions: Vec<usize> = set.into_iter().collect();
    positions.sort_unstable();
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexad_core::kv::{KvStore, MemoryStore};
    use hexad_core::{Quad, Term};
    use hexad_ingest::ingest;

    fn name() -> Term {
        Term::iri("http://schema.org/name")
    }
    fn knows() -> Term {
        Term::iri("http://schema.org/knows")
    }
    fn rdf_type() -> Term {
        Term::iri("http://www.w3.org/1999/02/22-rdf-syntax-ns#type")
    }
    fn person() -> Term {
        Term::iri("http://schema.org/Person")
    }
    fn birth_date() -> Term {
        Term::iri("http://schema.org/birthDate")
    }

    /// Two small person datasets: three people, two of whom know Jane
    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        let jane = Term::iri("http://people.com/jane");
        ingest(
            &store,
            &[
                Quad::new(Term::blank("b0"), rdf_type(), person()),
                Quad::new(Term::blank("b0"), name(), Term::literal("John Doe")),
                Quad::new(Term::blank("b0"), name(), Term::literal("Johnny Doe")),
                Quad::new(Term::blank("b0"), birth_date(), Term::literal("1996-02-02")),
                Quad::new(Term::blank("b0"), knows(), jane.clone()),
                Quad::new(jane.clone(), rdf_type(), person()),
                Quad::new(jane.clone(), name(), Term::literal("Jane Doe")),
                Quad::new(jane.clone(), birth_date(), Term::literal("1995-01-01")),
            ],
        )
        .unwrap();
        ingest(
            &store,
            &[
                Quad::new(Term::blank("b0"), rdf_type(), person()),
                Quad::new(
                    Term::blank("b0"),
                    name(),
                    Term::literal("Johnanthan Appleseed"),
                ),
                Quad::new(Term::blank("b0"), birth_date(), Term::literal("1780-01-10")),
                Quad::new(Term::blank("b0"), knows(), jane),
            ],
        )
        .unwrap();
        store
    }

    fn var(name: &str) -> PatternTerm {
        PatternTerm::var(name)
    }
    fn ground(term: Term) -> PatternTerm {
        PatternTerm::ground(term)
    }

    #[test]
    fn test_all_variable_triple_is_malformed() {
        let store = MemoryStore::new();
        let snapshot = store.snapshot().unwrap();
        let pattern = [PatternQuad::new(var("a"), var("b"), var("c"))];
        let err = ConstraintGraph::build(snapshot.as_ref(), &pattern).unwrap_err();
        assert!(matches!(err, QueryError::MalformedPattern(_)));
    }

    #[test]
    fn test_all_ground_triple_is_skipped() {
        let store = seeded_store();
        let snapshot = store.snapshot().unwrap();
        let pattern = [
            PatternQuad::new(
                ground(Term::iri("http://people.com/jane")),
                ground(name()),
                ground(Term::literal("Jane Doe")),
            ),
            PatternQuad::new(var("x"), ground(name()), ground(Term::literal("Jane Doe"))),
        ];
        let graph = ConstraintGraph::build(snapshot.as_ref(), &pattern).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.variable(0).d1.len(), 1);
    }

    #[test]
    fn test_unknown_ground_term_poisons_graph() {
        let store = seeded_store();
        let snapshot = store.snapshot().unwrap();
        let pattern = [PatternQuad::new(
            var("x"),
            ground(Term::iri("http://schema.org/unindexed")),
            ground(Term::literal("whatever")),
        )];
        let graph = ConstraintGraph::build(snapshot.as_ref(), &pattern).unwrap();
        assert!(graph.is_unsatisfiable());
        // The variable is still registered so the domain stays complete.
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_duplicate_first_degree_constraints_dedup() {
        let store = seeded_store();
        let snapshot = store.snapshot().unwrap();
        let quad = PatternQuad::new(var("x"), ground(name()), ground(Term::literal("Jane Doe")));
        let graph = ConstraintGraph::build(snapshot.as_ref(), &[quad.clone(), quad]).unwrap();
        assert_eq!(graph.variable(0).d1.len(), 1);
    }

    #[test]
    fn test_second_degree_duals_cross_link() {
        let store = seeded_store();
        let snapshot = store.snapshot().unwrap();
        // (?a knows ?b): two variables joined through one triple.
        let pattern = [PatternQuad::new(var("a"), ground(knows()), var("b"))];
        let graph = ConstraintGraph::build(snapshot.as_ref(), &pattern).unwrap();
        assert_eq!(graph.len(), 2);

        for position in 0..2 {
            let variable = graph.variable(position);
            assert_eq!(variable.d2.len(), 1);
            let dual = variable.d2[0].dual.expect("dual link");
            assert_eq!(dual.var, 1 - position);
            assert_eq!(dual.constraint, 0);
            // Only the later variable's constraint is co-variable-bound.
            assert_eq!(variable.d2[0].bound, position == 1);
        }
    }

    #[test]
    fn test_scores_order_variables_tightest_first() {
        let store = seeded_store();
        let snapshot = store.snapshot().unwrap();
        // ?jane is pinned to one name triple; ?who only has the loose
        // knows-edge bound.
        let pattern = [
            PatternQuad::new(var("who"), ground(knows()), var("jane")),
            PatternQuad::new(var("jane"), ground(name()), ground(Term::literal("Jane Doe"))),
        ];
        let graph = ConstraintGraph::build(snapshot.as_ref(), &pattern).unwrap();

        assert_eq!(graph.position("jane"), Some(0));
        assert_eq!(graph.position("who"), Some(1));
        assert_eq!(graph.variable(0).score, 1);

        // who consumes jane's binding, not the other way around.
        assert_eq!(graph.in_deps(1), &[0]);
        assert_eq!(graph.out_deps(0), &[1]);
        assert!(graph.in_deps(0).is_empty());
        assert!(graph.out_deps(1).is_empty());
    }

    #[test]
    fn test_transitive_dependencies() {
        let store = seeded_store();
        let snapshot = store.snapshot().unwrap();
        // Chain a -> b -> c, each variable looser than the one before it.
        let pattern = [
            PatternQuad::new(var("a"), ground(name()), ground(Term::literal("Jane Doe"))),
            PatternQuad::new(var("a"), ground(knows()), var("b")),
            PatternQuad::new(var("b"), ground(rdf_type()), ground(person())),
            PatternQuad::new(var("b"), ground(birth_date()), var("c")),
        ];
        let graph = ConstraintGraph::build(snapshot.as_ref(), &pattern).unwrap();
        let a = graph.position("a").unwrap();
        let b = graph.position("b").unwrap();
        let c = graph.position("c").unwrap();

        assert!(a < b && b < c, "scores must order the chain a, b, c");
        assert_eq!(graph.in_deps(b), &[a]);
        // c inherits a through b.
        assert_eq!(graph.in_deps(c), &[a, b]);
        assert_eq!(graph.out_deps(a), &[b, c]);
    }

    #[test]
    fn test_second_degree_scores_count_pinned_term_at_its_position() {
        let store = seeded_store();
        let snapshot = store.snapshot().unwrap();

        // (?x knows ?y): both sides pin the knows predicate, so both score
        // by its predicate occurrence count (two knows-edges stored).
        let pattern = [PatternQuad::new(var("x"), ground(knows()), var("y"))];
        let graph = ConstraintGraph::build(snapshot.as_ref(), &pattern).unwrap();
        assert_eq!(graph.variable(0).score, 2);
        assert_eq!(graph.variable(1).score, 2);

        // (jane ?p ?o): both sides pin Jane, so both score by her subject
        // occurrence count (three facts about her).
        let pattern = [PatternQuad::new(
            ground(Term::iri("http://people.com/jane")),
            var("p"),
            var("o"),
        )];
        let graph = ConstraintGraph::build(snapshot.as_ref(), &pattern).unwrap();
        assert_eq!(graph.variable(0).score, 3);
        assert_eq!(graph.variable(1).score, 3);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let store = seeded_store();
        let snapshot = store.snapshot().unwrap();
        // Both variables of (?x knows ?y) score identically when neither
        // has a first-degree constraint: insertion order breaks the tie.
        let pattern = [PatternQuad::new(var("x"), ground(knows()), var("y"))];
        let graph = ConstraintGraph::build(snapshot.as_ref(), &pattern).unwrap();
        assert_eq!(graph.position("x"), Some(0));
        assert_eq!(graph.position("y"), Some(1));

        let names: Vec<&str> = graph.names().map(|n| n.as_ref()).collect();
        assert_eq!(names, ["x", "y"]);
    }
}
