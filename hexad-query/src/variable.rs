//! Variables and their candidate streams
//!
//! A variable owns every constraint built from the pattern triples that
//! mention it. Its candidate stream is the intersection of the constraints'
//! sorted streams, computed by a linear leapfrog: seek every stream to the
//! current frontier, and whenever one lands higher, restart the round from
//! there.

use crate::constraint::Constraint;
use crate::error::Result;
use hexad_core::key::TermId;
use hexad_core::kv::KvSnapshot;
use std::sync::Arc;

/// A pattern variable with its constraint sets and solve state
#[derive(Clone, Debug)]
pub struct Variable {
    /// Blank-node label from the pattern
    pub name: Arc<str>,
    /// First-degree constraints (the variable is the triple's only unknown)
    pub d1: Vec<Constraint>,
    /// Zero-degree reflexive constraints (the variable appears twice)
    pub dz: Vec<Constraint>,
    /// Second-degree constraints (one per two-variable triple)
    pub d2: Vec<Constraint>,
    /// Cardinality estimate; smaller sorts earlier
    pub score: u64,
    /// Initial seek target, consumed by the first advance (starting index)
    pub origin: TermId,
    /// Current binding, `None` while unbound or invalidated
    pub value: Option<TermId>,
}

impl Variable {
    /// Create an unconstrained variable
    pub fn new(name: Arc<str>) -> Self {
        Self {
            name,
            d1: Vec::new(),
            dz: Vec::new(),
            d2: Vec::new(),
            score: 0,
            origin: 0,
            value: None,
        }
    }

    /// All constraints, in a deterministic order
    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.d1.iter().chain(self.dz.iter()).chain(self.d2.iter())
    }

    /// Drop the current binding (iterator restarts on the next advance)
    pub fn clear(&mut self) {
        self.value = None;
    }

    /// Smallest identifier at or after `target` accepted by every
    /// constraint, or `None` if the intersection is exhausted
    pub fn seek_value(&self, kv: &dyn KvSnapshot, target: TermId) -> Result<Option<TermId>> {
        let mut frontier = target;
        'round: loop {
            for constraint in self.constraints() {
                match constraint.seek(kv, frontier)? {
                    None => return Ok(None),
                    Some(found) if found > frontier => {
                        frontier = found;
                        continue 'round;
                    }
                    Some(_) => {}
                }
            }
            return Ok(Some(frontier));
        }
    }

    /// Produce the next binding: past the current value, or from the origin
    /// after a restart. The origin applies once (starting-index semantics)
    /// and later restarts begin at zero.
    pub fn advance(&mut self, kv: &dyn KvSnapshot) -> Result<Option<TermId>> {
        let target = match self.value {
            Some(current) => match current.checked_add(1) {
                Some(next) => next,
                None => return Ok(None),
            },
            None => std::mem::take(&mut self.origin),
        };
        self.seek_value(kv, target)
    }
}
