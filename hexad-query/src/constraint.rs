//! Constraints: one pattern triple seen from one variable
//!
//! A constraint pins up to two identifiers of a triple and turns the
//! remaining position into a sorted stream of candidates for its owning
//! variable, driven by `seek` calls against the hexastore.
//!
//! The canonical pinned order per place keeps every fully-pinned constraint
//! on a major index with the variable in the last column:
//!
//! | place | (M, N) | both pinned | only M | only N | count key |
//! |-------|--------|-------------|--------|--------|-----------|
//! | S     | (p, o) | POS         | PSO    | OSP    | `j`       |
//! | P     | (o, s) | OSP         | OPS    | SPO    | `k`       |
//! | O     | (s, p) | SPO         | SOP    | POS    | `i`       |
//!
//! With a single pinned term the variable sits in the second column and the
//! stream deduplicates by construction: seeking past a candidate skips the
//! whole run of third-column entries below it.
//!
//! Reflexive constraints (the same variable in two positions) walk the
//! diagonal of the two free columns: SP scans OSP, OS scans PSO, PO scans
//! SPO.

use crate::error::{QueryError, Result};
use hexad_core::dict::Position;
use hexad_core::key::{count_key, decode_u64, id_at, triple_prefix1, triple_prefix2, TermId};
use hexad_core::kv::KvSnapshot;
use hexad_core::TripleIndex;
use std::sync::Arc;

/// Which position(s) of the triple the owning variable occupies
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Place {
    /// Subject
    S,
    /// Predicate
    P,
    /// Object
    O,
    /// Subject and predicate (reflexive)
    SP,
    /// Object and subject (reflexive)
    OS,
    /// Predicate and object (reflexive)
    PO,
}

impl Place {
    /// Check if the variable occupies two positions
    pub fn is_reflexive(self) -> bool {
        matches!(self, Place::SP | Place::OS | Place::PO)
    }

    /// Index scanned when both M and N are pinned (variable in column 3)
    fn pair_index(self) -> TripleIndex {
        match self {
            Place::S => TripleIndex::Pos,
            Place::P => TripleIndex::Osp,
            Place::O => TripleIndex::Spo,
            _ => unreachable!("reflexive constraint has no pair index"),
        }
    }

    /// Index scanned when only M is pinned (variable in column 2)
    fn m_index(self) -> TripleIndex {
        match self {
            Place::S => TripleIndex::Pso,
            Place::P => TripleIndex::Ops,
            Place::O => TripleIndex::Sop,
            _ => unreachable!("reflexive constraint has no M index"),
        }
    }

    /// Index scanned when only N is pinned (variable in column 2)
    fn n_index(self) -> TripleIndex {
        match self {
            Place::S => TripleIndex::Osp,
            Place::P => TripleIndex::Spo,
            Place::O => TripleIndex::Pos,
            _ => unreachable!("reflexive constraint has no N index"),
        }
    }

    /// Index whose diagonal a reflexive constraint walks (N in column 1)
    fn reflexive_index(self) -> TripleIndex {
        match self {
            Place::SP => TripleIndex::Osp,
            Place::OS => TripleIndex::Pso,
            Place::PO => TripleIndex::Spo,
            _ => unreachable!("single-place constraint has no reflexive index"),
        }
    }

    /// Triple position held by the M slot
    fn m_position(self) -> Position {
        match self {
            Place::S => Position::Predicate,
            Place::P => Position::Object,
            Place::O => Position::Subject,
            _ => unreachable!("reflexive constraint has no M slot"),
        }
    }

    /// Triple position held by the N slot
    fn n_position(self) -> Position {
        match self {
            Place::S | Place::SP => Position::Object,
            Place::P | Place::PO => Position::Subject,
            Place::O | Place::OS => Position::Predicate,
        }
    }

    /// Get the short name of this place
    pub fn name(self) -> &'static str {
        match self {
            Place::S => "s",
            Place::P => "p",
            Place::O => "o",
            Place::SP => "sp",
            Place::OS => "os",
            Place::PO => "po",
        }
    }
}

/// Which pinned slot a value belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// First pinned identifier
    M,
    /// Second pinned identifier
    N,
}

/// Arena reference to the partner constraint of a two-variable triple
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DualLink {
    /// Position of the partner's owning variable (execution order)
    pub var: usize,
    /// Index into that variable's second-degree constraint list
    pub constraint: usize,
}

/// The contribution of one pattern triple to one variable's search space
#[derive(Clone, Debug)]
pub struct Constraint {
    /// Position(s) the owning variable occupies
    pub place: Place,
    /// First pinned identifier (ground at build time, or filled from the
    /// co-variable during solving)
    pub m: Option<TermId>,
    /// Second pinned identifier
    pub n: Option<TermId>,
    /// Co-variable label (second-degree only)
    pub covar: Option<Arc<str>>,
    /// Which of M/N the co-variable fills (second-degree only)
    pub covar_slot: Option<Slot>,
    /// Partner constraint on the co-variable's side (second-degree only)
    pub dual: Option<DualLink>,
    /// Second-degree: the co-variable sorts earlier, so this constraint
    /// iterates with a completed two-term prefix
    pub bound: bool,
}

impl Constraint {
    /// First-degree constraint: both terms pinned at build time
    pub fn first_degree(place: Place, m: TermId, n: TermId) -> Self {
        Self {
            place,
            m: Some(m),
            n: Some(n),
            covar: None,
            covar_slot: None,
            dual: None,
            bound: false,
        }
    }

    /// Zero-degree reflexive constraint: one ground term, variable twice
    pub fn reflexive(place: Place, n: TermId) -> Self {
        Self {
            place,
            m: None,
            n: Some(n),
            covar: None,
            covar_slot: None,
            dual: None,
            bound: false,
        }
    }

    /// Second-degree constraint: one pinned term, the other slot filled
    /// from `covar` at solve time
    pub fn second_degree(place: Place, pinned: Slot, value: TermId, covar: Arc<str>) -> Self {
        let (m, n, covar_slot) = match pinned {
            Slot::M => (Some(value), None, Slot::N),
            Slot::N => (None, Some(value), Slot::M),
        };
        Self {
            place,
            m,
            n,
            covar: Some(covar),
            covar_slot: Some(covar_slot),
            dual: None,
            bound: false,
        }
    }

    /// The pinned ground identifier and the triple position it pins.
    ///
    /// For first-degree constraints this is the M slot (either would do for
    /// scoring); for second-degree constraints it is the non-co-variable
    /// slot; for reflexive constraints it is N.
    pub fn pinned(&self) -> Option<(TermId, Position)> {
        if self.place.is_reflexive() {
            return self.n.map(|n| (n, self.place.n_position()));
        }
        match self.covar_slot {
            Some(Slot::M) => self.n.map(|n| (n, self.place.n_position())),
            Some(Slot::N) => self.m.map(|m| (m, self.place.m_position())),
            None => self.m.map(|m| (m, self.place.m_position())),
        }
    }

    /// Fill the co-variable slot with its current binding
    pub fn fill(&mut self, value: TermId) -> Result<()> {
        match self.covar_slot {
            Some(Slot::M) => self.m = Some(value),
            Some(Slot::N) => self.n = Some(value),
            None => {
                return Err(QueryError::Internal(
                    "fill on a constraint without a co-variable".into(),
                ))
            }
        }
        Ok(())
    }

    /// Two-term range size from the count keyspace (first-degree scoring)
    pub fn pair_count(&self, kv: &dyn KvSnapshot) -> Result<u64> {
        let (Some(m), Some(n)) = (self.m, self.n) else {
            return Err(QueryError::Internal(
                "pair count on a partially pinned constraint".into(),
            ));
        };
        let key = count_key(self.place.pair_index(), m, n);
        match kv.get(&key)? {
            Some(bytes) => Ok(decode_u64(&bytes)?),
            None => Ok(0),
        }
    }

    /// Smallest candidate identifier at or after `target`, or `None` if the
    /// stream is exhausted
    pub fn seek(&self, kv: &dyn KvSnapshot, target: TermId) -> Result<Option<TermId>> {
        if self.place.is_reflexive() {
            return self.seek_diagonal(kv, target);
        }
        if self.bound && (self.m.is_none() || self.n.is_none()) {
            return Err(QueryError::Internal(format!(
                "constraint at place {} iterated before its co-variable was bound",
                self.place.name()
            )));
        }
        match (self.m, self.n) {
            (Some(m), Some(n)) => seek_column3(kv, self.place.pair_index(), m, n, target),
            (Some(m), None) => seek_column2(kv, self.place.m_index(), m, target),
            (None, Some(n)) => seek_column2(kv, self.place.n_index(), n, target),
            (None, None) => Err(QueryError::Internal(
                "constraint with no pinned identifier".into(),
            )),
        }
    }

    /// Walk the diagonal of a reflexive constraint's index: candidates are
    /// identifiers appearing in both free columns of the same key
    fn seek_diagonal(&self, kv: &dyn KvSnapshot, target: TermId) -> Result<Option<TermId>> {
        let Some(pinned) = self.n else {
            return Err(QueryError::Internal(
                "reflexive constraint with no pinned identifier".into(),
            ));
        };
        let prefix = triple_prefix1(self.place.reflexive_index(), pinned);
        let mut x = target;
        loop {
            let mut probe = [0u8; 25];
            probe[..9].copy_from_slice(&prefix);
            probe[9..17].copy_from_slice(&x.to_be_bytes());
            probe[17..25].copy_from_slice(&x.to_be_bytes());

            let Some(found) = kv.seek(&probe)? else {
                return Ok(None);
            };
            if !found.starts_with(&prefix) {
                return Ok(None);
            }
            let a = id_at(&found, 1)?;
            let b = id_at(&found, 2)?;
            if a == b {
                return Ok(Some(a));
            }
            // Next possible diagonal entry: (a, a) if we landed below the
            // diagonal, otherwise (a + 1, a + 1).
            x = if b < a {
                a
            } else {
                match a.checked_add(1) {
                    Some(next) => next,
                    None => return Ok(None),
                }
            };
        }
    }
}

/// Seek within a two-term prefix; the candidate is the third column
fn seek_column3(
    kv: &dyn KvSnapshot,
    index: TripleIndex,
    a: TermId,
    b: TermId,
    target: TermId,
) -> Result<Option<TermId>> {
    let prefix = triple_prefix2(index, a, b);
    let mut probe = [0u8; 25];
    probe[..17].copy_from_slice(&prefix);
    probe[17..25].copy_from_slice(&target.to_be_bytes());
    match kv.seek(&probe)? {
        Some(found) if found.starts_with(&prefix) => Ok(Some(id_at(&found, 2)?)),
        _ => Ok(None),
    }
}

/// Seek within a one-term prefix; the candidate is the second column.
///
/// Seeking to `prefix || target` lands on the first key whose second column
/// is at least `target`, regardless of the third column, so repeated seeks
/// past the current candidate enumerate distinct second-column values.
fn seek_column2(
    kv: &dyn KvSnapshot,
    index: TripleIndex,
    a: TermId,
    target: TermId,
) -> Result<Option<TermId>> {
    let prefix = triple_prefix1(index, a);
    let mut probe = [0u8; 17];
    probe[..9].copy_from_slice(&prefix);
    probe[9..17].copy_from_slice(&target.to_be_bytes());
    match kv.seek(&probe)? {
        Some(found) if found.starts_with(&prefix) => Ok(Some(id_at(&found, 1)?)),
        _ => Ok(None),
    }
}
