//! Term dictionary (read path)
//!
//! The dictionary maps each term to a compact 64-bit identifier and back:
//!
//! - `TERM_PREFIX || canonical-bytes -> TermEntry` (forward)
//! - `VALUE_PREFIX || id:8 -> Term` (reverse)
//!
//! A [`TermEntry`] also carries the term's occurrence count in each triple
//! position, maintained at ingest. These one-term counts are the loose
//! cardinality statistics consulted by the query scorer where no two-term
//! count key applies.
//!
//! Identifier assignment happens on the ingest path (`hexad-ingest`); the
//! query path only reads.

use crate::error::Result;
use crate::key::{term_key, value_key, TermId};
use crate::kv::KvSnapshot;
use crate::term::Term;
use serde::{Deserialize, Serialize};

/// A position within a triple
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Position {
    /// Subject position
    Subject,
    /// Predicate position
    Predicate,
    /// Object position
    Object,
}

/// Dictionary entry for a term
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    /// The term's identifier
    pub id: TermId,
    /// Number of triples with this term in subject position
    #[serde(default)]
    pub subject: u64,
    /// Number of triples with this term in predicate position
    #[serde(default)]
    pub predicate: u64,
    /// Number of triples with this term in object position
    #[serde(default)]
    pub object: u64,
}

impl TermEntry {
    /// Create a fresh entry for a newly assigned identifier
    pub fn new(id: TermId) -> Self {
        Self {
            id,
            subject: 0,
            predicate: 0,
            object: 0,
        }
    }

    /// Occurrence count at the given position
    pub fn count(&self, position: Position) -> u64 {
        match position {
            Position::Subject => self.subject,
            Position::Predicate => self.predicate,
            Position::Object => self.object,
        }
    }

    /// Increment the occurrence count at the given position
    pub fn increment(&mut self, position: Position) {
        match position {
            Position::Subject => self.subject += 1,
            Position::Predicate => self.predicate += 1,
            Position::Object => self.object += 1,
        }
    }

    /// Decode an entry from its stored bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode for storage
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Read-only dictionary view over a KV snapshot
pub struct Dictionary<'a> {
    kv: &'a dyn KvSnapshot,
}

impl<'a> Dictionary<'a> {
    /// Create a dictionary view
    pub fn new(kv: &'a dyn KvSnapshot) -> Self {
        Self { kv }
    }

    /// Forward lookup: term to entry, `None` if the term is unknown
    pub fn lookup(&self, term: &Term) -> Result<Option<TermEntry>> {
        let key = term_key(&term.canonical_bytes());
        match self.kv.get(&key)? {
            Some(bytes) => Ok(Some(TermEntry::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reverse lookup: identifier to term, `None` if unassigned
    pub fn term(&self, id: TermId) -> Result<Option<Term>> {
        match self.kv.get(&value_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvStore, MemoryStore};

    #[test]
    fn test_entry_counts() {
        let mut entry = TermEntry::new(7);
        entry.increment(Position::Subject);
        entry.increment(Position::Subject);
        entry.increment(Position::Object);

        assert_eq!(entry.count(Position::Subject), 2);
        assert_eq!(entry.count(Position::Predicate), 0);
        assert_eq!(entry.count(Position::Object), 1);
    }

    #[test]
    fn test_lookup_roundtrip() {
        let store = MemoryStore::new();
        let term = Term::iri("http://schema.org/name");
        let entry = TermEntry {
            id: 3,
            subject: 0,
            predicate: 5,
            object: 0,
        };

        let mut txn = store.begin().unwrap();
        txn.put(
            &term_key(&term.canonical_bytes()),
            &entry.to_bytes().unwrap(),
        )
        .unwrap();
        txn.put(&value_key(3), &serde_json::to_vec(&term).unwrap())
            .unwrap();
        txn.commit().unwrap();

        let snapshot = store.snapshot().unwrap();
        let dict = Dictionary::new(snapshot.as_ref());
        assert_eq!(dict.lookup(&term).unwrap(), Some(entry));
        assert_eq!(dict.term(3).unwrap(), Some(term));
        assert_eq!(dict.term(99).unwrap(), None);
        assert_eq!(dict.lookup(&Term::iri("http://missing/")).unwrap(), None);
    }
}
