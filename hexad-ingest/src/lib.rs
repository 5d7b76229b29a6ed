//! # Hexad Ingest
//!
//! Write path for the Hexad graph database: takes a dataset of ground quads
//! (as produced by an external normalizer), content-addresses it, and writes
//! the twelve key/value entries per triple that the query engine consumes:
//! six triple keys (one per permutation, each holding the triple's
//! provenance) and six two-term count keys (the cardinality statistics).
//!
//! Dictionary identifiers are assigned here, monotonically from a persisted
//! sequence key, and each term's per-position occurrence counts are
//! maintained on its dictionary entry.
//!
//! Ingesting the same dataset twice is a no-op: the dataset's content hash
//! is checked against the graph keyspace before any write.

use chrono::Utc;
use hexad_core::dict::{Position, TermEntry};
use hexad_core::error::{Error, Result};
use hexad_core::key::{
    count_key, decode_u64, graph_key, term_key, triple_key, value_key, TermId, TripleIndex,
    SEQUENCE_KEY,
};
use hexad_core::kv::{KvStore, KvTransaction};
use hexad_core::source::{Source, SourceList, DEFAULT_GRAPH};
use hexad_core::term::{Quad, Term};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Compute a dataset's content hash (hex SHA-256 over its canonical
/// N-Quads serialization)
pub fn dataset_id(quads: &[Quad]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_nquads(quads).as_bytes());
    hex::encode(hasher.finalize())
}

/// Ingest a dataset, returning its content hash.
///
/// Blank nodes with an empty dataset qualifier are rewritten to carry the
/// dataset's hash, so blank nodes from different datasets stay distinct.
/// If the dataset was ingested before, nothing is written and the existing
/// hash is returned.
pub fn ingest(store: &dyn KvStore, quads: &[Quad]) -> Result<Arc<str>> {
    let dataset: Arc<str> = Arc::from(dataset_id(quads).as_str());

    let mut txn = store.begin()?;
    let gkey = graph_key(&dataset);
    if let Some(stamp) = txn.get(&gkey)? {
        tracing::debug!(
            dataset = %dataset,
            inserted_at = %String::from_utf8_lossy(&stamp),
            "duplicate dataset, skipping"
        );
        return Ok(dataset);
    }

    let mut session = Session::new(&mut *txn, dataset.clone())?;
    for (index, quad) in quads.iter().enumerate() {
        session.insert(quad, index as u32)?;
    }
    session.finish()?;

    txn.put(&gkey, Utc::now().to_rfc3339().as_bytes())?;
    txn.commit()?;

    tracing::debug!(dataset = %dataset, quads = quads.len(), "ingested dataset");
    Ok(dataset)
}

/// One dataset's worth of buffered dictionary state
struct Session<'a> {
    txn: &'a mut dyn KvTransaction,
    dataset: Arc<str>,
    /// Canonical term bytes -> entry, buffered until `finish`
    entries: HashMap<Vec<u8>, TermEntry>,
    /// Terms that received a fresh identifier in this session
    new_terms: Vec<(TermId, Term)>,
    next_id: TermId,
}

impl<'a> Session<'a> {
    fn new(txn: &'a mut dyn KvTransaction, dataset: Arc<str>) -> Result<Self> {
        let next_id = match txn.get(&SEQUENCE_KEY)? {
            Some(bytes) => decode_u64(&bytes)?,
            None => 1,
        };
        Ok(Self {
            txn,
            dataset,
            entries: HashMap::new(),
            new_terms: Vec::new(),
            next_id,
        })
    }

    fn insert(&mut self, quad: &Quad, index: u32) -> Result<()> {
        let s = self.resolve(&quad.s, Position::Subject)?;
        let p = self.resolve(&quad.p, Position::Predicate)?;
        let o = self.resolve(&quad.o, Position::Object)?;

        self.bump_counts(s, p, o)?;

        let source = Source {
            dataset: self.dataset.clone(),
            graph: quad
                .graph
                .clone()
                .unwrap_or_else(|| Arc::from(DEFAULT_GRAPH)),
            index,
        };

        for &perm in TripleIndex::all() {
            let [a, b, c] = perm.permute(s, p, o);
            let key = triple_key(perm, a, b, c);
            let mut list = match self.txn.get(&key)? {
                Some(bytes) => SourceList::from_bytes(&bytes)?,
                None => SourceList::default(),
            };
            list.sources.push(source.clone());
            self.txn.put(&key, &list.to_bytes()?)?;
        }

        Ok(())
    }

    /// Resolve a term to its identifier, assigning one if needed, and count
    /// the occurrence at `position`
    fn resolve(&mut self, term: &Term, position: Position) -> Result<TermId> {
        let term = self.qualify(term);
        let bytes = term.canonical_bytes();

        if let Some(entry) = self.entries.get_mut(&bytes) {
            entry.increment(position);
            return Ok(entry.id);
        }

        let mut entry = match self.txn.get(&term_key(&bytes))? {
            Some(stored) => TermEntry::from_bytes(&stored)?,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                self.new_terms.push((id, term));
                TermEntry::new(id)
            }
        };
        entry.increment(position);
        let id = entry.id;
        self.entries.insert(bytes, entry);
        Ok(id)
    }

    /// Qualify a local blank node with this dataset's hash
    fn qualify(&self, term: &Term) -> Term {
        match term {
            Term::Blank { dataset, label } if dataset.is_empty() => Term::Blank {
                dataset: self.dataset.clone(),
                label: label.clone(),
            },
            other => other.clone(),
        }
    }

    /// Increment all six two-term count keys for a triple, verifying that
    /// major and minor counters for the same pair agree
    fn bump_counts(&mut self, s: TermId, p: TermId, o: TermId) -> Result<()> {
        let all = TripleIndex::all();
        let mut counts = [0u64; 6];
        for (i, &perm) in all.iter().enumerate() {
            let [a, b, _] = perm.permute(s, p, o);
            let key = count_key(perm, a, b);
            let count = match self.txn.get(&key)? {
                Some(bytes) => decode_u64(&bytes)? + 1,
                None => 1,
            };
            self.txn.put(&key, &count.to_be_bytes())?;
            counts[i] = count;
        }

        // major[i] and minor[(i + 1) % 3] count the same unordered pair
        for i in 0..3 {
            let j = 3 + (i + 1) % 3;
            if counts[i] != counts[j] {
                return Err(Error::corrupt(format!(
                    "mismatched {} and {} counters for <{} {} {}>: {} != {}",
                    all[i].name(),
                    all[j].name(),
                    s,
                    p,
                    o,
                    counts[i],
                    counts[j],
                )));
            }
        }

        Ok(())
    }

    /// Flush buffered dictionary entries and the sequence key
    fn finish(self) -> Result<()> {
        for (id, term) in &self.new_terms {
            self.txn.put(&value_key(*id), &serde_json::to_vec(term)?)?;
        }
        for (bytes, entry) in &self.entries {
            self.txn.put(&term_key(bytes), &entry.to_bytes()?)?;
        }
        self.txn.put(&SEQUENCE_KEY, &self.next_id.to_be_bytes())?;
        Ok(())
    }
}

/// Canonical N-Quads text for hashing: one line per quad, in input order.
///
/// Local blank nodes are rendered with their bare labels; callers are
/// expected to hand in canonically-labeled quads (the normalizer's job).
fn canonical_nquads(quads: &[Quad]) -> String {
    let mut out = String::new();
    for quad in quads {
        out.push_str(&nquads_term(&quad.s));
        out.push(' ');
        out.push_str(&nquads_term(&quad.p));
        out.push(' ');
        out.push_str(&nquads_term(&quad.o));
        if let Some(graph) = &quad.graph {
            out.push(' ');
            out.push('<');
            out.push_str(graph);
            out.push('>');
        }
        out.push_str(" .\n");
    }
    out
}

fn nquads_term(term: &Term) -> String {
    match term {
        Term::Blank { dataset, label } if dataset.is_empty() => format!("_:{}", label),
        other => other.canonical_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexad_core::dict::Dictionary;
    use hexad_core::kv::MemoryStore;

    fn sample_quads() -> Vec<Quad> {
        let name = Term::iri("http://schema.org/name");
        let knows = Term::iri("http://schema.org/knows");
        let jane = Term::iri("http://people.com/jane");
        vec![
            Quad::new(Term::blank("b0"), name.clone(), Term::literal("John Doe")),
            Quad::new(Term::blank("b0"), knows.clone(), jane.clone()),
            Quad::new(jane.clone(), name.clone(), Term::literal("Jane Doe")),
        ]
    }

    #[test]
    fn test_twelve_entries_per_triple() {
        let store = MemoryStore::new();
        let quads = vec![Quad::new(
            Term::iri("http://a"),
            Term::iri("http://b"),
            Term::iri("http://c"),
        )];
        let dataset = ingest(&store, &quads).unwrap();

        let snapshot = store.snapshot().unwrap();
        let dict = Dictionary::new(snapshot.as_ref());
        let s = dict.lookup(&Term::iri("http://a")).unwrap().unwrap().id;
        let p = dict.lookup(&Term::iri("http://b")).unwrap().unwrap().id;
        let o = dict.lookup(&Term::iri("http://c")).unwrap().unwrap().id;

        for &perm in TripleIndex::all() {
            let [a, b, c] = perm.permute(s, p, o);
            let triple = snapshot.get(&triple_key(perm, a, b, c)).unwrap().unwrap();
            let list = SourceList::from_bytes(&triple).unwrap();
            assert_eq!(list.sources.len(), 1);
            assert_eq!(list.sources[0].dataset.as_ref(), dataset.as_ref());
            assert_eq!(list.sources[0].graph.as_ref(), DEFAULT_GRAPH);

            let count = snapshot.get(&count_key(perm, a, b)).unwrap().unwrap();
            assert_eq!(decode_u64(&count).unwrap(), 1);
        }
    }

    #[test]
    fn test_counts_accumulate() {
        let store = MemoryStore::new();
        let name = Term::iri("http://schema.org/name");
        let quads = vec![
            Quad::new(Term::iri("http://s1"), name.clone(), Term::literal("a")),
            Quad::new(Term::iri("http://s1"), name.clone(), Term::literal("b")),
            Quad::new(Term::iri("http://s2"), name.clone(), Term::literal("a")),
        ];
        ingest(&store, &quads).unwrap();

        let snapshot = store.snapshot().unwrap();
        let dict = Dictionary::new(snapshot.as_ref());
        let s1 = dict.lookup(&Term::iri("http://s1")).unwrap().unwrap();
        let p = dict.lookup(&name).unwrap().unwrap();
        let a = dict.lookup(&Term::literal("a")).unwrap().unwrap();

        // One-term occurrence counts on the dictionary entries.
        assert_eq!(s1.subject, 2);
        assert_eq!(p.predicate, 3);
        assert_eq!(a.object, 2);

        // Two-term count keys.
        let sp = snapshot
            .get(&count_key(TripleIndex::Spo, s1.id, p.id))
            .unwrap()
            .unwrap();
        assert_eq!(decode_u64(&sp).unwrap(), 2);
        let po = snapshot
            .get(&count_key(TripleIndex::Pos, p.id, a.id))
            .unwrap()
            .unwrap();
        assert_eq!(decode_u64(&po).unwrap(), 2);
    }

    #[test]
    fn test_named_graph_label_in_provenance() {
        let store = MemoryStore::new();
        let quad = Quad::in_graph(
            Term::iri("http://a"),
            Term::iri("http://b"),
            Term::iri("http://c"),
            "http://graphs.com/g1",
        );
        ingest(&store, &[quad]).unwrap();

        let snapshot = store.snapshot().unwrap();
        let dict = Dictionary::new(snapshot.as_ref());
        let s = dict.lookup(&Term::iri("http://a")).unwrap().unwrap().id;
        let p = dict.lookup(&Term::iri("http://b")).unwrap().unwrap().id;
        let o = dict.lookup(&Term::iri("http://c")).unwrap().unwrap().id;

        let stored = snapshot
            .get(&triple_key(TripleIndex::Spo, s, p, o))
            .unwrap()
            .unwrap();
        let list = SourceList::from_bytes(&stored).unwrap();
        assert_eq!(list.sources[0].graph.as_ref(), "http://graphs.com/g1");
        assert_eq!(list.sources[0].index, 0);
    }

    #[test]
    fn test_duplicate_dataset_is_noop() {
        let store = MemoryStore::new();
        let quads = sample_quads();
        let first = ingest(&store, &quads).unwrap();
        let keys_after_first = store.len();
        let second = ingest(&store, &quads).unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len(), keys_after_first);
    }

    #[test]
    fn test_blank_nodes_are_dataset_scoped() {
        let store = MemoryStore::new();
        let name = Term::iri("http://schema.org/name");
        let ds1 = ingest(
            &store,
            &[Quad::new(Term::blank("b0"), name.clone(), Term::literal("x"))],
        )
        .unwrap();
        let ds2 = ingest(
            &store,
            &[Quad::new(Term::blank("b0"), name.clone(), Term::literal("y"))],
        )
        .unwrap();
        assert_ne!(ds1, ds2);

        let snapshot = store.snapshot().unwrap();
        let dict = Dictionary::new(snapshot.as_ref());
        let b1 = dict
            .lookup(&Term::qualified_blank(ds1.as_ref(), "b0"))
            .unwrap()
            .unwrap();
        let b2 = dict
            .lookup(&Term::qualified_blank(ds2.as_ref(), "b0"))
            .unwrap()
            .unwrap();
        assert_ne!(b1.id, b2.id);

        // The unqualified label itself is never in the dictionary.
        assert!(dict.lookup(&Term::blank("b0")).unwrap().is_none());
    }

    #[test]
    fn test_sequence_continues_across_datasets() {
        let store = MemoryStore::new();
        let name = Term::iri("http://schema.org/name");
        ingest(
            &store,
            &[Quad::new(Term::iri("http://s1"), name.clone(), Term::literal("x"))],
        )
        .unwrap();
        ingest(
            &store,
            &[Quad::new(Term::iri("http://s2"), name.clone(), Term::literal("y"))],
        )
        .unwrap();

        let snapshot = store.snapshot().unwrap();
        let dict = Dictionary::new(snapshot.as_ref());
        let mut ids = vec![
            dict.lookup(&Term::iri("http://s1")).unwrap().unwrap().id,
            dict.lookup(&name).unwrap().unwrap().id,
            dict.lookup(&Term::literal("x")).unwrap().unwrap().id,
            dict.lookup(&Term::iri("http://s2")).unwrap().unwrap().id,
            dict.lookup(&Term::literal("y")).unwrap().unwrap().id,
        ];
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5, "identifiers must be distinct");

        // Reverse lookups resolve every assigned id.
        for id in ids {
            assert!(dict.term(id).unwrap().is_some());
        }
    }
}
