//! # Hexad Core
//!
//! Core library for the Hexad graph database.
//!
//! This crate provides:
//! - Term and quad model: `Term`, `Quad`
//! - The hexastore key layout: six triple permutations plus two-term count
//!   keys, dictionary and provenance keyspaces
//! - The term dictionary read path: `Dictionary`, `TermEntry`
//! - Ordered KV storage traits with an in-memory backend (and a persistent
//!   redb backend behind the `redb` feature)
//!
//! ## Design Principles
//!
//! 1. **Everything is a range scan**: identifiers are big-endian in keys, so
//!    any fixed prefix is a contiguous range
//! 2. **Write-side lives elsewhere**: this crate assigns nothing; ingest
//!    (`hexad-ingest`) owns the sequence and count maintenance
//! 3. **Snapshot-per-reader**: all query state derives from one `KvSnapshot`

pub mod dict;
pub mod error;
pub mod key;
pub mod kv;
pub mod source;
pub mod term;

// Re-export main types
pub use dict::{Dictionary, Position, TermEntry};
pub use error::{Error, Result};
pub use key::{TermId, TripleIndex};
pub use kv::{KvSnapshot, KvStore, KvTransaction, MemoryStore};
#[cfg(feature = "redb")]
pub use kv::RedbStore;
pub use source::{Source, SourceList, DEFAULT_GRAPH};
pub use term::{Quad, Term};
