//! Provenance records stored at triple keys
//!
//! Each of the six triple keys for a stored triple maps to the list of
//! places the triple was asserted: the dataset's content hash, the graph
//! label within that dataset, and the quad's index in the dataset.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Graph label used when a quad carries no explicit graph
pub const DEFAULT_GRAPH: &str = "@default";

/// One assertion of a triple
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Content hash of the dataset
    pub dataset: Arc<str>,
    /// Graph label within the dataset
    pub graph: Arc<str>,
    /// Index of the quad within the dataset
    pub index: u32,
}

/// The value stored at every triple key
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceList {
    /// All assertions of this triple, in ingest order
    pub sources: Vec<Source>,
}

impl SourceList {
    /// Decode a source list from its stored bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::error::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode for storage
    pub fn to_bytes(&self) -> crate::error::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
