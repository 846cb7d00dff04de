//! Global evidence store: collection-wide and per-term statistics
//!
//! Evidence is computed offline (or by [`IndexBuilder`](crate::IndexBuilder)) and
//! is read-only afterwards. Scoring functions derive their term-specific constants
//! from it once, in `initialize`.
//!
//! The store can be persisted as JSON:
//! ```rust,ignore
//! let evidence = EvidenceStore::from_json_file("evidence.json")?;
//! let cf = evidence.term("retrieval").cf;
//! ```

use std::io::{Read, Write};
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-term collection statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalTermEvidence {
    /// Collection frequency (total occurrences)
    pub cf: u64,
    /// Document frequency (documents containing the term)
    pub df: u64,
}

impl GlobalTermEvidence {
    pub fn new(df: u64, cf: u64) -> Self {
        Self { cf, df }
    }

    /// Out-of-vocabulary: the term never occurs in the collection
    #[inline]
    pub fn is_oov(&self) -> bool {
        self.cf == 0
    }
}

/// Collection-wide statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalEvidence {
    /// Total number of tokens in the collection
    pub collection_length: u64,
    /// Average document length in tokens
    pub avg_doc_len: f32,
    /// Number of documents
    pub document_count: u64,
}

impl GlobalEvidence {
    pub fn new(document_count: u64, collection_length: u64) -> Self {
        let avg_doc_len = if document_count > 0 {
            (collection_length as f64 / document_count as f64) as f32
        } else {
            0.0
        };
        Self {
            collection_length,
            avg_doc_len,
            document_count,
        }
    }
}

impl Default for GlobalEvidence {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TermEntry {
    term: String,
    df: u64,
    cf: u64,
}

/// Read-only evidence for one collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceStore {
    pub global: GlobalEvidence,
    #[serde(skip)]
    term_map: FxHashMap<String, GlobalTermEvidence>,
    /// Raw term list (for serialization)
    terms: Vec<TermEntry>,
}

impl EvidenceStore {
    pub fn new(global: GlobalEvidence) -> Self {
        Self {
            global,
            term_map: FxHashMap::default(),
            terms: Vec::new(),
        }
    }

    /// Load evidence from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_json_reader(std::io::BufReader::new(file))
    }

    /// Load evidence from a JSON reader
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let mut store: EvidenceStore =
            serde_json::from_reader(reader).map_err(|e| Error::Serialization(e.to_string()))?;
        store.build_term_map();
        Ok(store)
    }

    /// Load evidence from JSON bytes
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let mut store: EvidenceStore =
            serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        store.build_term_map();
        Ok(store)
    }

    /// Write evidence as JSON
    pub fn to_json_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    fn build_term_map(&mut self) {
        self.term_map.clear();
        for entry in &self.terms {
            self.term_map
                .insert(entry.term.clone(), GlobalTermEvidence::new(entry.df, entry.cf));
        }
    }

    /// Add or replace the statistics of a term
    pub fn add_term(&mut self, term: &str, df: u64, cf: u64) {
        let evidence = GlobalTermEvidence::new(df, cf);
        if self.term_map.insert(term.to_string(), evidence).is_some() {
            self.terms.retain(|e| e.term != term);
        }
        self.terms.push(TermEntry {
            term: term.to_string(),
            df,
            cf,
        });
    }

    /// Statistics of a term; unknown terms get zero evidence (OOV)
    #[inline]
    pub fn term(&self, term: &str) -> GlobalTermEvidence {
        self.term_map.get(term).copied().unwrap_or_default()
    }

    pub fn has_term(&self, term: &str) -> bool {
        self.term_map.contains_key(term)
    }

    pub fn num_terms(&self) -> usize {
        self.term_map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_evidence_avg_doc_len() {
        let global = GlobalEvidence::new(4, 1000);
        assert_eq!(global.avg_doc_len, 250.0);

        let empty = GlobalEvidence::new(0, 0);
        assert_eq!(empty.avg_doc_len, 0.0);
    }

    #[test]
    fn test_unknown_term_is_oov() {
        let mut store = EvidenceStore::new(GlobalEvidence::new(10, 100));
        store.add_term("known", 3, 7);

        assert!(!store.term("known").is_oov());
        assert_eq!(store.term("known"), GlobalTermEvidence::new(3, 7));
        assert!(store.term("missing").is_oov());
        assert_eq!(store.term("missing").df, 0);
    }

    #[test]
    fn test_add_term_replaces() {
        let mut store = EvidenceStore::new(GlobalEvidence::new(10, 100));
        store.add_term("t", 1, 1);
        store.add_term("t", 2, 5);
        assert_eq!(store.num_terms(), 1);
        assert_eq!(store.term("t").cf, 5);
    }

    #[test]
    fn test_json_reload() {
        let mut store = EvidenceStore::new(GlobalEvidence::new(1000, 250_000));
        store.add_term("cascade", 40, 90);

        let mut json = Vec::new();
        store.to_json_writer(&mut json).unwrap();
        let restored = EvidenceStore::from_json_bytes(&json).unwrap();

        assert_eq!(restored.global, store.global);
        assert_eq!(restored.term("cascade"), GlobalTermEvidence::new(40, 90));
    }

    #[test]
    fn test_malformed_json() {
        let err = EvidenceStore::from_json_bytes(b"{not json").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
