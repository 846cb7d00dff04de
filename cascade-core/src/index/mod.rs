//! Read-only positional index consumed by the query engine
//!
//! The engine reads postings, document lengths, evidence and document vectors
//! through [`PostingsSource`]. [`PositionalIndex`] is the in-process
//! implementation, loaded from the artifact written by [`IndexBuilder`].
//!
//! Artifact layout (little-endian):
//! ```text
//!   magic: u32, version: u32, codec: u8
//!   num_terms: u32, [term_len: u32, term bytes, posting list]*
//!   num_docs: u32, [doc_len: u32]*, [framed document vector]*
//! ```

mod builder;

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use rustc_hash::FxHashMap;

pub use builder::IndexBuilder;

use crate::error::{Error, Result};
use crate::evidence::{EvidenceStore, GlobalEvidence, GlobalTermEvidence};
use crate::structures::{
    DocVectorCodec, DocumentVector, PositionPostingIterator, PositionPostingList, read_framed,
    write_framed,
};
use crate::{DocId, TermId};

const INDEX_MAGIC: u32 = 0x4353_4344;
const INDEX_VERSION: u32 = 1;

/// Access contract between the query engine and the index
pub trait PostingsSource: Send + Sync {
    /// Open a positional cursor for a term; `None` if the term is not indexed
    fn open_postings(&self, term: &str) -> Result<Option<PositionPostingIterator>>;

    /// Length in tokens of a document
    fn doc_len(&self, doc: DocId) -> Result<u32>;

    /// Collection-wide evidence
    fn global_evidence(&self) -> GlobalEvidence;

    /// Per-term evidence (zero for OOV terms)
    fn term_evidence(&self, term: &str) -> GlobalTermEvidence;

    /// Precomputed evidence for a window concept, keyed by its query form
    /// (`#od1(new york)`); `None` makes the clique scan its postings at bind time
    fn concept_evidence(&self, _concept: &str) -> Option<GlobalTermEvidence> {
        None
    }

    /// Term id in the forward-index vocabulary
    fn term_id(&self, term: &str) -> Option<TermId>;

    /// Encoded document vector of a document
    fn document_vector(&self, doc: DocId) -> Result<Box<dyn DocumentVector>> {
        Err(Error::Unsupported(format!(
            "no forward index available for doc {}",
            doc
        )))
    }

    fn num_docs(&self) -> u32;
}

/// In-memory positional index with forward document vectors
pub struct PositionalIndex {
    vocabulary: FxHashMap<String, TermId>,
    /// Posting lists indexed by term id
    postings: Vec<Arc<PositionPostingList>>,
    doc_lengths: Vec<u32>,
    codec: DocVectorCodec,
    doc_vectors: Vec<Vec<u8>>,
    evidence: EvidenceStore,
}

impl PositionalIndex {
    pub(crate) fn from_parts(
        terms: Vec<(String, PositionPostingList)>,
        doc_lengths: Vec<u32>,
        codec: DocVectorCodec,
        doc_vectors: Vec<Vec<u8>>,
    ) -> Result<Self> {
        if doc_vectors.len() != doc_lengths.len() {
            return Err(Error::Decode(format!(
                "{} document vectors for {} documents",
                doc_vectors.len(),
                doc_lengths.len()
            )));
        }

        let collection_length: u64 = doc_lengths.iter().map(|&l| l as u64).sum();
        let mut evidence =
            EvidenceStore::new(GlobalEvidence::new(doc_lengths.len() as u64, collection_length));

        let mut vocabulary = FxHashMap::default();
        let mut postings = Vec::with_capacity(terms.len());
        for (id, (term, list)) in terms.into_iter().enumerate() {
            evidence.add_term(&term, list.doc_count() as u64, list.total_tf());
            if vocabulary.insert(term.clone(), id as TermId).is_some() {
                return Err(Error::Decode(format!("duplicate vocabulary entry '{}'", term)));
            }
            postings.push(Arc::new(list));
        }

        debug!(
            "PositionalIndex: num_terms={}, num_docs={}, collection_length={}, codec={:?}",
            postings.len(),
            doc_lengths.len(),
            collection_length,
            codec
        );

        Ok(Self {
            vocabulary,
            postings,
            doc_lengths,
            codec,
            doc_vectors,
            evidence,
        })
    }

    /// Replace the evidence derived from this index (e.g. with collection-wide
    /// statistics computed over a larger corpus)
    pub fn with_evidence(mut self, evidence: EvidenceStore) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    pub fn codec(&self) -> DocVectorCodec {
        self.codec
    }

    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }

    /// Open an index artifact from a file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::deserialize(&mut std::io::BufReader::new(file))
    }

    /// Write the index artifact to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.serialize(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(INDEX_MAGIC)?;
        writer.write_u32::<LittleEndian>(INDEX_VERSION)?;
        writer.write_u8(self.codec.to_u8())?;

        let mut terms: Vec<(&String, &TermId)> = self.vocabulary.iter().collect();
        terms.sort_unstable_by_key(|(_, id)| **id);
        writer.write_u32::<LittleEndian>(terms.len() as u32)?;
        for (term, &id) in terms {
            writer.write_u32::<LittleEndian>(term.len() as u32)?;
            writer.write_all(term.as_bytes())?;
            self.postings[id as usize].serialize(writer)?;
        }

        writer.write_u32::<LittleEndian>(self.doc_lengths.len() as u32)?;
        for &len in &self.doc_lengths {
            writer.write_u32::<LittleEndian>(len)?;
        }
        for vector in &self.doc_vectors {
            write_framed(writer, vector)?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != INDEX_MAGIC {
            return Err(Error::Decode(format!("bad index magic {:#x}", magic)));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != INDEX_VERSION {
            return Err(Error::Decode(format!("unsupported index version {}", version)));
        }
        let codec = DocVectorCodec::from_u8(reader.read_u8()?)?;

        let num_terms = reader.read_u32::<LittleEndian>()? as usize;
        let mut terms = Vec::with_capacity(num_terms.min(1 << 20));
        for _ in 0..num_terms {
            let len = reader.read_u32::<LittleEndian>()? as usize;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            let term = String::from_utf8(bytes)
                .map_err(|e| Error::Decode(format!("term is not UTF-8: {}", e)))?;
            let list = PositionPostingList::deserialize(reader)?;
            terms.push((term, list));
        }

        let num_docs = reader.read_u32::<LittleEndian>()? as usize;
        let mut doc_lengths = Vec::with_capacity(num_docs.min(1 << 24));
        for _ in 0..num_docs {
            doc_lengths.push(reader.read_u32::<LittleEndian>()?);
        }
        let mut doc_vectors = Vec::with_capacity(num_docs.min(1 << 24));
        for _ in 0..num_docs {
            doc_vectors.push(read_framed(reader)?);
        }

        Self::from_parts(terms, doc_lengths, codec, doc_vectors)
    }
}

impl PostingsSource for PositionalIndex {
    fn open_postings(&self, term: &str) -> Result<Option<PositionPostingIterator>> {
        match self.vocabulary.get(term) {
            Some(&id) => Ok(Some(self.postings[id as usize].iter()?)),
            None => Ok(None),
        }
    }

    fn doc_len(&self, doc: DocId) -> Result<u32> {
        self.doc_lengths.get(doc as usize).copied().ok_or_else(|| {
            Error::Decode(format!(
                "doc {} outside index of {} documents",
                doc,
                self.doc_lengths.len()
            ))
        })
    }

    fn global_evidence(&self) -> GlobalEvidence {
        self.evidence.global
    }

    fn term_evidence(&self, term: &str) -> GlobalTermEvidence {
        self.evidence.term(term)
    }

    fn concept_evidence(&self, concept: &str) -> Option<GlobalTermEvidence> {
        self.evidence
            .has_term(concept)
            .then(|| self.evidence.term(concept))
    }

    fn term_id(&self, term: &str) -> Option<TermId> {
        self.vocabulary.get(term).copied()
    }

    fn document_vector(&self, doc: DocId) -> Result<Box<dyn DocumentVector>> {
        let bytes = self.doc_vectors.get(doc as usize).ok_or_else(|| {
            Error::Decode(format!("no document vector for doc {}", doc))
        })?;
        self.codec.open(bytes.clone())
    }

    fn num_docs(&self) -> u32 {
        self.doc_lengths.len() as u32
    }
}

impl std::fmt::Debug for PositionalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionalIndex")
            .field("num_terms", &self.postings.len())
            .field("num_docs", &self.doc_lengths.len())
            .field("codec", &self.codec)
            .finish()
    }
}
