//! Builds a [`PositionalIndex`] from tokenized documents
//!
//! Stands in for the offline index construction pipeline: documents are
//! buffered in memory, then postings, lengths and document vectors are written
//! in one pass by [`IndexBuilder::build`].

use rustc_hash::FxHashMap;

use super::PositionalIndex;
use crate::error::Result;
use crate::structures::{DocVectorCodec, PositionPostingList, PostingWithPositions};
use crate::{DocId, TermId};

/// In-memory index builder
pub struct IndexBuilder {
    codec: DocVectorCodec,
    /// term -> postings accumulated so far (docs added in ascending order)
    postings: FxHashMap<String, Vec<PostingWithPositions>>,
    documents: Vec<Vec<String>>,
}

impl IndexBuilder {
    pub fn new(codec: DocVectorCodec) -> Self {
        Self {
            codec,
            postings: FxHashMap::default(),
            documents: Vec::new(),
        }
    }

    /// Add a document given as tokens; returns its doc id
    pub fn add_document<S: AsRef<str>>(&mut self, tokens: &[S]) -> DocId {
        let doc_id = self.documents.len() as DocId;
        let tokens: Vec<String> = tokens.iter().map(|t| t.as_ref().to_string()).collect();

        for (pos, token) in tokens.iter().enumerate() {
            let entries = self.postings.entry(token.clone()).or_default();
            match entries.last_mut() {
                Some(last) if last.doc_id == doc_id => last.positions.push(pos as u32),
                _ => entries.push(PostingWithPositions::new(doc_id, vec![pos as u32])),
            }
        }

        self.documents.push(tokens);
        doc_id
    }

    /// Add a document from text (splits on whitespace and lowercases)
    pub fn add_text(&mut self, text: &str) -> DocId {
        let tokens: Vec<String> = text.split_whitespace().map(|w| w.to_lowercase()).collect();
        self.add_document(&tokens)
    }

    pub fn num_docs(&self) -> usize {
        self.documents.len()
    }

    /// Write postings, doc lengths and document vectors
    pub fn build(self) -> Result<PositionalIndex> {
        let mut terms: Vec<(String, Vec<PostingWithPositions>)> =
            self.postings.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let term_ids: FxHashMap<&str, TermId> = terms
            .iter()
            .enumerate()
            .map(|(id, (term, _))| (term.as_str(), id as TermId))
            .collect();

        let mut doc_lengths = Vec::with_capacity(self.documents.len());
        let mut doc_vectors = Vec::with_capacity(self.documents.len());
        for tokens in &self.documents {
            let ids: Vec<TermId> = tokens.iter().map(|t| term_ids[t.as_str()]).collect();
            doc_lengths.push(ids.len() as u32);
            doc_vectors.push(self.codec.encode(&ids)?);
        }

        let mut lists = Vec::with_capacity(terms.len());
        for (term, postings) in terms {
            let list = PositionPostingList::from_postings(&postings)?;
            lists.push((term, list));
        }

        PositionalIndex::from_parts(lists, doc_lengths, self.codec, doc_vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PostingsSource;

    #[test]
    fn test_term_ids_sorted() {
        let mut builder = IndexBuilder::new(DocVectorCodec::VarByte);
        builder.add_document(&["zeta", "alpha", "mid"]);
        let index = builder.build().unwrap();

        assert_eq!(index.term_id("alpha"), Some(0));
        assert_eq!(index.term_id("mid"), Some(1));
        assert_eq!(index.term_id("zeta"), Some(2));
    }

    #[test]
    fn test_empty_documents() {
        let mut builder = IndexBuilder::new(DocVectorCodec::MiniIndex);
        assert_eq!(builder.add_text(""), 0);
        assert_eq!(builder.add_text("word"), 1);
        let index = builder.build().unwrap();

        assert_eq!(index.num_docs(), 2);
        assert_eq!(index.doc_len(0).unwrap(), 0);
        assert_eq!(index.global_evidence().collection_length, 1);
        assert!(index.document_vector(0).unwrap().decompress_document().unwrap().is_empty());
    }
}
