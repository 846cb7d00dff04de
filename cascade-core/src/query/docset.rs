//! DocSet trait and the cursors the cascade iterates over.
//!
//! `DocSet` is a forward-only cursor over sorted document IDs. Movement is
//! fallible because positional postings are decoded lazily, block by block,
//! and malformed bytes must abort the query.

use crate::DocId;
use crate::error::Result;
use crate::structures::{PositionPostingIterator, TERMINATED};

/// Forward-only cursor over sorted document IDs.
pub trait DocSet: Send + Sync {
    /// Current document ID, or [`TERMINATED`] if exhausted.
    fn doc(&self) -> DocId;

    /// Advance to the next document. Returns the new doc ID or [`TERMINATED`].
    fn advance(&mut self) -> Result<DocId>;

    /// Seek to the first document >= `target`. Returns doc ID or [`TERMINATED`].
    fn seek(&mut self, target: DocId) -> Result<DocId> {
        let mut doc = self.doc();
        while doc < target {
            doc = self.advance()?;
        }
        Ok(doc)
    }

    /// Estimated number of remaining documents.
    fn size_hint(&self) -> u32;
}

impl DocSet for PositionPostingIterator {
    #[inline]
    fn doc(&self) -> DocId {
        PositionPostingIterator::doc(self)
    }

    #[inline]
    fn advance(&mut self) -> Result<DocId> {
        PositionPostingIterator::advance(self)
    }

    #[inline]
    fn seek(&mut self, target: DocId) -> Result<DocId> {
        PositionPostingIterator::seek(self, target)
    }

    fn size_hint(&self) -> u32 {
        PositionPostingIterator::size_hint(self)
    }
}

// ── UnionDocSet ──────────────────────────────────────────────────────────

/// Document-sorted merge-union over several cursors, each doc reported once.
pub struct UnionDocSet<D: DocSet> {
    docsets: Vec<D>,
    current: DocId,
}

impl<D: DocSet> UnionDocSet<D> {
    pub fn new(docsets: Vec<D>) -> Self {
        let current = docsets.iter().map(|d| d.doc()).min().unwrap_or(TERMINATED);
        Self { docsets, current }
    }

    pub fn len(&self) -> usize {
        self.docsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docsets.is_empty()
    }
}

impl<D: DocSet> DocSet for UnionDocSet<D> {
    #[inline]
    fn doc(&self) -> DocId {
        self.current
    }

    fn advance(&mut self) -> Result<DocId> {
        if self.current == TERMINATED {
            return Ok(TERMINATED);
        }
        let mut next = TERMINATED;
        for docset in &mut self.docsets {
            let mut doc = docset.doc();
            if doc == self.current {
                doc = docset.advance()?;
            }
            next = next.min(doc);
        }
        self.current = next;
        Ok(next)
    }

    fn seek(&mut self, target: DocId) -> Result<DocId> {
        if self.current >= target {
            return Ok(self.current);
        }
        let mut next = TERMINATED;
        for docset in &mut self.docsets {
            next = next.min(docset.seek(target)?);
        }
        self.current = next;
        Ok(next)
    }

    fn size_hint(&self) -> u32 {
        self.docsets
            .iter()
            .map(|d| d.size_hint())
            .max()
            .unwrap_or(0)
    }
}

/// Drain a cursor into a sorted vector of doc IDs
pub fn collect_docs<D: DocSet>(docset: &mut D) -> Result<Vec<DocId>> {
    let mut docs = Vec::with_capacity(docset.size_hint() as usize);
    let mut doc = docset.doc();
    while doc != TERMINATED {
        docs.push(doc);
        doc = docset.advance()?;
    }
    Ok(docs)
}
