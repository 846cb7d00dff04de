//! Positional posting lists for term and proximity features
//!
//! ## Block Format
//!
//! Uses a block-based format with skip list for efficient seeking by doc_id:
//! - Skip list enables O(log n) lookup by doc_id
//! - Blocks of up to 128 documents
//! - Doc ids and positions delta-encoded within a document/block
//!
//! Format:
//! ```text
//! Header:
//!   - doc_count: u32
//!   - num_blocks: u32
//!   - skip_list: [(base_doc_id, last_doc_id, byte_offset)] per block
//!   - data_len: u32
//! Data:
//!   - blocks: count(u32) first_doc(u32), then per posting:
//!     [doc delta vint (not for first)] num_positions vint, position gaps vint
//! ```
//!
//! Decoding is strict: doc ids must strictly increase across the whole list and
//! positions must strictly increase within a document. Anything else is a
//! [`Error::Decode`].

use std::io::{Read, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::vint::{read_vint_u32, write_vint};
use crate::DocId;
use crate::error::{Error, Result};

/// Block size for position posting lists
pub const POSITION_BLOCK_SIZE: usize = 128;

/// Sentinel doc id for exhausted cursors
pub const TERMINATED: DocId = u32::MAX;

/// A posting entry with positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingWithPositions {
    pub doc_id: DocId,
    /// Token positions, strictly increasing
    pub positions: Vec<u32>,
}

impl PostingWithPositions {
    pub fn new(doc_id: DocId, positions: Vec<u32>) -> Self {
        Self { doc_id, positions }
    }

    #[inline]
    pub fn term_freq(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// Block-based position posting list with skip list for O(log n) doc_id lookup
#[derive(Debug, Clone, Default)]
pub struct PositionPostingList {
    /// Skip list: (base_doc_id, last_doc_id, byte_offset)
    skip_list: Vec<(DocId, DocId, u32)>,
    /// Compressed block data
    data: Vec<u8>,
    /// Total document count
    doc_count: u32,
    /// Total number of positions (collection frequency)
    total_tf: u64,
}

impl PositionPostingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from postings sorted by doc id
    pub fn from_postings(postings: &[PostingWithPositions]) -> Result<Self> {
        let mut skip_list = Vec::new();
        let mut data = Vec::new();
        let mut total_tf = 0u64;
        let mut prev_doc: Option<DocId> = None;

        for block in postings.chunks(POSITION_BLOCK_SIZE) {
            let block_start = data.len() as u32;
            let base_doc_id = block[0].doc_id;
            let last_doc_id = block[block.len() - 1].doc_id;
            skip_list.push((base_doc_id, last_doc_id, block_start));

            data.write_u32::<LittleEndian>(block.len() as u32)?;
            data.write_u32::<LittleEndian>(base_doc_id)?;

            for (j, posting) in block.iter().enumerate() {
                if let Some(prev) = prev_doc
                    && posting.doc_id <= prev
                {
                    return Err(Error::Decode(format!(
                        "postings not strictly increasing: doc {} after {}",
                        posting.doc_id, prev
                    )));
                }
                if j > 0 {
                    write_vint(&mut data, (posting.doc_id - prev_doc.unwrap_or(0)) as u64)?;
                }
                prev_doc = Some(posting.doc_id);

                write_vint(&mut data, posting.positions.len() as u64)?;
                let mut prev_pos: Option<u32> = None;
                for &pos in &posting.positions {
                    let gap = match prev_pos {
                        Some(p) if pos <= p => {
                            return Err(Error::Decode(format!(
                                "doc {}: positions not strictly increasing ({} after {})",
                                posting.doc_id, pos, p
                            )));
                        }
                        Some(p) => pos - p,
                        None => pos,
                    };
                    write_vint(&mut data, gap as u64)?;
                    prev_pos = Some(pos);
                }
                total_tf += posting.positions.len() as u64;
            }
        }

        Ok(Self {
            skip_list,
            data,
            doc_count: postings.len() as u32,
            total_tf,
        })
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Total occurrences over all documents
    pub fn total_tf(&self) -> u64 {
        self.total_tf
    }

    pub fn len(&self) -> usize {
        self.doc_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.doc_count == 0
    }

    /// Get positions for a specific document using binary search on skip list
    pub fn get_positions(&self, target_doc_id: DocId) -> Result<Option<Vec<u32>>> {
        let block_idx = match self.skip_list.binary_search_by(|&(base, last, _)| {
            if target_doc_id < base {
                std::cmp::Ordering::Greater
            } else if target_doc_id > last {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        }) {
            Ok(idx) => idx,
            Err(_) => return Ok(None),
        };

        let postings = self.decode_block(block_idx)?;
        Ok(postings
            .into_iter()
            .find(|p| p.doc_id == target_doc_id)
            .map(|p| p.positions))
    }

    /// Decode and validate one block
    fn decode_block(&self, block_idx: usize) -> Result<Vec<PostingWithPositions>> {
        let (base, last, offset) = self.skip_list[block_idx];
        let mut reader = self
            .data
            .get(offset as usize..)
            .ok_or_else(|| Error::Decode(format!("block offset {} out of range", offset)))?;

        let count = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Decode("truncated block header".to_string()))?
            as usize;
        let first_doc = reader
            .read_u32::<LittleEndian>()
            .map_err(|_| Error::Decode("truncated block header".to_string()))?;
        if first_doc != base {
            return Err(Error::Decode(format!(
                "block {} starts at doc {} but skip list says {}",
                block_idx, first_doc, base
            )));
        }

        let mut postings = Vec::with_capacity(count);
        let mut prev_doc_id = first_doc;
        for i in 0..count {
            let doc_id = if i == 0 {
                first_doc
            } else {
                let delta = read_vint_u32(&mut reader)?;
                if delta == 0 {
                    return Err(Error::Decode(format!("duplicate doc id {}", prev_doc_id)));
                }
                prev_doc_id.checked_add(delta).ok_or_else(|| {
                    Error::Decode(format!("doc id overflow after {}", prev_doc_id))
                })?
            };
            prev_doc_id = doc_id;

            let num_positions = read_vint_u32(&mut reader)? as usize;
            let mut positions = Vec::with_capacity(num_positions);
            let mut pos = 0u32;
            for j in 0..num_positions {
                let gap = read_vint_u32(&mut reader)?;
                if j > 0 && gap == 0 {
                    return Err(Error::Decode(format!(
                        "doc {}: duplicate position {}",
                        doc_id, pos
                    )));
                }
                pos = pos.checked_add(gap).ok_or_else(|| {
                    Error::Decode(format!("doc {}: position overflow", doc_id))
                })?;
                positions.push(pos);
            }

            postings.push(PostingWithPositions { doc_id, positions });
        }

        if prev_doc_id != last {
            return Err(Error::Decode(format!(
                "block {} ends at doc {} but skip list says {}",
                block_idx, prev_doc_id, last
            )));
        }

        Ok(postings)
    }

    /// Serialize to bytes with block format
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.doc_count)?;
        writer.write_u64::<LittleEndian>(self.total_tf)?;

        writer.write_u32::<LittleEndian>(self.skip_list.len() as u32)?;
        for (base_doc_id, last_doc_id, offset) in &self.skip_list {
            writer.write_u32::<LittleEndian>(*base_doc_id)?;
            writer.write_u32::<LittleEndian>(*last_doc_id)?;
            writer.write_u32::<LittleEndian>(*offset)?;
        }

        writer.write_u32::<LittleEndian>(self.data.len() as u32)?;
        writer.write_all(&self.data)?;

        Ok(())
    }

    /// Deserialize from bytes, validating the skip list
    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let doc_count = reader.read_u32::<LittleEndian>()?;
        let total_tf = reader.read_u64::<LittleEndian>()?;

        let skip_count = reader.read_u32::<LittleEndian>()? as usize;
        let mut skip_list = Vec::with_capacity(skip_count.min(1 << 20));
        let mut prev_last: Option<DocId> = None;
        for _ in 0..skip_count {
            let base_doc_id = reader.read_u32::<LittleEndian>()?;
            let last_doc_id = reader.read_u32::<LittleEndian>()?;
            let offset = reader.read_u32::<LittleEndian>()?;
            if base_doc_id > last_doc_id || prev_last.is_some_and(|p| base_doc_id <= p) {
                return Err(Error::Decode(format!(
                    "skip list not monotonic at block ({}, {})",
                    base_doc_id, last_doc_id
                )));
            }
            prev_last = Some(last_doc_id);
            skip_list.push((base_doc_id, last_doc_id, offset));
        }

        let data_len = reader.read_u32::<LittleEndian>()? as usize;
        let mut data = vec![0u8; data_len];
        reader.read_exact(&mut data)?;

        Ok(Self {
            skip_list,
            data,
            doc_count,
            total_tf,
        })
    }

    /// Cursor over all postings
    pub fn iter(self: &Arc<Self>) -> Result<PositionPostingIterator> {
        PositionPostingIterator::new(Arc::clone(self))
    }
}

/// Cursor over a block-based position posting list
///
/// Owns a shared handle to the list so that cliques can keep their cursors for
/// the whole query and rewind them between cascade stages.
pub struct PositionPostingIterator {
    list: Arc<PositionPostingList>,
    current_block: usize,
    position_in_block: usize,
    block_postings: Vec<PostingWithPositions>,
    exhausted: bool,
}

impl PositionPostingIterator {
    pub fn new(list: Arc<PositionPostingList>) -> Result<Self> {
        let mut iter = Self {
            list,
            current_block: 0,
            position_in_block: 0,
            block_postings: Vec::new(),
            exhausted: false,
        };
        iter.load_block(0)?;
        Ok(iter)
    }

    /// Empty cursor, for terms absent from the index
    pub fn empty() -> Self {
        Self {
            list: Arc::new(PositionPostingList::new()),
            current_block: 0,
            position_in_block: 0,
            block_postings: Vec::new(),
            exhausted: true,
        }
    }

    fn load_block(&mut self, block_idx: usize) -> Result<()> {
        if block_idx >= self.list.skip_list.len() {
            self.exhausted = true;
            self.block_postings.clear();
            return Ok(());
        }

        self.current_block = block_idx;
        self.position_in_block = 0;
        self.block_postings = self.list.decode_block(block_idx)?;
        self.exhausted = self.block_postings.is_empty();
        Ok(())
    }

    /// Rewind to the first posting
    pub fn reset(&mut self) -> Result<()> {
        self.exhausted = false;
        self.load_block(0)
    }

    /// Number of documents in the underlying list
    pub fn doc_count(&self) -> u32 {
        self.list.doc_count()
    }

    /// Total occurrences in the underlying list
    pub fn total_tf(&self) -> u64 {
        self.list.total_tf()
    }

    #[inline]
    fn current(&self) -> Option<&PostingWithPositions> {
        if self.exhausted {
            None
        } else {
            self.block_postings.get(self.position_in_block)
        }
    }

    /// Current document ID, or [`TERMINATED`] if exhausted
    pub fn doc(&self) -> DocId {
        self.current().map(|p| p.doc_id).unwrap_or(TERMINATED)
    }

    pub fn term_freq(&self) -> u32 {
        self.current().map(|p| p.term_freq()).unwrap_or(0)
    }

    pub fn positions(&self) -> &[u32] {
        self.current().map(|p| p.positions.as_slice()).unwrap_or(&[])
    }

    pub fn advance(&mut self) -> Result<DocId> {
        if self.exhausted {
            return Ok(TERMINATED);
        }

        self.position_in_block += 1;
        if self.position_in_block >= self.block_postings.len() {
            self.load_block(self.current_block + 1)?;
        }
        Ok(self.doc())
    }

    /// Seek to the first document >= `target`
    pub fn seek(&mut self, target: DocId) -> Result<DocId> {
        if self.exhausted {
            return Ok(TERMINATED);
        }
        if self.doc() >= target {
            return Ok(self.doc());
        }

        let in_current_block = self
            .list
            .skip_list
            .get(self.current_block)
            .is_some_and(|&(_, last, _)| target <= last);

        if !in_current_block {
            // First block whose last doc reaches the target
            let block_idx = self
                .list
                .skip_list
                .partition_point(|&(_, last, _)| last < target);
            self.load_block(block_idx)?;
            if self.exhausted {
                return Ok(TERMINATED);
            }
        }

        while self.position_in_block < self.block_postings.len()
            && self.block_postings[self.position_in_block].doc_id < target
        {
            self.position_in_block += 1;
        }
        if self.position_in_block >= self.block_postings.len() {
            self.load_block(self.current_block + 1)?;
        }
        Ok(self.doc())
    }

    /// Estimated number of remaining documents
    pub fn size_hint(&self) -> u32 {
        if self.exhausted {
            return 0;
        }
        let consumed = self.current_block * POSITION_BLOCK_SIZE + self.position_in_block;
        self.list.doc_count().saturating_sub(consumed as u32)
    }
}
