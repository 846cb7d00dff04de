//! Document vectors: per-document term sequences from the forward index
//!
//! Two codecs share one decode contract ([`DocumentVector`]):
//! - [`VarByteDocumentVector`]: the term-id sequence, each id a vint
//! - [`MiniIndexDocumentVector`]: a per-document mini inverted index,
//!   `term -> delta-coded positions`
//!
//! For the same logical document both codecs produce identical term sequences,
//! position arrays and lengths.

use std::io::Read;

use byteorder::{ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::vint::{read_vint_u32, write_vint};
use crate::TermId;
use crate::error::{Error, Result};

/// Decode contract for an encoded document vector
pub trait DocumentVector: Send + Sync {
    /// Full term-id sequence in document order
    fn decompress_document(&self) -> Result<Vec<TermId>>;

    /// Positions of each query term, one strictly increasing array per term
    /// (empty when the term does not occur)
    fn decompress_positions(&self, query_terms: &[TermId]) -> Result<Vec<Vec<u32>>>;

    /// Document length in tokens
    fn document_length(&self) -> u32;
}

/// Available document-vector codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocVectorCodec {
    #[default]
    VarByte,
    MiniIndex,
}

impl DocVectorCodec {
    pub fn to_u8(self) -> u8 {
        match self {
            DocVectorCodec::VarByte => 0,
            DocVectorCodec::MiniIndex => 1,
        }
    }

    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(DocVectorCodec::VarByte),
            1 => Ok(DocVectorCodec::MiniIndex),
            other => Err(Error::Decode(format!("unknown document vector codec {}", other))),
        }
    }

    /// Encode a term-id sequence
    pub fn encode(self, terms: &[TermId]) -> Result<Vec<u8>> {
        match self {
            DocVectorCodec::VarByte => VarByteDocumentVector::encode(terms),
            DocVectorCodec::MiniIndex => MiniIndexDocumentVector::encode(terms),
        }
    }

    /// Wrap encoded bytes behind the decode contract
    pub fn open(self, bytes: Vec<u8>) -> Result<Box<dyn DocumentVector>> {
        Ok(match self {
            DocVectorCodec::VarByte => Box::new(VarByteDocumentVector::from_bytes(bytes)?),
            DocVectorCodec::MiniIndex => Box::new(MiniIndexDocumentVector::from_bytes(bytes)?),
        })
    }
}

/// Read the leading document length shared by both formats
fn read_header(bytes: &[u8]) -> Result<(u32, usize)> {
    let mut reader = bytes;
    let doc_len = read_vint_u32(&mut reader)?;
    Ok((doc_len, bytes.len() - reader.len()))
}

/// Every token costs at least one body byte in both formats, so a larger
/// header length is corrupt; checked before anything is sized by it
fn check_doc_len(doc_len: u32, body: &[u8]) -> Result<()> {
    if doc_len as usize > body.len() {
        return Err(Error::Decode(format!(
            "document length {} exceeds {} body bytes",
            doc_len,
            body.len()
        )));
    }
    Ok(())
}

// ── VarByte ──────────────────────────────────────────────────────────────

/// Term-id sequence, `doc_len` followed by one vint per token
#[derive(Debug, Clone)]
pub struct VarByteDocumentVector {
    bytes: Vec<u8>,
    doc_len: u32,
    body: usize,
}

impl VarByteDocumentVector {
    pub fn encode(terms: &[TermId]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(terms.len() + 4);
        write_vint(&mut out, terms.len() as u64)?;
        for &t in terms {
            write_vint(&mut out, t as u64)?;
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let (doc_len, body) = read_header(&bytes)?;
        Ok(Self {
            bytes,
            doc_len,
            body,
        })
    }
}

impl DocumentVector for VarByteDocumentVector {
    fn decompress_document(&self) -> Result<Vec<TermId>> {
        let mut reader = &self.bytes[self.body..];
        check_doc_len(self.doc_len, reader)?;
        let mut terms = Vec::with_capacity(self.doc_len as usize);
        for _ in 0..self.doc_len {
            terms.push(read_vint_u32(&mut reader)?);
        }
        if !reader.is_empty() {
            return Err(Error::Decode(format!(
                "{} trailing bytes after {} terms",
                reader.len(),
                self.doc_len
            )));
        }
        Ok(terms)
    }

    fn decompress_positions(&self, query_terms: &[TermId]) -> Result<Vec<Vec<u32>>> {
        let terms = self.decompress_document()?;
        let mut positions = vec![Vec::new(); query_terms.len()];
        for (pos, term) in terms.iter().enumerate() {
            for (slot, query_term) in query_terms.iter().enumerate() {
                if term == query_term {
                    positions[slot].push(pos as u32);
                }
            }
        }
        Ok(positions)
    }

    fn document_length(&self) -> u32 {
        self.doc_len
    }
}

// ── Mini inverted index ──────────────────────────────────────────────────

/// Per-document inverted index:
/// `doc_len, num_terms, [term delta, tf, position gaps...]` with terms ascending
#[derive(Debug, Clone)]
pub struct MiniIndexDocumentVector {
    bytes: Vec<u8>,
    doc_len: u32,
    body: usize,
}

impl MiniIndexDocumentVector {
    pub fn encode(terms: &[TermId]) -> Result<Vec<u8>> {
        let mut entries: Vec<(TermId, Vec<u32>)> = Vec::new();
        let mut order: Vec<(TermId, u32)> = terms
            .iter()
            .enumerate()
            .map(|(pos, &t)| (t, pos as u32))
            .collect();
        order.sort_unstable();
        for (term, pos) in order {
            match entries.last_mut() {
                Some((t, positions)) if *t == term => positions.push(pos),
                _ => entries.push((term, vec![pos])),
            }
        }

        let mut out = Vec::new();
        write_vint(&mut out, terms.len() as u64)?;
        write_vint(&mut out, entries.len() as u64)?;
        let mut prev_term = 0u32;
        for (term, positions) in &entries {
            write_vint(&mut out, (term - prev_term) as u64)?;
            prev_term = *term;
            write_vint(&mut out, positions.len() as u64)?;
            let mut prev = 0u32;
            for &p in positions {
                write_vint(&mut out, (p - prev) as u64)?;
                prev = p;
            }
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let (doc_len, body) = read_header(&bytes)?;
        Ok(Self {
            bytes,
            doc_len,
            body,
        })
    }

    /// Decode every `(term, positions)` entry, validating the layout
    fn entries(&self) -> Result<Vec<(TermId, Vec<u32>)>> {
        let mut reader = &self.bytes[self.body..];
        check_doc_len(self.doc_len, reader)?;
        let num_terms = read_vint_u32(&mut reader)?;
        let mut entries = Vec::with_capacity(num_terms.min(self.doc_len) as usize);
        let mut term = 0u32;
        let mut total = 0u64;

        for i in 0..num_terms {
            let delta = read_vint_u32(&mut reader)?;
            if i > 0 && delta == 0 {
                return Err(Error::Decode(format!("duplicate term {} in mini index", term)));
            }
            term = term
                .checked_add(delta)
                .ok_or_else(|| Error::Decode("term id overflow".to_string()))?;

            let tf = read_vint_u32(&mut reader)?;
            if tf == 0 {
                return Err(Error::Decode(format!("term {} with zero frequency", term)));
            }
            let mut positions = Vec::with_capacity(tf.min(self.doc_len) as usize);
            let mut pos = 0u32;
            for j in 0..tf {
                let gap = read_vint_u32(&mut reader)?;
                if j > 0 && gap == 0 {
                    return Err(Error::Decode(format!(
                        "term {}: duplicate position {}",
                        term, pos
                    )));
                }
                pos = pos
                    .checked_add(gap)
                    .ok_or_else(|| Error::Decode("position overflow".to_string()))?;
                if pos >= self.doc_len {
                    return Err(Error::Decode(format!(
                        "term {}: position {} beyond document length {}",
                        term, pos, self.doc_len
                    )));
                }
                positions.push(pos);
            }
            total += tf as u64;
            entries.push((term, positions));
        }

        if total != self.doc_len as u64 {
            return Err(Error::Decode(format!(
                "mini index covers {} tokens, document length is {}",
                total, self.doc_len
            )));
        }
        Ok(entries)
    }
}

impl DocumentVector for MiniIndexDocumentVector {
    fn decompress_document(&self) -> Result<Vec<TermId>> {
        let entries = self.entries()?;
        let mut slots: Vec<Option<TermId>> = vec![None; self.doc_len as usize];
        for (term, positions) in entries {
            for p in positions {
                let slot = &mut slots[p as usize];
                if slot.is_some() {
                    return Err(Error::Decode(format!("position {} assigned twice", p)));
                }
                *slot = Some(term);
            }
        }
        // Counts match doc_len and no slot is assigned twice, so every slot is filled
        Ok(slots.into_iter().flatten().collect())
    }

    fn decompress_positions(&self, query_terms: &[TermId]) -> Result<Vec<Vec<u32>>> {
        let entries = self.entries()?;
        Ok(query_terms
            .iter()
            .map(|q| {
                entries
                    .binary_search_by_key(q, |(t, _)| *t)
                    .map(|idx| entries[idx].1.clone())
                    .unwrap_or_default()
            })
            .collect())
    }

    fn document_length(&self) -> u32 {
        self.doc_len
    }
}

/// Framed storage of encoded vectors: `[len: u32][bytes]` per document
pub(crate) fn write_framed<W: std::io::Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_u32::<byteorder::LittleEndian>(bytes.len() as u32)?;
    writer.write_all(bytes)?;
    Ok(())
}

pub(crate) fn read_framed<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = reader.read_u32::<byteorder::LittleEndian>()? as u64;
    // Grow with the data actually present rather than trusting the frame header
    let mut bytes = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut bytes)?;
    if bytes.len() as u64 != len {
        return Err(Error::Decode(format!(
            "document vector frame truncated: {} of {} bytes",
            bytes.len(),
            len
        )));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &[TermId] = &[4, 1, 9, 1, 4, 4, 0];

    #[test]
    fn test_codecs_agree() {
        for codec in [DocVectorCodec::VarByte, DocVectorCodec::MiniIndex] {
            let vector = codec.open(codec.encode(DOC).unwrap()).unwrap();
            assert_eq!(vector.document_length(), 7, "{:?}", codec);
            assert_eq!(vector.decompress_document().unwrap(), DOC, "{:?}", codec);
            assert_eq!(
                vector.decompress_positions(&[4, 1, 42]).unwrap(),
                vec![vec![0, 4, 5], vec![1, 3], vec![]],
                "{:?}",
                codec
            );
        }
    }

    #[test]
    fn test_empty_document() {
        for codec in [DocVectorCodec::VarByte, DocVectorCodec::MiniIndex] {
            let vector = codec.open(codec.encode(&[]).unwrap()).unwrap();
            assert_eq!(vector.document_length(), 0);
            assert!(vector.decompress_document().unwrap().is_empty());
            assert_eq!(vector.decompress_positions(&[3]).unwrap(), vec![Vec::<u32>::new()]);
        }
    }

    #[test]
    fn test_codec_tag() {
        for codec in [DocVectorCodec::VarByte, DocVectorCodec::MiniIndex] {
            assert_eq!(DocVectorCodec::from_u8(codec.to_u8()).unwrap(), codec);
        }
        assert!(DocVectorCodec::from_u8(7).is_err());
    }

    #[test]
    fn test_truncated_varbyte() {
        let mut bytes = DocVectorCodec::VarByte.encode(DOC).unwrap();
        bytes.pop();
        let vector = DocVectorCodec::VarByte.open(bytes).unwrap();
        assert!(matches!(vector.decompress_document(), Err(Error::Decode(_))));
    }

    #[test]
    fn test_oversized_header_is_decode_error() {
        // doc_len = u32::MAX with a single body byte
        let bytes = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F, 0x00];
        for codec in [DocVectorCodec::VarByte, DocVectorCodec::MiniIndex] {
            let vector = codec.open(bytes.clone()).unwrap();
            assert_eq!(vector.document_length(), u32::MAX);
            assert!(
                matches!(vector.decompress_document(), Err(Error::Decode(_))),
                "{:?}",
                codec
            );
            assert!(matches!(
                vector.decompress_positions(&[0]),
                Err(Error::Decode(_))
            ));
        }
    }

    #[test]
    fn test_truncated_frame() {
        let mut framed = Vec::new();
        write_framed(&mut framed, &[1, 2, 3, 4]).unwrap();
        framed.truncate(6);
        assert!(matches!(
            read_framed(&mut framed.as_slice()),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_mini_index_duplicate_position() {
        // doc_len 2, one term (id 3) with tf 2 and gaps [1, 0]
        let mut bytes = Vec::new();
        for v in [2u64, 1, 3, 2, 1, 0] {
            write_vint(&mut bytes, v).unwrap();
        }
        let vector = DocVectorCodec::MiniIndex.open(bytes).unwrap();
        assert!(matches!(vector.decompress_document(), Err(Error::Decode(_))));
        assert!(matches!(vector.decompress_positions(&[3]), Err(Error::Decode(_))));
    }

    #[test]
    fn test_mini_index_overlapping_terms() {
        // doc_len 2, term 1 at [0], term 2 at [0] -> slot 0 assigned twice
        let mut bytes = Vec::new();
        for v in [2u64, 2, 1, 1, 0, 1, 1, 0] {
            write_vint(&mut bytes, v).unwrap();
        }
        let vector = DocVectorCodec::MiniIndex.open(bytes).unwrap();
        assert!(matches!(vector.decompress_document(), Err(Error::Decode(_))));
    }
}
