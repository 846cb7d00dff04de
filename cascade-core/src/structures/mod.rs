//! On-disk structures consumed by the query engine

mod doc_vector;
mod positions;
mod vint;

pub use doc_vector::{
    DocVectorCodec, DocumentVector, MiniIndexDocumentVector, VarByteDocumentVector,
};
pub(crate) use doc_vector::{read_framed, write_framed};
pub use positions::{
    POSITION_BLOCK_SIZE, PositionPostingIterator, PositionPostingList, PostingWithPositions,
    TERMINATED,
};
pub use vint::{read_vint, read_vint_u32, write_vint};
