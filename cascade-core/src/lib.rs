//! Cascade - clique-graph retrieval with cascade ranking
//!
//! Evaluates structured multi-term queries against a read-only positional index:
//! - Term, ordered-window and unordered-window cliques over the query terms
//! - BM25, Dirichlet and Jelinek-Mercer scoring with shared cascade parameters
//! - Cost-ordered cascade stages that prune the candidate pool between stages
//! - Deterministic bounded top-k accumulation
//! - Interchangeable document-vector codecs for forward-index feature computation

pub mod config;
pub mod error;
pub mod evidence;
pub mod index;
pub mod query;
pub mod searcher;
pub mod structures;

pub use config::{CascadeParams, FeatureSource, SearcherConfig};
pub use error::{Error, Result};
pub use evidence::{EvidenceStore, GlobalEvidence, GlobalTermEvidence};
pub use index::{IndexBuilder, PositionalIndex, PostingsSource};
pub use query::{
    Accumulator, CascadeModel, CascadeStats, Clique, CliqueGraph, CliqueType, ModelSpec,
    PruningFunction, ScoredDoc, ScoringFunction, ScoringFunctionKind,
};
pub use searcher::{SearchResults, Searcher};
pub use structures::{DocVectorCodec, DocumentVector, TERMINATED};

pub type DocId = u32;
pub type TermId = u32;
pub type TermFreq = u32;
pub type Score = f32;
