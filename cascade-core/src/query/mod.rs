//! Query model and cascade evaluation

mod accumulator;
mod cascade;
#[cfg(test)]
mod cascade_tests;
mod clique;
mod clique_graph;
mod docset;
mod importance;
mod model;
mod potential;
mod pruning;
pub mod scoring;

pub use accumulator::{Accumulator, ScoredDoc};
pub use cascade::{CascadeModel, CascadeStats, Stage, StageStats};
pub use clique::{Clique, CliqueType, DocumentContext, Parameter};
pub use clique_graph::CliqueGraph;
pub use docset::{DocSet, UnionDocSet, collect_docs};
pub use importance::{ImportanceFeature, ImportanceModel, WeightedFeature};
pub use model::{
    CliqueSetSpec, Dependence, EvaluationMode, FeatureSpec, MAX_FULL_DEPENDENCE_TERMS, ModelSpec,
};
pub use potential::{
    PotentialFunction, clique_frequency, count_ordered_windows, count_unordered_windows,
};
pub use pruning::PruningFunction;
pub use scoring::{
    ParamSpec, ScoringFunction, ScoringFunctionKind, ScoringKind, ScoringSpec, bm25_idf,
    bm25_score, dirichlet_score,
};
