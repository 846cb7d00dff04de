//! Searcher configuration and model-wide cascade parameters

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::scoring::{check_bm25_params, check_mu};

/// Default Dirichlet prior, used whenever `mu` is not specified
pub const DEFAULT_DIRICHLET_MU: f32 = 2500.0;

/// Model-wide scoring parameters shared by every clique of a cascade-trained model
///
/// Scoring functions configured with `new_model` read their k1/b/mu from here
/// instead of their own per-instance values. The value is fixed when the
/// [`Searcher`](crate::Searcher) is built and handed to every model build, so all
/// queries evaluated by one searcher see the same parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CascadeParams {
    /// BM25 term frequency saturation
    pub k1: f32,
    /// BM25 length normalization
    pub b: f32,
    /// Dirichlet prior
    pub mu: f32,
}

impl CascadeParams {
    /// Same ranges the per-instance parameters are held to
    pub fn validate(&self) -> Result<()> {
        check_bm25_params(self.k1, self.b)?;
        check_mu(self.mu)
    }
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            mu: DEFAULT_DIRICHLET_MU,
        }
    }
}

/// Where stages after the first take their per-document statistics from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSource {
    /// Rewind and re-scan the clique postings for the survivors
    #[default]
    Postings,
    /// Decode the survivors' document vectors from the forward index
    ForwardIndex,
}

/// Searcher configuration
#[derive(Debug, Clone)]
pub struct SearcherConfig {
    /// Number of threads for batch query evaluation
    pub num_threads: usize,
    /// Result size used when a query does not specify one
    pub default_k: usize,
    /// Statistics source for stages after the first
    pub feature_source: FeatureSource,
    /// Shared parameters for cascade-trained scoring functions
    pub cascade: CascadeParams,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            num_threads: cpus,
            default_k: 1000,
            feature_source: FeatureSource::Postings,
            cascade: CascadeParams::default(),
        }
    }
}
