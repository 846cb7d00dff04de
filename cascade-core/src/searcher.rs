//! Searcher - query evaluation over a read-only postings source
//!
//! Each query builds its own clique graph, cascade model and accumulator; the
//! source and the cascade parameters are shared read-only. Batches run in
//! parallel on a dedicated rayon pool, and a failing query never affects the
//! others in its batch.

use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::SearcherConfig;
use crate::error::{Error, Result};
use crate::index::{PositionalIndex, PostingsSource};
use crate::query::{CascadeModel, CascadeStats, CliqueGraph, ModelSpec, ScoredDoc};

/// Ranked results of one query under one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub model: String,
    pub hits: Vec<ScoredDoc>,
    pub stats: CascadeStats,
}

pub struct Searcher {
    source: Arc<dyn PostingsSource>,
    config: SearcherConfig,
    thread_pool: Arc<rayon::ThreadPool>,
}

impl Searcher {
    pub fn new(source: Arc<dyn PostingsSource>, config: SearcherConfig) -> Result<Self> {
        config.cascade.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build()
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        debug!(
            "Searcher: num_docs={}, threads={}, feature_source={:?}, cascade={:?}",
            source.num_docs(),
            config.num_threads,
            config.feature_source,
            config.cascade
        );

        Ok(Self {
            source,
            config,
            thread_pool: Arc::new(pool),
        })
    }

    /// Open an index artifact from disk
    pub fn open<P: AsRef<Path>>(path: P, config: SearcherConfig) -> Result<Self> {
        let index = PositionalIndex::open(path)?;
        Self::new(Arc::new(index), config)
    }

    pub fn config(&self) -> &SearcherConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<dyn PostingsSource> {
        &self.source
    }

    /// Evaluate one query; `limit` defaults to the configured result size
    pub fn search(
        &self,
        model: &ModelSpec,
        terms: &[String],
        limit: Option<usize>,
    ) -> Result<SearchResults> {
        let k = limit.unwrap_or(self.config.default_k);
        let source = self.source.as_ref();

        let graph = CliqueGraph::build(model, terms, source, &self.config.cascade)?;
        let mut cascade = CascadeModel::new(graph).with_feature_source(self.config.feature_source);
        let (hits, stats) = cascade.evaluate(source, k)?;

        debug!(
            "search: model={}, terms={:?}, hits={}, cost={}",
            model.name,
            terms,
            hits.len(),
            stats.total_cost()
        );
        Ok(SearchResults {
            model: model.name.clone(),
            hits,
            stats,
        })
    }

    /// Evaluate a whitespace-separated, lowercased query string
    pub fn search_text(
        &self,
        model: &ModelSpec,
        text: &str,
        limit: Option<usize>,
    ) -> Result<SearchResults> {
        let terms: Vec<String> = text.split_whitespace().map(|w| w.to_lowercase()).collect();
        if terms.is_empty() {
            return Err(Error::Query("empty query".to_string()));
        }
        self.search(model, &terms, limit)
    }

    /// Evaluate independent queries in parallel
    ///
    /// Results are returned in query order, each with its own outcome.
    pub fn search_batch(
        &self,
        model: &ModelSpec,
        queries: &[Vec<String>],
        limit: Option<usize>,
    ) -> Vec<Result<SearchResults>> {
        self.thread_pool.install(|| {
            queries
                .par_iter()
                .map(|terms| {
                    let result = self.search(model, terms, limit);
                    if let Err(e) = &result {
                        warn!("batch query {:?} failed: {}", terms, e);
                    }
                    result
                })
                .collect()
        })
    }
}
