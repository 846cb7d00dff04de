//! Cascade model: cost-ordered stages with pruning between them
//!
//! Cliques are grouped by their cascade stage and the groups are run cheapest
//! first. The first stage scores the merge-union of its terms' postings; every
//! later stage re-scores only the survivors of the previous one and adds its
//! partial score to the running total. After each stage the stage's pruning
//! function shrinks the candidate set, so proximity features are only computed
//! for the few documents that can still make the top k.

use std::collections::BTreeMap;

use log::{debug, trace};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::accumulator::{Accumulator, ScoredDoc};
use super::clique::{Clique, DocumentContext};
use super::clique_graph::CliqueGraph;
use super::docset::{DocSet, UnionDocSet};
use super::model::EvaluationMode;
use super::pruning::PruningFunction;
use crate::config::FeatureSource;
use crate::error::Result;
use crate::index::PostingsSource;
use crate::structures::TERMINATED;
use crate::{DocId, Score, TermId};

/// Work done by one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStats {
    /// Configured stage index
    pub stage: usize,
    pub cliques: usize,
    pub candidates_in: usize,
    pub survivors: usize,
    /// Sum of clique cost over all evaluated (clique, document) pairs
    pub cost: u64,
}

/// Per-stage accounting for one query
///
/// Cost counts only (clique, document) evaluations inside the cascade. Window
/// cliques without stored concept evidence also scan their full conjunctive
/// postings once when the graph is bound; that scan is not included here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeStats {
    pub stages: Vec<StageStats>,
}

impl CascadeStats {
    pub fn total_cost(&self) -> u64 {
        self.stages.iter().map(|s| s.cost).sum()
    }

    /// Candidates scored by the first stage
    pub fn initial_candidates(&self) -> usize {
        self.stages.first().map_or(0, |s| s.candidates_in)
    }
}

/// A group of cliques evaluated together, followed by a pruning step
pub struct Stage {
    index: usize,
    cliques: Vec<Clique>,
    pruning: PruningFunction,
}

impl Stage {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cliques(&self) -> &[Clique] {
        &self.cliques
    }

    pub fn pruning(&self) -> PruningFunction {
        self.pruning
    }

    /// Aggregate static cost of the stage's cliques
    pub fn cost(&self) -> u64 {
        self.cliques.iter().map(|c| c.cost()).sum()
    }

    /// Distinct terms of the stage's cliques, in first-seen order
    fn terms(&self) -> Vec<&str> {
        let mut seen = FxHashSet::default();
        self.cliques
            .iter()
            .flat_map(|c| c.concept().iter())
            .map(|t| t.as_str())
            .filter(|t| seen.insert(*t))
            .collect()
    }

    fn term_ids(&self) -> Vec<TermId> {
        let mut ids: Vec<TermId> = self.cliques.iter().flat_map(|c| c.term_ids()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn reset(&mut self) -> Result<()> {
        for clique in &mut self.cliques {
            clique.reset_postings_reader()?;
        }
        Ok(())
    }

    /// Weighted sum of the stage's clique scores for one document
    fn score(&mut self, ctx: &DocumentContext<'_>) -> Result<Score> {
        let mut total = 0.0f64;
        for clique in &mut self.cliques {
            total += clique.weight().weight as f64 * clique.score(ctx)? as f64;
        }
        Ok(total as Score)
    }
}

/// Staged evaluation plan for one query
pub struct CascadeModel {
    model: String,
    stages: Vec<Stage>,
    feature_source: FeatureSource,
    all_oov: bool,
}

impl CascadeModel {
    /// Group the graph's cliques into stages ordered by ascending cost
    ///
    /// Exhaustive models get a single unpruned stage.
    pub fn new(graph: CliqueGraph) -> Self {
        match graph.mode() {
            EvaluationMode::Cascade => Self::staged(graph),
            EvaluationMode::Exhaustive => Self::exhaustive(graph),
        }
    }

    fn staged(graph: CliqueGraph) -> Self {
        let model = graph.model().to_string();
        let all_oov = graph.is_oov();

        let mut groups: BTreeMap<usize, Vec<Clique>> = BTreeMap::new();
        for clique in graph.into_cliques() {
            groups.entry(clique.cascade_stage()).or_default().push(clique);
        }

        let mut stages: Vec<Stage> = groups
            .into_iter()
            .map(|(index, cliques)| {
                // Validated specs agree on one pruning function per stage
                let pruning = cliques
                    .iter()
                    .find_map(|c| c.pruning())
                    .unwrap_or_default();
                Stage {
                    index,
                    cliques,
                    pruning,
                }
            })
            .collect();
        stages.sort_by_key(|s| (s.cost(), s.index));

        debug!(
            "CascadeModel {}: stage order {:?}",
            model,
            stages
                .iter()
                .map(|s| (s.index, s.cliques.len(), s.cost(), s.pruning))
                .collect::<Vec<_>>()
        );

        Self {
            model,
            stages,
            feature_source: FeatureSource::Postings,
            all_oov,
        }
    }

    /// Every clique in one stage, no pruning
    pub fn exhaustive(graph: CliqueGraph) -> Self {
        let model = graph.model().to_string();
        let all_oov = graph.is_oov();
        let cliques = graph.into_cliques();
        let stages = if cliques.is_empty() {
            Vec::new()
        } else {
            vec![Stage {
                index: 0,
                cliques,
                pruning: PruningFunction::None,
            }]
        };
        Self {
            model,
            stages,
            feature_source: FeatureSource::Postings,
            all_oov,
        }
    }

    /// Where stages after the first read their statistics from
    pub fn with_feature_source(mut self, feature_source: FeatureSource) -> Self {
        self.feature_source = feature_source;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage and return the top `k` documents
    pub fn evaluate(
        &mut self,
        source: &dyn PostingsSource,
        k: usize,
    ) -> Result<(Vec<ScoredDoc>, CascadeStats)> {
        let mut stats = CascadeStats::default();
        if self.all_oov || self.stages.is_empty() || k == 0 {
            debug!("CascadeModel {}: nothing to evaluate", self.model);
            return Ok((Vec::new(), stats));
        }

        let feature_source = self.feature_source;
        let mut candidates: Vec<ScoredDoc> = Vec::new();
        for (position, stage) in self.stages.iter_mut().enumerate() {
            stage.reset()?;
            let scored = if position == 0 {
                score_first_stage(stage, source)?
            } else {
                rescore_stage(stage, source, candidates, feature_source)?
            };

            let candidates_in = scored.len();
            candidates = stage.pruning.prune(scored);
            debug_assert!(candidates.len() <= candidates_in);

            let stage_stats = StageStats {
                stage: stage.index,
                cliques: stage.cliques.len(),
                candidates_in,
                survivors: candidates.len(),
                cost: stage.cost() * candidates_in as u64,
            };
            debug!(
                "CascadeModel {}: stage {} cliques={} candidates={} survivors={} cost={}",
                self.model,
                stage_stats.stage,
                stage_stats.cliques,
                stage_stats.candidates_in,
                stage_stats.survivors,
                stage_stats.cost
            );
            stats.stages.push(stage_stats);

            if candidates.is_empty() {
                break;
            }
        }

        let mut accumulator = Accumulator::new(k);
        for candidate in candidates {
            accumulator.insert(candidate.doc, candidate.score);
        }
        Ok((accumulator.extract_sorted(), stats))
    }
}

/// Score the merge-union of the stage's term postings
fn score_first_stage(stage: &mut Stage, source: &dyn PostingsSource) -> Result<Vec<ScoredDoc>> {
    let mut cursors = Vec::new();
    for term in stage.terms() {
        if let Some(cursor) = source.open_postings(term)? {
            cursors.push(cursor);
        }
    }
    let mut union = UnionDocSet::new(cursors);

    let mut scored = Vec::with_capacity(union.size_hint() as usize);
    let mut doc = union.doc();
    while doc != TERMINATED {
        let ctx = DocumentContext::new(doc, source.doc_len(doc)?);
        let score = stage.score(&ctx)?;
        trace!("stage {} doc {} score {}", stage.index, doc, score);
        scored.push(ScoredDoc::new(doc, score));
        doc = union.advance()?;
    }
    Ok(scored)
}

/// Add the stage's partial scores to the survivors (ascending docno)
fn rescore_stage(
    stage: &mut Stage,
    source: &dyn PostingsSource,
    mut candidates: Vec<ScoredDoc>,
    feature_source: FeatureSource,
) -> Result<Vec<ScoredDoc>> {
    let term_ids = match feature_source {
        FeatureSource::ForwardIndex => stage.term_ids(),
        FeatureSource::Postings => Vec::new(),
    };

    for candidate in &mut candidates {
        let doc: DocId = candidate.doc;
        let doc_len = source.doc_len(doc)?;
        let partial = match feature_source {
            FeatureSource::Postings => stage.score(&DocumentContext::new(doc, doc_len))?,
            FeatureSource::ForwardIndex => {
                let vector = source.document_vector(doc)?;
                let positions = vector.decompress_positions(&term_ids)?;
                let forward: FxHashMap<TermId, Vec<u32>> =
                    term_ids.iter().copied().zip(positions).collect();
                stage.score(&DocumentContext::new(doc, doc_len).with_forward(&forward))?
            }
        };
        trace!("stage {} doc {} partial {}", stage.index, doc, partial);
        candidate.score += partial;
    }
    Ok(candidates)
}
