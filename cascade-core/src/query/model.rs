//! Declarative query-model specification
//!
//! A [`ModelSpec`] lists features. Each feature expands into a set of cliques
//! over the query terms, sharing one scoring function kind, weight or importance
//! model, cascade stage and pruning function. Specs are loaded from JSON:
//!
//! ```json
//! {
//!   "name": "sdm-cascade",
//!   "features": [
//!     { "id": "term", "clique_set": { "type": "term" },
//!       "scoring": { "kind": "dirichlet", "params": { "mu": 2500 } },
//!       "weight": 0.85, "cascade_stage": 0,
//!       "pruning": { "kind": "top_k", "count": 50 } },
//!     { "id": "uw", "clique_set": { "type": "unordered", "window": 8 },
//!       "scoring": { "kind": "dirichlet" }, "weight": 0.15, "cascade_stage": 1 }
//!   ]
//! }
//! ```

use std::io::Read;
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::clique::CliqueType;
use super::importance::ImportanceModel;
use super::pruning::PruningFunction;
use super::scoring::ScoringSpec;
use crate::config::CascadeParams;
use crate::error::{Error, Result};

/// Largest query for which full dependence enumerates every term subset
pub const MAX_FULL_DEPENDENCE_TERMS: usize = 10;

/// Which term combinations a window feature covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependence {
    /// Adjacent query term pairs
    #[default]
    Sequential,
    /// Every subset of two or more terms, in query order
    Full,
}

/// Clique set generated by a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CliqueSetSpec {
    Term,
    Ordered {
        window: u32,
        #[serde(default)]
        dependence: Dependence,
    },
    Unordered {
        window: u32,
        #[serde(default)]
        dependence: Dependence,
    },
}

impl CliqueSetSpec {
    pub fn clique_type(&self) -> CliqueType {
        match self {
            CliqueSetSpec::Term => CliqueType::Term,
            CliqueSetSpec::Ordered { .. } => CliqueType::OrderedWindow,
            CliqueSetSpec::Unordered { .. } => CliqueType::UnorderedWindow,
        }
    }

    pub fn window(&self) -> u32 {
        match *self {
            CliqueSetSpec::Term => 1,
            CliqueSetSpec::Ordered { window, .. } | CliqueSetSpec::Unordered { window, .. } => {
                window
            }
        }
    }

    /// Concepts (ordered term lists) for a query
    pub fn generate(&self, terms: &[String]) -> Result<Vec<Vec<String>>> {
        match *self {
            CliqueSetSpec::Term => Ok(terms.iter().map(|t| vec![t.clone()]).collect()),
            CliqueSetSpec::Ordered { dependence, .. }
            | CliqueSetSpec::Unordered { dependence, .. } => match dependence {
                Dependence::Sequential => Ok(terms.windows(2).map(|w| w.to_vec()).collect()),
                Dependence::Full => full_dependence(terms),
            },
        }
    }
}

fn full_dependence(terms: &[String]) -> Result<Vec<Vec<String>>> {
    if terms.len() > MAX_FULL_DEPENDENCE_TERMS {
        return Err(Error::Query(format!(
            "full dependence supports at most {} terms, query has {}",
            MAX_FULL_DEPENDENCE_TERMS,
            terms.len()
        )));
    }
    let mut concepts = Vec::new();
    for mask in 1u32..(1 << terms.len()) {
        if mask.count_ones() < 2 {
            continue;
        }
        concepts.push(
            terms
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, t)| t.clone())
                .collect(),
        );
    }
    // Smaller concepts first, then query order
    concepts.sort_by_key(|c: &Vec<String>| c.len());
    Ok(concepts)
}

fn default_weight() -> f32 {
    1.0
}

/// One feature of the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub id: String,
    pub clique_set: CliqueSetSpec,
    pub scoring: ScoringSpec,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub importance: ImportanceModel,
    #[serde(default)]
    pub cascade_stage: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pruning: Option<PruningFunction>,
}

impl FeatureSpec {
    pub fn new(id: impl Into<String>, clique_set: CliqueSetSpec, scoring: ScoringSpec) -> Self {
        Self {
            id: id.into(),
            clique_set,
            scoring,
            weight: default_weight(),
            importance: ImportanceModel::Constant,
            cascade_stage: 0,
            pruning: None,
        }
    }

    pub fn weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn importance(mut self, importance: ImportanceModel) -> Self {
        self.importance = importance;
        self
    }

    pub fn stage(mut self, stage: usize) -> Self {
        self.cascade_stage = stage;
        self
    }

    pub fn pruning(mut self, pruning: PruningFunction) -> Self {
        self.pruning = Some(pruning);
        self
    }
}

/// How the cascade treats stages and pruning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Cost-ordered stages with pruning between them
    #[default]
    Cascade,
    /// Every clique on every candidate in one stage, no pruning
    Exhaustive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    #[serde(default)]
    pub mode: EvaluationMode,
    pub features: Vec<FeatureSpec>,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: EvaluationMode::Cascade,
            features: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature: FeatureSpec) -> Self {
        self.features.push(feature);
        self
    }

    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Load and validate a model from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_json_reader(std::io::BufReader::new(file))
    }

    /// Load and validate a model from a JSON reader
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let spec: ModelSpec =
            serde_json::from_reader(reader).map_err(|e| Error::Serialization(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load and validate a model from JSON bytes
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let spec: ModelSpec =
            serde_json::from_slice(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Reject malformed models before any query runs
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(Error::Configuration(format!(
                "model '{}' has no features",
                self.name
            )));
        }

        let mut ids = FxHashSet::default();
        let mut stage_pruning: FxHashMap<usize, (PruningFunction, &str)> = FxHashMap::default();
        for feature in &self.features {
            let context = |msg: String| {
                Error::Configuration(format!("model '{}', feature '{}': {}", self.name, feature.id, msg))
            };

            if !ids.insert(feature.id.as_str()) {
                return Err(context("duplicate feature id".to_string()));
            }
            if !feature.weight.is_finite() {
                return Err(context(format!("weight {} is not finite", feature.weight)));
            }
            if feature.clique_set.clique_type().is_window() && feature.clique_set.window() == 0 {
                return Err(context("window size must be positive".to_string()));
            }

            // Catches missing or invalid scoring parameters
            feature
                .scoring
                .build(&CascadeParams::default())
                .map_err(|e| context(e.to_string()))?;
            feature.importance.validate().map_err(|e| context(e.to_string()))?;

            if let Some(pruning) = feature.pruning {
                pruning.validate().map_err(|e| context(e.to_string()))?;
                match stage_pruning.get(&feature.cascade_stage) {
                    Some((other, other_id)) if *other != pruning => {
                        return Err(context(format!(
                            "stage {} pruning conflicts with feature '{}'",
                            feature.cascade_stage, other_id
                        )));
                    }
                    Some(_) => {}
                    None => {
                        stage_pruning.insert(feature.cascade_stage, (pruning, feature.id.as_str()));
                    }
                }
            }
        }
        Ok(())
    }
}
