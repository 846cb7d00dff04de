//! Pruning functions applied between cascade stages
//!
//! A pruner receives the candidates scored so far and returns the ones that
//! advance to the next stage. The output is always a subset of the input.

use serde::{Deserialize, Serialize};

use super::accumulator::ScoredDoc;
use crate::error::{Error, Result};

/// Stage pruning policy
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PruningFunction {
    /// Keep every candidate
    #[default]
    None,
    /// Keep the best `count` candidates
    TopK { count: usize },
    /// Keep the best `ceil(fraction * n)` candidates
    Rank { fraction: f32 },
    /// Keep candidates scoring at least `threshold`
    Score { threshold: f32 },
    /// Keep candidates scoring at least `t * max + (1 - t) * mean`
    MeanMax { t: f32 },
}

impl PruningFunction {
    pub fn validate(&self) -> Result<()> {
        match *self {
            PruningFunction::None => Ok(()),
            PruningFunction::TopK { count } if count == 0 => Err(Error::Configuration(
                "top_k pruning needs a positive count".to_string(),
            )),
            PruningFunction::TopK { .. } => Ok(()),
            PruningFunction::Rank { fraction } if !(fraction > 0.0 && fraction <= 1.0) => {
                Err(Error::Configuration(format!(
                    "rank pruning fraction must be in (0, 1], got {}",
                    fraction
                )))
            }
            PruningFunction::Rank { .. } => Ok(()),
            PruningFunction::Score { threshold } if !threshold.is_finite() => Err(
                Error::Configuration(format!("score pruning threshold {} is not finite", threshold)),
            ),
            PruningFunction::Score { .. } => Ok(()),
            PruningFunction::MeanMax { t } if !(0.0..=1.0).contains(&t) => Err(
                Error::Configuration(format!("mean_max pruning t must be in [0, 1], got {}", t)),
            ),
            PruningFunction::MeanMax { .. } => Ok(()),
        }
    }

    /// Select the survivors of a stage, returned in ascending docno order
    pub fn prune(&self, mut candidates: Vec<ScoredDoc>) -> Vec<ScoredDoc> {
        match *self {
            PruningFunction::None => {}
            PruningFunction::TopK { count } => keep_best(&mut candidates, count),
            PruningFunction::Rank { fraction } => {
                let keep = (fraction as f64 * candidates.len() as f64).ceil() as usize;
                keep_best(&mut candidates, keep);
            }
            PruningFunction::Score { threshold } => candidates.retain(|c| c.score >= threshold),
            PruningFunction::MeanMax { t } => {
                if let Some(cutoff) = mean_max_cutoff(&candidates, t) {
                    candidates.retain(|c| c.score as f64 >= cutoff);
                }
            }
        }
        candidates.sort_unstable_by_key(|c| c.doc);
        candidates
    }
}

fn keep_best(candidates: &mut Vec<ScoredDoc>, count: usize) {
    if candidates.len() <= count {
        return;
    }
    if count > 0 {
        candidates.select_nth_unstable_by(count - 1, |a, b| a.rank_cmp(b));
    }
    candidates.truncate(count);
}

fn mean_max_cutoff(candidates: &[ScoredDoc], t: f32) -> Option<f64> {
    if candidates.is_empty() {
        return None;
    }
    let max = candidates
        .iter()
        .map(|c| c.score as f64)
        .fold(f64::NEG_INFINITY, f64::max);
    let mean = candidates.iter().map(|c| c.score as f64).sum::<f64>() / candidates.len() as f64;
    let cutoff = t as f64 * max + (1.0 - t as f64) * mean;
    // Infinite scores make the mean undefined; keep everyone
    cutoff.is_finite().then_some(cutoff)
}
