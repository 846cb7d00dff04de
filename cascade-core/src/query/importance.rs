//! Importance models: how a clique's weight is derived
//!
//! `Constant` uses the feature weight as is. `Linear` computes the weight from
//! features of the clique concept, so that rare concepts can be weighted above
//! common ones without per-query tuning.

use serde::{Deserialize, Serialize};

use super::clique::Clique;
use super::scoring::ScoringFunction;
use crate::error::{Error, Result};

/// Concept feature available to linear importance models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceFeature {
    /// Query weight of the scoring function (BM25 idf)
    Idf,
    /// `ln(1 + cf)`
    CollectionFrequency,
    /// `ln(1 + df)`
    DocumentFrequency,
    /// Always 1, acts as a bias
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightedFeature {
    pub feature: ImportanceFeature,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportanceModel {
    #[default]
    Constant,
    /// `weight = sum(w_i * f_i)`
    Linear { features: Vec<WeightedFeature> },
}

impl ImportanceModel {
    pub fn validate(&self) -> Result<()> {
        match self {
            ImportanceModel::Constant => Ok(()),
            ImportanceModel::Linear { features } if features.is_empty() => Err(
                Error::Configuration("linear importance model with no features".to_string()),
            ),
            ImportanceModel::Linear { features } => {
                match features.iter().find(|f| !f.weight.is_finite()) {
                    Some(f) => Err(Error::Configuration(format!(
                        "importance weight for {:?} is not finite",
                        f.feature
                    ))),
                    None => Ok(()),
                }
            }
        }
    }

    /// Weight of a bound clique
    pub fn weight(&self, base: f32, clique: &Clique) -> Result<f32> {
        match self {
            ImportanceModel::Constant => Ok(base),
            ImportanceModel::Linear { features } => {
                let mut weight = 0.0f64;
                for f in features {
                    weight += f.weight as f64 * feature_value(f.feature, clique)?;
                }
                Ok(weight as f32)
            }
        }
    }
}

fn feature_value(feature: ImportanceFeature, clique: &Clique) -> Result<f64> {
    Ok(match feature {
        ImportanceFeature::Idf => clique.scoring().query_weight()? as f64,
        ImportanceFeature::CollectionFrequency => (clique.term_collection_cf() as f64).ln_1p(),
        ImportanceFeature::DocumentFrequency => (clique.term_collection_df() as f64).ln_1p(),
        ImportanceFeature::Constant => 1.0,
    })
}
