//! Query model: the cliques of one query under one model specification

use log::debug;

use super::clique::{Clique, Parameter};
use super::model::{EvaluationMode, ModelSpec};
use crate::config::CascadeParams;
use crate::error::Result;
use crate::index::PostingsSource;

/// Bound cliques for one query
pub struct CliqueGraph {
    model: String,
    mode: EvaluationMode,
    terms: Vec<String>,
    cliques: Vec<Clique>,
    all_oov: bool,
}

impl CliqueGraph {
    /// Expand every feature of `spec` over the query terms and bind the cliques
    /// to the postings source
    pub fn build(
        spec: &ModelSpec,
        terms: &[String],
        source: &dyn PostingsSource,
        cascade: &CascadeParams,
    ) -> Result<Self> {
        spec.validate()?;

        let mut cliques = Vec::new();
        for feature in &spec.features {
            let clique_type = feature.clique_set.clique_type();
            let window = feature.clique_set.window();
            for concept in feature.clique_set.generate(terms)? {
                let scoring = feature.scoring.build(cascade)?;
                let mut clique = Clique::new(
                    concept,
                    clique_type,
                    window,
                    scoring,
                    Parameter::new(feature.id.clone(), feature.weight),
                )?;
                clique.set_cascade_stage(feature.cascade_stage);
                clique.set_pruning(feature.pruning);
                clique.bind(source)?;

                let weight = feature.importance.weight(feature.weight, &clique)?;
                clique.set_weight(weight);
                cliques.push(clique);
            }
        }

        let all_oov = terms.iter().all(|t| source.term_evidence(t).is_oov());
        debug!(
            "CliqueGraph: model={}, terms={:?}, cliques={}, all_oov={}",
            spec.name,
            terms,
            cliques.len(),
            all_oov
        );

        Ok(Self {
            model: spec.name.clone(),
            mode: spec.mode,
            terms: terms.to_vec(),
            cliques,
            all_oov,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn cliques(&self) -> &[Clique] {
        &self.cliques
    }

    pub fn cliques_mut(&mut self) -> &mut [Clique] {
        &mut self.cliques
    }

    pub fn len(&self) -> usize {
        self.cliques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cliques.is_empty()
    }

    /// No query term occurs in the collection
    pub fn is_oov(&self) -> bool {
        self.all_oov
    }

    pub(crate) fn into_cliques(self) -> Vec<Clique> {
        self.cliques
    }
}
