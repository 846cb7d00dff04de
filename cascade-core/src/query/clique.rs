//! Cliques: scorable feature nodes over a subset of the query terms

use std::fmt;

use log::trace;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::potential::PotentialFunction;
use super::pruning::PruningFunction;
use super::scoring::{ScoringFunction, ScoringFunctionKind};
use crate::error::{Error, Result};
use crate::evidence::GlobalTermEvidence;
use crate::index::PostingsSource;
use crate::structures::PositionPostingIterator;
use crate::{DocId, Score, TermId};

/// Kind of feature a clique scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CliqueType {
    Term,
    OrderedWindow,
    UnorderedWindow,
}

impl CliqueType {
    /// Static unit cost, relative to a single postings lookup
    pub fn cost(self) -> u64 {
        match self {
            CliqueType::Term => 1,
            CliqueType::OrderedWindow => 20,
            CliqueType::UnorderedWindow => 20,
        }
    }

    pub fn is_window(self) -> bool {
        self != CliqueType::Term
    }
}

/// Named clique weight
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub id: String,
    pub weight: f32,
}

impl Parameter {
    pub fn new(id: impl Into<String>, weight: f32) -> Self {
        Self {
            id: id.into(),
            weight,
        }
    }
}

/// Per-document input to clique scoring
pub struct DocumentContext<'a> {
    pub doc: DocId,
    pub doc_len: u32,
    /// Positions of the query terms decoded from the document vector; cliques
    /// read their statistics from here instead of their postings when set
    pub forward: Option<&'a FxHashMap<TermId, Vec<u32>>>,
}

impl<'a> DocumentContext<'a> {
    pub fn new(doc: DocId, doc_len: u32) -> Self {
        Self {
            doc,
            doc_len,
            forward: None,
        }
    }

    pub fn with_forward(mut self, positions: &'a FxHashMap<TermId, Vec<u32>>) -> Self {
        self.forward = Some(positions);
        self
    }
}

/// One feature node of the query model
///
/// Built unbound; [`Clique::bind`] opens the postings, gathers the evidence and
/// initializes the scoring function. After binding only the postings cursors move.
pub struct Clique {
    concept: Vec<String>,
    clique_type: CliqueType,
    window_size: u32,
    weight: Parameter,
    scoring: ScoringFunctionKind,
    potential: Option<PotentialFunction>,
    evidence: GlobalTermEvidence,
    cascade_stage: usize,
    pruning: Option<PruningFunction>,
}

impl Clique {
    pub fn new(
        concept: Vec<String>,
        clique_type: CliqueType,
        window_size: u32,
        scoring: ScoringFunctionKind,
        weight: Parameter,
    ) -> Result<Self> {
        check_shape(&concept, clique_type, window_size)?;
        Ok(Self {
            concept,
            clique_type,
            window_size,
            weight,
            scoring,
            potential: None,
            evidence: GlobalTermEvidence::default(),
            cascade_stage: 0,
            pruning: None,
        })
    }

    pub fn concept(&self) -> &[String] {
        &self.concept
    }

    pub fn clique_type(&self) -> CliqueType {
        self.clique_type
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn cost(&self) -> u64 {
        self.clique_type.cost()
    }

    pub fn weight(&self) -> &Parameter {
        &self.weight
    }

    pub fn cascade_stage(&self) -> usize {
        self.cascade_stage
    }

    pub fn pruning(&self) -> Option<PruningFunction> {
        self.pruning
    }

    pub fn scoring(&self) -> &ScoringFunctionKind {
        &self.scoring
    }

    pub fn is_bound(&self) -> bool {
        self.potential.is_some()
    }

    /// Change the clique type; only before the clique is bound
    pub fn set_type(&mut self, clique_type: CliqueType) -> Result<()> {
        if self.is_bound() {
            return Err(Error::Configuration(format!(
                "clique '{}' is already bound to its postings",
                self
            )));
        }
        check_shape(&self.concept, clique_type, self.window_size)?;
        self.clique_type = clique_type;
        Ok(())
    }

    pub fn set_cascade_stage(&mut self, stage: usize) {
        self.cascade_stage = stage;
    }

    pub fn set_pruning(&mut self, pruning: Option<PruningFunction>) {
        self.pruning = pruning;
    }

    pub(crate) fn set_weight(&mut self, weight: f32) {
        self.weight.weight = weight;
    }

    /// Open the concept postings, collect the clique evidence and initialize
    /// the scoring function
    pub fn bind(&mut self, source: &dyn PostingsSource) -> Result<()> {
        if self.is_bound() {
            return Err(Error::Configuration(format!("clique '{}' bound twice", self)));
        }

        let mut cursors = Vec::with_capacity(self.concept.len());
        let mut term_ids = Vec::with_capacity(self.concept.len());
        for term in &self.concept {
            cursors.push(
                source
                    .open_postings(term)?
                    .unwrap_or_else(PositionPostingIterator::empty),
            );
            term_ids.push(source.term_id(term));
        }
        let mut potential =
            PotentialFunction::new(self.clique_type, self.window_size, cursors, term_ids);

        self.evidence = match self.clique_type {
            CliqueType::Term => source.term_evidence(&self.concept[0]),
            CliqueType::OrderedWindow | CliqueType::UnorderedWindow => {
                match source.concept_evidence(&self.to_string()) {
                    Some(evidence) => evidence,
                    None => potential.scan_window_evidence()?,
                }
            }
        };
        self.scoring
            .initialize(&self.evidence, &source.global_evidence())?;
        self.potential = Some(potential);

        trace!(
            "bound clique '{}': cf={}, df={}, stage={}",
            self, self.evidence.cf, self.evidence.df, self.cascade_stage
        );
        Ok(())
    }

    fn potential_mut(&mut self) -> Result<&mut PotentialFunction> {
        let concept = &self.concept;
        self.potential.as_mut().ok_or_else(|| {
            Error::Uninitialized(format!("clique '{}' is not bound", concept.join(" ")))
        })
    }

    /// Unweighted clique score for one document
    ///
    /// With postings as the source, documents must be visited in ascending
    /// order between calls to [`Clique::reset_postings_reader`].
    pub fn score(&mut self, ctx: &DocumentContext<'_>) -> Result<Score> {
        let potential = self.potential_mut()?;
        let tf = match ctx.forward {
            Some(forward) => {
                let slots: Vec<&[u32]> = potential
                    .term_ids()
                    .iter()
                    .map(|id| {
                        id.and_then(|id| forward.get(&id))
                            .map(|p| p.as_slice())
                            .unwrap_or(&[])
                    })
                    .collect();
                potential.frequency_from_positions(&slots)
            }
            None => potential.frequency_at(ctx.doc)?,
        };
        self.scoring.score(tf, ctx.doc_len)
    }

    /// Rewind the postings cursors for another pass over the documents
    pub fn reset_postings_reader(&mut self) -> Result<()> {
        self.potential_mut()?.reset()
    }

    /// Collection frequency of the clique concept
    pub fn term_collection_cf(&self) -> u64 {
        self.evidence.cf
    }

    /// Document frequency of the clique concept
    pub fn term_collection_df(&self) -> u64 {
        self.evidence.df
    }

    pub fn evidence(&self) -> GlobalTermEvidence {
        self.evidence
    }

    /// Forward-index term ids of the concept (known terms only)
    pub fn term_ids(&self) -> Vec<TermId> {
        self.potential
            .as_ref()
            .map(|p| p.term_ids().iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    pub fn max_score(&self) -> Score {
        self.scoring.max_score()
    }

    pub fn min_score(&self) -> Score {
        self.scoring.min_score()
    }
}

fn check_shape(concept: &[String], clique_type: CliqueType, window_size: u32) -> Result<()> {
    if concept.is_empty() {
        return Err(Error::Configuration("clique with no terms".to_string()));
    }
    match clique_type {
        CliqueType::Term if concept.len() != 1 => Err(Error::Configuration(format!(
            "term clique needs exactly one term, got {}",
            concept.len()
        ))),
        CliqueType::OrderedWindow | CliqueType::UnorderedWindow if window_size == 0 => Err(
            Error::Configuration("window clique with zero window size".to_string()),
        ),
        _ => Ok(()),
    }
}

impl fmt::Display for Clique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.clique_type {
            CliqueType::Term => write!(f, "{}", self.concept[0]),
            CliqueType::OrderedWindow => {
                write!(f, "#od{}({})", self.window_size, self.concept.join(" "))
            }
            CliqueType::UnorderedWindow => {
                write!(f, "#uw{}({})", self.window_size, self.concept.join(" "))
            }
        }
    }
}

impl fmt::Debug for Clique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clique")
            .field("concept", &self.to_string())
            .field("weight", &self.weight)
            .field("scoring", &self.scoring.kind())
            .field("cascade_stage", &self.cascade_stage)
            .field("pruning", &self.pruning)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CascadeParams;
    use crate::index::IndexBuilder;
    use crate::query::scoring::{ScoringSpec, dirichlet_score};
    use crate::structures::DocVectorCodec;

    fn index() -> crate::index::PositionalIndex {
        let mut builder = IndexBuilder::new(DocVectorCodec::VarByte);
        builder.add_text("new york city is big");
        builder.add_text("york new");
        builder.add_text("new shoes");
        builder.build().unwrap()
    }

    fn clique(terms: &[&str], clique_type: CliqueType, window: u32) -> Clique {
        let scoring = ScoringSpec::dirichlet(2500.0)
            .build(&CascadeParams::default())
            .unwrap();
        Clique::new(
            terms.iter().map(|t| t.to_string()).collect(),
            clique_type,
            window,
            scoring,
            Parameter::new("w", 1.0),
        )
        .unwrap()
    }

    #[test]
    fn test_cost_per_type() {
        assert_eq!(CliqueType::Term.cost(), 1);
        assert_eq!(CliqueType::OrderedWindow.cost(), 20);
        assert_eq!(CliqueType::UnorderedWindow.cost(), 20);
    }

    #[test]
    fn test_window_evidence() {
        let index = index();
        let mut od = clique(&["new", "york"], CliqueType::OrderedWindow, 1);
        od.bind(&index).unwrap();
        assert_eq!(od.term_collection_cf(), 1);
        assert_eq!(od.term_collection_df(), 1);

        let mut uw = clique(&["new", "york"], CliqueType::UnorderedWindow, 2);
        uw.bind(&index).unwrap();
        assert_eq!(uw.term_collection_cf(), 2);
        assert_eq!(uw.term_collection_df(), 2);
        assert_eq!(uw.window_size(), 2);
        assert_eq!(uw.to_string(), "#uw2(new york)");
    }

    #[test]
    fn test_stored_window_evidence_skips_scan() {
        let mut evidence = index().evidence().clone();
        evidence.add_term("#od1(new york)", 2, 3);
        let index = index().with_evidence(evidence);

        let mut od = clique(&["new", "york"], CliqueType::OrderedWindow, 1);
        od.bind(&index).unwrap();
        assert_eq!(od.term_collection_cf(), 3);
        assert_eq!(od.term_collection_df(), 2);

        // Other windows over the same terms are still scanned
        let mut uw = clique(&["new", "york"], CliqueType::UnorderedWindow, 2);
        uw.bind(&index).unwrap();
        assert_eq!(uw.term_collection_cf(), 2);

        // Per-document counting is unchanged: one "new york" in doc 0, 9 tokens overall
        let expected = dirichlet_score(1.0, 5.0, 2500.0, 3.0 / 9.0) as Score;
        assert_eq!(od.score(&DocumentContext::new(0, 5)).unwrap(), expected);
    }

    #[test]
    fn test_score_and_reset() {
        let index = index();
        let mut term = clique(&["new"], CliqueType::Term, 1);
        term.bind(&index).unwrap();
        assert_eq!(term.term_collection_cf(), 3);

        let first = term.score(&DocumentContext::new(0, 5)).unwrap();
        let third = term.score(&DocumentContext::new(2, 2)).unwrap();
        assert!(first < 0.0 && third < 0.0);

        term.reset_postings_reader().unwrap();
        assert_eq!(term.score(&DocumentContext::new(0, 5)).unwrap(), first);
    }

    #[test]
    fn test_forward_context_matches_postings() {
        let index = index();
        let mut uw = clique(&["york", "new"], CliqueType::UnorderedWindow, 2);
        uw.bind(&index).unwrap();

        let ids = uw.term_ids();
        let vector = index.document_vector(1).unwrap();
        let decoded = vector.decompress_positions(&ids).unwrap();
        let forward: FxHashMap<TermId, Vec<u32>> = ids.into_iter().zip(decoded).collect();

        let from_forward = uw
            .score(&DocumentContext::new(1, 2).with_forward(&forward))
            .unwrap();
        let from_postings = uw.score(&DocumentContext::new(1, 2)).unwrap();
        assert_eq!(from_forward.to_bits(), from_postings.to_bits());
    }

    #[test]
    fn test_oov_clique_scores_zero() {
        let index = index();
        let mut term = clique(&["boston"], CliqueType::Term, 1);
        term.bind(&index).unwrap();
        assert_eq!(term.score(&DocumentContext::new(1, 2)).unwrap(), 0.0);

        let mut od = clique(&["new", "boston"], CliqueType::OrderedWindow, 4);
        od.bind(&index).unwrap();
        assert_eq!(od.score(&DocumentContext::new(0, 5)).unwrap(), 0.0);
    }

    #[test]
    fn test_set_type_rules() {
        let index = index();
        let mut c = clique(&["new", "york"], CliqueType::OrderedWindow, 1);
        assert!(c.set_type(CliqueType::Term).is_err());
        c.set_type(CliqueType::UnorderedWindow).unwrap();
        c.set_cascade_stage(2);
        c.set_pruning(Some(PruningFunction::TopK { count: 10 }));
        c.bind(&index).unwrap();
        assert!(c.set_type(CliqueType::OrderedWindow).is_err());
        assert_eq!(c.cascade_stage(), 2);
        assert_eq!(c.cost(), 20);
    }

    #[test]
    fn test_unbound_clique_fails() {
        let mut c = clique(&["new"], CliqueType::Term, 1);
        assert!(matches!(
            c.score(&DocumentContext::new(0, 1)),
            Err(Error::Uninitialized(_))
        ));
    }
}
