//! Per-clique scoring functions
//!
//! A scoring function maps `(tf, doc_len)` to a partial score. It is set up in two
//! steps:
//! 1. `configure` reads tunables from a declarative [`ParamSpec`]
//! 2. `initialize` derives term constants (idf, background probability, OOV flag)
//!    from the global evidence, exactly once
//!
//! The supported kinds form a closed set ([`ScoringFunctionKind`]). Cascade-trained
//! models set `new_model`, and the function then reads k1/b/mu from the injected
//! [`CascadeParams`] instead of its own parameters.

mod bm25;
mod dirichlet;
mod jelinek_mercer;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use bm25::{Bm25, bm25_idf, bm25_score};
pub use dirichlet::{Dirichlet, dirichlet_score};
pub use jelinek_mercer::JelinekMercer;

pub(crate) use bm25::check_bm25_params;
pub(crate) use dirichlet::check_mu;

use crate::Score;
use crate::config::CascadeParams;
use crate::error::{Error, Result};
use crate::evidence::{GlobalEvidence, GlobalTermEvidence};

/// Declarative scoring-function parameters (`name -> value`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSpec(BTreeMap<String, f32>);

impl ParamSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f32) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.0.get(name).copied()
    }

    /// Required parameter; absent or non-finite values are a configuration error
    pub fn require(&self, name: &str, function: &str) -> Result<f32> {
        match self.get(name) {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(Error::Configuration(format!(
                "{}: parameter '{}' is not finite ({})",
                function, name, v
            ))),
            None => Err(Error::Configuration(format!(
                "{}: missing required parameter '{}'",
                function, name
            ))),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }
}

/// Capability interface shared by all scoring functions
pub trait ScoringFunction {
    /// Read tunable parameters
    fn configure(&mut self, params: &ParamSpec) -> Result<()>;

    /// Derive term-specific constants; must be called exactly once before `score`
    fn initialize(&mut self, term: &GlobalTermEvidence, global: &GlobalEvidence) -> Result<()>;

    /// Partial score for a document; pure given prior initialization
    fn score(&self, tf: u32, doc_len: u32) -> Result<Score>;

    /// Lower bound of `score` over all inputs
    fn min_score(&self) -> Score;

    /// Upper bound of `score` over all inputs
    fn max_score(&self) -> Score;

    fn is_initialized(&self) -> bool;

    /// Query-side term weight, for importance models that need one
    fn query_weight(&self) -> Result<Score> {
        Err(Error::Unsupported(
            "query weight is not defined for this scoring function".to_string(),
        ))
    }
}

/// Scoring function kinds accepted in model specifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringKind {
    Bm25,
    Dirichlet,
    JelinekMercer,
}

/// Declarative scoring function: kind, parameters and the cascade-model switch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSpec {
    pub kind: ScoringKind,
    #[serde(default)]
    pub params: ParamSpec,
    /// Read k1/b/mu from the model-wide [`CascadeParams`]
    #[serde(default)]
    pub new_model: bool,
}

impl ScoringSpec {
    pub fn new(kind: ScoringKind, params: ParamSpec) -> Self {
        Self {
            kind,
            params,
            new_model: false,
        }
    }

    pub fn bm25(k1: f32, b: f32) -> Self {
        Self::new(
            ScoringKind::Bm25,
            ParamSpec::new().with("k1", k1).with("b", b),
        )
    }

    pub fn dirichlet(mu: f32) -> Self {
        Self::new(ScoringKind::Dirichlet, ParamSpec::new().with("mu", mu))
    }

    /// Switch to the cascade-trained shared parameters
    pub fn cascade(mut self) -> Self {
        self.new_model = true;
        self
    }

    /// Create and configure a (not yet initialized) scoring function
    pub fn build(&self, cascade: &CascadeParams) -> Result<ScoringFunctionKind> {
        if self.new_model {
            cascade.validate()?;
        }
        let shared = self.new_model.then_some(*cascade);
        let mut function = match self.kind {
            ScoringKind::Bm25 => ScoringFunctionKind::Bm25(Bm25::new(shared)),
            ScoringKind::Dirichlet => ScoringFunctionKind::Dirichlet(Dirichlet::new(shared)),
            ScoringKind::JelinekMercer => {
                if self.new_model {
                    return Err(Error::Configuration(
                        "jelinek_mercer has no model-wide cascade parameters".to_string(),
                    ));
                }
                ScoringFunctionKind::JelinekMercer(JelinekMercer::new())
            }
        };
        function.configure(&self.params)?;
        Ok(function)
    }
}

/// Closed set of scoring functions
#[derive(Debug, Clone)]
pub enum ScoringFunctionKind {
    Bm25(Bm25),
    Dirichlet(Dirichlet),
    JelinekMercer(JelinekMercer),
}

macro_rules! dispatch {
    ($self:expr, $f:ident => $body:expr) => {
        match $self {
            ScoringFunctionKind::Bm25($f) => $body,
            ScoringFunctionKind::Dirichlet($f) => $body,
            ScoringFunctionKind::JelinekMercer($f) => $body,
        }
    };
}

impl ScoringFunction for ScoringFunctionKind {
    fn configure(&mut self, params: &ParamSpec) -> Result<()> {
        dispatch!(self, f => f.configure(params))
    }

    fn initialize(&mut self, term: &GlobalTermEvidence, global: &GlobalEvidence) -> Result<()> {
        dispatch!(self, f => f.initialize(term, global))
    }

    #[inline]
    fn score(&self, tf: u32, doc_len: u32) -> Result<Score> {
        dispatch!(self, f => f.score(tf, doc_len))
    }

    fn min_score(&self) -> Score {
        dispatch!(self, f => f.min_score())
    }

    fn max_score(&self) -> Score {
        dispatch!(self, f => f.max_score())
    }

    fn is_initialized(&self) -> bool {
        dispatch!(self, f => f.is_initialized())
    }

    fn query_weight(&self) -> Result<Score> {
        dispatch!(self, f => f.query_weight())
    }
}

impl ScoringFunctionKind {
    pub fn kind(&self) -> ScoringKind {
        match self {
            ScoringFunctionKind::Bm25(_) => ScoringKind::Bm25,
            ScoringFunctionKind::Dirichlet(_) => ScoringKind::Dirichlet,
            ScoringFunctionKind::JelinekMercer(_) => ScoringKind::JelinekMercer,
        }
    }
}

fn already_initialized(function: &str) -> Error {
    Error::Configuration(format!("{} initialized twice", function))
}

fn not_initialized(function: &str) -> Error {
    Error::Uninitialized(format!("{}: score() called before initialize()", function))
}
