//! Jelinek-Mercer smoothed query likelihood
//!
//! `score = ln((1 - lambda) * tf / doc_len + lambda * P_bg)`

use super::{ParamSpec, ScoringFunction, already_initialized, not_initialized};
use crate::Score;
use crate::error::{Error, Result};
use crate::evidence::{GlobalEvidence, GlobalTermEvidence};

#[derive(Debug, Clone, Default)]
pub struct JelinekMercer {
    lambda: Option<f32>,
    background: Option<f64>,
    oov: bool,
}

impl JelinekMercer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lambda(&self) -> Option<f32> {
        self.lambda
    }
}

impl ScoringFunction for JelinekMercer {
    fn configure(&mut self, params: &ParamSpec) -> Result<()> {
        let lambda = params.require("lambda", "jelinek_mercer")?;
        if !(lambda > 0.0 && lambda <= 1.0) {
            return Err(Error::Configuration(format!(
                "jelinek_mercer: lambda must be in (0, 1], got {}",
                lambda
            )));
        }
        self.lambda = Some(lambda);
        Ok(())
    }

    fn initialize(&mut self, term: &GlobalTermEvidence, global: &GlobalEvidence) -> Result<()> {
        if self.background.is_some() {
            return Err(already_initialized("jelinek_mercer"));
        }
        if self.lambda.is_none() {
            return Err(Error::Configuration(
                "jelinek_mercer: initialize() before configure()".to_string(),
            ));
        }
        self.oov = term.cf == 0 || global.collection_length == 0;
        self.background = Some(if self.oov {
            0.0
        } else {
            term.cf as f64 / global.collection_length as f64
        });
        Ok(())
    }

    #[inline]
    fn score(&self, tf: u32, doc_len: u32) -> Result<Score> {
        let (Some(background), Some(lambda)) = (self.background, self.lambda) else {
            return Err(not_initialized("jelinek_mercer"));
        };
        if self.oov {
            return Ok(0.0);
        }
        let lambda = lambda as f64;
        let foreground = if doc_len == 0 {
            0.0
        } else {
            tf as f64 / doc_len as f64
        };
        Ok(((1.0 - lambda) * foreground + lambda * background).ln() as Score)
    }

    fn min_score(&self) -> Score {
        if self.oov { 0.0 } else { Score::NEG_INFINITY }
    }

    fn max_score(&self) -> Score {
        0.0
    }

    fn is_initialized(&self) -> bool {
        self.background.is_some()
    }
}
