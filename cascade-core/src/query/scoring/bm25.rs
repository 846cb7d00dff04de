//! BM25 scoring
//!
//! `score = ((k1 + 1) * tf) / (k1 * ((1 - b) + b * doc_len / avg_doc_len) + tf) * idf`
//! with `idf = ln((N - df + 0.5) / (df + 0.5))` fixed at initialization.
//!
//! Both the per-instance (legacy) and the cascade-trained (shared) parameter
//! paths go through [`bm25_score`], so they agree bit for bit whenever the
//! parameter values are equal.

use super::{ParamSpec, ScoringFunction, already_initialized, not_initialized};
use crate::Score;
use crate::config::CascadeParams;
use crate::error::{Error, Result};
use crate::evidence::{GlobalEvidence, GlobalTermEvidence};

/// BM25 with Robertson-Sparck Jones idf
///
/// # Arguments
/// * `tf` - Term frequency in document
/// * `doc_len` - Document length
/// * `avg_doc_len` - Average document length
/// * `k1`, `b` - BM25 parameters
/// * `idf` - Inverse document frequency
#[inline]
pub fn bm25_score(tf: f64, doc_len: f64, avg_doc_len: f64, k1: f64, b: f64, idf: f64) -> f64 {
    let length_norm = (1.0 - b) + b * (doc_len / avg_doc_len);
    ((k1 + 1.0) * tf) / (k1 * length_norm + tf) * idf
}

/// `ln((N - df + 0.5) / (df + 0.5))`; negative for terms in more than half the documents
#[inline]
pub fn bm25_idf(doc_freq: f64, total_docs: f64) -> f64 {
    ((total_docs - doc_freq + 0.5) / (doc_freq + 0.5)).ln()
}

/// `k1 >= 0` and `b` in `[0, 1]`
pub(crate) fn check_bm25_params(k1: f32, b: f32) -> Result<()> {
    if !(k1 >= 0.0 && k1.is_finite()) {
        return Err(Error::Configuration(format!(
            "bm25: k1 must be a non-negative number, got {}",
            k1
        )));
    }
    if !(0.0..=1.0).contains(&b) {
        return Err(Error::Configuration(format!(
            "bm25: b must be in [0, 1], got {}",
            b
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Bm25State {
    idf: f64,
    avg_doc_len: f64,
    oov: bool,
}

#[derive(Debug, Clone)]
pub struct Bm25 {
    k1: f32,
    b: f32,
    /// Cascade-trained parameters overriding `k1`/`b` (the "new model" switch)
    shared: Option<CascadeParams>,
    state: Option<Bm25State>,
}

impl Bm25 {
    pub fn new(shared: Option<CascadeParams>) -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            shared,
            state: None,
        }
    }

    /// Effective (k1, b): shared values in cascade-model mode, own values otherwise
    #[inline]
    pub fn params(&self) -> (f32, f32) {
        match &self.shared {
            Some(p) => (p.k1, p.b),
            None => (self.k1, self.b),
        }
    }

    pub fn is_new_model(&self) -> bool {
        self.shared.is_some()
    }

    pub fn idf(&self) -> Option<f64> {
        self.state.map(|s| s.idf)
    }
}

impl ScoringFunction for Bm25 {
    fn configure(&mut self, params: &ParamSpec) -> Result<()> {
        let k1 = params.require("k1", "bm25")?;
        let b = params.require("b", "bm25")?;
        check_bm25_params(k1, b)?;
        self.k1 = k1;
        self.b = b;
        Ok(())
    }

    fn initialize(&mut self, term: &GlobalTermEvidence, global: &GlobalEvidence) -> Result<()> {
        if self.state.is_some() {
            return Err(already_initialized("bm25"));
        }
        // Empty collections have no average length; avoid dividing by zero
        let avg_doc_len = if global.avg_doc_len > 0.0 {
            global.avg_doc_len as f64
        } else {
            1.0
        };
        self.state = Some(Bm25State {
            idf: bm25_idf(term.df as f64, global.document_count as f64),
            avg_doc_len,
            oov: term.df == 0 || term.cf == 0,
        });
        Ok(())
    }

    #[inline]
    fn score(&self, tf: u32, doc_len: u32) -> Result<Score> {
        let state = self.state.as_ref().ok_or_else(|| not_initialized("bm25"))?;
        // Absent terms contribute nothing; with k1 = 0 the formula is 0/0 here
        if state.oov || tf == 0 {
            return Ok(0.0);
        }
        let (k1, b) = self.params();
        Ok(bm25_score(
            tf as f64,
            doc_len as f64,
            state.avg_doc_len,
            k1 as f64,
            b as f64,
            state.idf,
        ) as Score)
    }

    /// `tf / (K + tf)` lies in `[0, 1)`, so scores lie between 0 and `(k1 + 1) * idf`
    fn min_score(&self) -> Score {
        match &self.state {
            Some(s) if s.oov => 0.0,
            Some(s) => ((self.params().0 as f64 + 1.0) * s.idf).min(0.0) as Score,
            None => Score::NEG_INFINITY,
        }
    }

    fn max_score(&self) -> Score {
        match &self.state {
            Some(s) if s.oov => 0.0,
            Some(s) => ((self.params().0 as f64 + 1.0) * s.idf).max(0.0) as Score,
            None => Score::INFINITY,
        }
    }

    fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    fn query_weight(&self) -> Result<Score> {
        let state = self.state.as_ref().ok_or_else(|| not_initialized("bm25"))?;
        Ok(state.idf as Score)
    }
}
