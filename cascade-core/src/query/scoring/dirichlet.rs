//! Dirichlet-smoothed query likelihood
//!
//! `score = ln((tf + mu * P_bg) / (doc_len + mu))` with `P_bg = cf / collection_length`.

use super::{ParamSpec, ScoringFunction, already_initialized, not_initialized};
use crate::Score;
use crate::config::{CascadeParams, DEFAULT_DIRICHLET_MU};
use crate::error::{Error, Result};
use crate::evidence::{GlobalEvidence, GlobalTermEvidence};

#[inline]
pub fn dirichlet_score(tf: f64, doc_len: f64, mu: f64, background: f64) -> f64 {
    ((tf + mu * background) / (doc_len + mu)).ln()
}

/// The prior must be strictly positive, otherwise empty documents score `ln(0/0)`
pub(crate) fn check_mu(mu: f32) -> Result<()> {
    if mu > 0.0 && mu.is_finite() {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "dirichlet: mu must be positive, got {}",
            mu
        )))
    }
}

#[derive(Debug, Clone)]
pub struct Dirichlet {
    mu: f32,
    shared: Option<CascadeParams>,
    /// Background probability; `None` until initialized
    background: Option<f64>,
    oov: bool,
}

impl Dirichlet {
    pub fn new(shared: Option<CascadeParams>) -> Self {
        Self {
            mu: DEFAULT_DIRICHLET_MU,
            shared,
            background: None,
            oov: false,
        }
    }

    pub fn mu(&self) -> f32 {
        match &self.shared {
            Some(p) => p.mu,
            None => self.mu,
        }
    }

    pub fn background(&self) -> Option<f64> {
        self.background
    }
}

impl ScoringFunction for Dirichlet {
    fn configure(&mut self, params: &ParamSpec) -> Result<()> {
        if params.get("mu").is_some() {
            let mu = params.require("mu", "dirichlet")?;
            check_mu(mu)?;
            self.mu = mu;
        }
        Ok(())
    }

    fn initialize(&mut self, term: &GlobalTermEvidence, global: &GlobalEvidence) -> Result<()> {
        if self.background.is_some() {
            return Err(already_initialized("dirichlet"));
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
        let background = self.background.ok_or_else(|| not_initialized("dirichlet"))?;
        if self.oov {
            return Ok(0.0);
        }
        Ok(dirichlet_score(tf as f64, doc_len as f64, self.mu() as f64, background) as Score)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_value() {
        // ln((5 + 2.5) / 3500)
        let score = dirichlet_score(5.0, 1000.0, 2500.0, 0.001);
        assert!((score - (7.5f64 / 3500.0).ln()).abs() < 1e-4);
        assert!((score + 6.1456).abs() < 1e-4);
    }

    #[test]
    fn test_initialized_matches_formula() {
        let mut d = Dirichlet::new(None);
        d.initialize(
            &GlobalTermEvidence::new(400, 1_000),
            &GlobalEvidence::new(1_000, 1_000_000),
        )
        .unwrap();
        let score = d.score(5, 1000).unwrap();
        assert!((score as f64 - (7.5f64 / 3500.0).ln()).abs() < 1e-4);
        assert!(score <= d.max_score());
    }

    #[test]
    fn test_oov_is_exactly_zero() {
        let mut d = Dirichlet::new(None);
        d.initialize(
            &GlobalTermEvidence::new(0, 0),
            &GlobalEvidence::new(1_000, 1_000_000),
        )
        .unwrap();
        for tf in [0, 1, 7] {
            assert_eq!(d.score(tf, 250).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_shared_and_legacy_paths_identical() {
        let shared = CascadeParams {
            mu: 1800.0,
            ..CascadeParams::default()
        };
        let term = GlobalTermEvidence::new(30, 90);
        let global = GlobalEvidence::new(500, 120_000);

        let mut legacy = Dirichlet::new(None);
        legacy
            .configure(&ParamSpec::new().with("mu", 1800.0))
            .unwrap();
        legacy.initialize(&term, &global).unwrap();

        let mut cascade = Dirichlet::new(Some(shared));
        cascade
            .configure(&ParamSpec::new().with("mu", 10.0))
            .unwrap();
        cascade.initialize(&term, &global).unwrap();
        assert_eq!(cascade.mu(), 1800.0);

        for tf in 0..10 {
            for doc_len in [1u32, 100, 240, 9000] {
                assert_eq!(
                    legacy.score(tf, doc_len).unwrap().to_bits(),
                    cascade.score(tf, doc_len).unwrap().to_bits()
                );
            }
        }
    }

    #[test]
    fn test_scores_never_positive() {
        let mut d = Dirichlet::new(None);
        d.initialize(
            &GlobalTermEvidence::new(900, 5_000),
            &GlobalEvidence::new(1_000, 10_000),
        )
        .unwrap();
        for (tf, len) in [(1, 1), (10, 10), (100, 100), (0, 5)] {
            assert!(d.score(tf, len).unwrap() <= 0.0);
        }
    }

    #[test]
    fn test_configure_rejects_non_positive_mu() {
        for mu in [0.0, -10.0] {
            let mut d = Dirichlet::new(None);
            assert!(matches!(
                d.configure(&ParamSpec::new().with("mu", mu)),
                Err(Error::Configuration(_))
            ));
        }
    }
}
