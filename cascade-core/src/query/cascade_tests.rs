//! End-to-end tests for cascade evaluation
//!
//! Tests cover:
//! - Stage-0 survivors bound the final ranking
//! - Monotonic shrinking of the candidate set across stages
//! - Cascade without pruning equals exhaustive evaluation
//! - Forward-index and postings statistics give identical scores
//! - OOV and decode-error edge cases

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::config::{CascadeParams, FeatureSource};
    use crate::error::{Error, Result};
    use crate::evidence::{GlobalEvidence, GlobalTermEvidence};
    use crate::index::{IndexBuilder, PositionalIndex, PostingsSource};
    use crate::query::{
        CascadeModel, CliqueGraph, CliqueSetSpec, Dependence, EvaluationMode, FeatureSpec,
        ModelSpec, PruningFunction, ScoredDoc, ScoringSpec, bm25_idf, bm25_score,
    };
    use crate::structures::{DocVectorCodec, DocumentVector, PositionPostingIterator};
    use crate::{DocId, TermId};

    const VOCAB: &[&str] = &[
        "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    ];

    /// Synthetic corpus with controlled term distributions
    ///
    /// Every document mixes filler words; every third document contains
    /// "alpha beta" adjacent and every fifth "beta ... alpha" within a window.
    fn build_index(codec: DocVectorCodec, num_docs: usize) -> PositionalIndex {
        let mut builder = IndexBuilder::new(codec);
        for i in 0..num_docs {
            let mut tokens: Vec<&str> = Vec::new();
            for j in 0..(4 + i % 9) {
                tokens.push(VOCAB[(i * 7 + j * 3) % VOCAB.len()]);
            }
            if i % 3 == 0 {
                tokens.push("alpha");
                tokens.push("beta");
            }
            if i % 5 == 0 {
                tokens.push("beta");
                tokens.push("filler");
                tokens.push("alpha");
            }
            builder.add_document(&tokens);
        }
        builder.build().unwrap()
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn term_feature(scoring: ScoringSpec) -> FeatureSpec {
        FeatureSpec::new("term", CliqueSetSpec::Term, scoring).weight(0.85)
    }

    fn uw_feature(stage: usize) -> FeatureSpec {
        FeatureSpec::new(
            "uw",
            CliqueSetSpec::Unordered {
                window: 8,
                dependence: Dependence::Sequential,
            },
            ScoringSpec::dirichlet(2500.0),
        )
        .weight(0.15)
        .stage(stage)
    }

    fn od_feature(stage: usize) -> FeatureSpec {
        FeatureSpec::new(
            "od",
            CliqueSetSpec::Ordered {
                window: 1,
                dependence: Dependence::Sequential,
            },
            ScoringSpec::dirichlet(2500.0),
        )
        .weight(0.1)
        .stage(stage)
    }

    fn run(
        spec: &ModelSpec,
        query: &[&str],
        source: &dyn PostingsSource,
        k: usize,
        feature_source: FeatureSource,
    ) -> Result<(Vec<ScoredDoc>, crate::query::CascadeStats)> {
        let graph = CliqueGraph::build(spec, &terms(query), source, &CascadeParams::default())?;
        CascadeModel::new(graph)
            .with_feature_source(feature_source)
            .evaluate(source, k)
    }

    fn two_stage_model(top: usize) -> ModelSpec {
        ModelSpec::new("cascade")
            .with_feature(
                term_feature(ScoringSpec::dirichlet(2500.0))
                    .pruning(PruningFunction::TopK { count: top }),
            )
            .with_feature(uw_feature(1))
    }

    #[test]
    fn test_final_ranking_within_stage0_survivors() {
        let index = build_index(DocVectorCodec::VarByte, 400);
        let query = ["alpha", "beta"];

        // The term stage alone, pruned to 50, yields exactly the stage-0 survivors
        let term_only = ModelSpec::new("terms").with_feature(
            term_feature(ScoringSpec::dirichlet(2500.0))
                .pruning(PruningFunction::TopK { count: 50 }),
        );
        let (stage0, _) = run(&term_only, &query, &index, 1000, FeatureSource::Postings).unwrap();
        assert_eq!(stage0.len(), 50);
        let survivors: HashSet<DocId> = stage0.iter().map(|d| d.doc).collect();

        let (results, stats) = run(
            &two_stage_model(50),
            &query,
            &index,
            10,
            FeatureSource::Postings,
        )
        .unwrap();

        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|d| survivors.contains(&d.doc)));
        assert_eq!(stats.stages.len(), 2);
        assert_eq!(stats.stages[0].survivors, 50);
        assert_eq!(stats.stages[1].candidates_in, 50);
        // 2 term cliques over the initial pool, 1 window clique over the survivors
        assert_eq!(
            stats.total_cost(),
            2 * stats.initial_candidates() as u64 + 20 * 50
        );
    }

    #[test]
    fn test_candidate_set_shrinks_monotonically() {
        let index = build_index(DocVectorCodec::MiniIndex, 300);
        let spec = ModelSpec::new("three-stage")
            .with_feature(
                term_feature(ScoringSpec::bm25(1.2, 0.75))
                    .pruning(PruningFunction::Rank { fraction: 0.5 }),
            )
            .with_feature(uw_feature(1).pruning(PruningFunction::MeanMax { t: 0.2 }))
            .with_feature(od_feature(2).pruning(PruningFunction::TopK { count: 5 }));

        let (results, stats) = run(
            &spec,
            &["alpha", "beta", "gamma"],
            &index,
            100,
            FeatureSource::Postings,
        )
        .unwrap();

        assert!(!stats.stages.is_empty());
        for stage in &stats.stages {
            assert!(stage.survivors <= stage.candidates_in);
        }
        for pair in stats.stages.windows(2) {
            assert_eq!(pair[1].candidates_in, pair[0].survivors);
        }
        assert!(results.len() <= 5);
    }

    #[test]
    fn test_unpruned_cascade_matches_exhaustive() {
        let index = build_index(DocVectorCodec::VarByte, 250);
        let cascade = ModelSpec::new("cascade")
            .with_feature(term_feature(ScoringSpec::dirichlet(1500.0)))
            .with_feature(uw_feature(1))
            .with_feature(od_feature(2));
        let exhaustive = cascade.clone().with_mode(EvaluationMode::Exhaustive);

        let query = ["alpha", "beta"];
        let (a, stats_a) = run(&cascade, &query, &index, 40, FeatureSource::Postings).unwrap();
        let (b, stats_b) = run(&exhaustive, &query, &index, 40, FeatureSource::Postings).unwrap();

        assert_eq!(stats_a.stages.len(), 3);
        assert_eq!(stats_b.stages.len(), 1);
        assert_eq!(a.len(), b.len());
        // Stage-wise sums round differently, so compare scores with a tolerance
        for (x, y) in a.iter().zip(&b) {
            assert!((x.score - y.score).abs() < 1e-4, "{:?} vs {:?}", x, y);
        }
    }

    #[test]
    fn test_forward_index_matches_postings() {
        for codec in [DocVectorCodec::VarByte, DocVectorCodec::MiniIndex] {
            let index = build_index(codec, 200);
            let spec = two_stage_model(30).with_feature(od_feature(1));
            let query = ["alpha", "beta"];

            let (postings, _) = run(&spec, &query, &index, 20, FeatureSource::Postings).unwrap();
            let (forward, _) = run(&spec, &query, &index, 20, FeatureSource::ForwardIndex).unwrap();

            assert_eq!(postings.len(), forward.len());
            for (p, f) in postings.iter().zip(&forward) {
                assert_eq!(p.doc, f.doc);
                assert_eq!(p.score.to_bits(), f.score.to_bits());
            }
        }
    }

    #[test]
    fn test_single_term_bm25_scores() {
        let index = build_index(DocVectorCodec::VarByte, 120);
        let spec = ModelSpec::new("bm25").with_feature(
            FeatureSpec::new("term", CliqueSetSpec::Term, ScoringSpec::bm25(1.2, 0.75)),
        );
        let (results, _) = run(&spec, &["gamma"], &index, 1000, FeatureSource::Postings).unwrap();

        let evidence = index.term_evidence("gamma");
        let global = index.global_evidence();
        assert_eq!(results.len() as u64, evidence.df);

        let idf = bm25_idf(evidence.df as f64, global.document_count as f64);
        let mut cursor = index.open_postings("gamma").unwrap().unwrap();
        let mut expected = Vec::new();
        while cursor.doc() != crate::structures::TERMINATED {
            let doc = cursor.doc();
            let score = bm25_score(
                cursor.term_freq() as f64,
                index.doc_len(doc).unwrap() as f64,
                global.avg_doc_len as f64,
                1.2f32 as f64,
                0.75f32 as f64,
                idf,
            ) as f32;
            expected.push(ScoredDoc::new(doc, score));
            cursor.advance().unwrap();
        }
        expected.sort_by(|a, b| a.rank_cmp(b));
        assert_eq!(results, expected);
    }

    #[test]
    fn test_zero_k1_scores_partial_matches() {
        let mut builder = IndexBuilder::new(DocVectorCodec::VarByte);
        builder.add_text("apple pie recipe");
        builder.add_text("banana bread");
        builder.add_text("apple banana smoothie");
        builder.add_text("cherry tart");
        builder.add_text("plain toast");
        let index = builder.build().unwrap();

        let spec = ModelSpec::new("bm25").with_feature(FeatureSpec::new(
            "term",
            CliqueSetSpec::Term,
            ScoringSpec::bm25(0.0, 0.75),
        ));
        let (results, _) = run(
            &spec,
            &["apple", "banana"],
            &index,
            10,
            FeatureSource::Postings,
        )
        .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|d| d.score.is_finite()), "{:?}", results);
        // With k1 = 0 each present term adds its idf, absent terms add nothing
        let idf = bm25_idf(2.0, 5.0) as f32;
        assert!(idf > 0.0);
        let score_of = |doc: DocId| results.iter().find(|d| d.doc == doc).unwrap().score;
        assert!((score_of(0) - idf).abs() < 1e-6);
        assert!((score_of(1) - idf).abs() < 1e-6);
        assert!((score_of(2) - 2.0 * idf).abs() < 1e-6);
    }

    #[test]
    fn test_shared_parameters_match_legacy_ranking() {
        let index = build_index(DocVectorCodec::VarByte, 200);
        let query = terms(&["alpha", "delta"]);
        let cascade = CascadeParams {
            k1: 0.9,
            b: 0.4,
            mu: 1200.0,
        };

        let legacy = ModelSpec::new("legacy")
            .with_feature(term_feature(ScoringSpec::bm25(0.9, 0.4)))
            .with_feature(
                FeatureSpec::new(
                    "uw",
                    CliqueSetSpec::Unordered {
                        window: 8,
                        dependence: Dependence::Sequential,
                    },
                    ScoringSpec::dirichlet(1200.0),
                )
                .stage(1),
            );
        let trained = ModelSpec::new("trained")
            .with_feature(term_feature(ScoringSpec::bm25(5.0, 0.0).cascade()))
            .with_feature(
                FeatureSpec::new(
                    "uw",
                    CliqueSetSpec::Unordered {
                        window: 8,
                        dependence: Dependence::Sequential,
                    },
                    ScoringSpec::dirichlet(10.0).cascade(),
                )
                .stage(1),
            );

        let evaluate = |spec: &ModelSpec| {
            let graph = CliqueGraph::build(spec, &query, &index, &cascade).unwrap();
            CascadeModel::new(graph).evaluate(&index, 50).unwrap().0
        };
        let a = evaluate(&legacy);
        let b = evaluate(&trained);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.doc, y.doc);
            assert_eq!(x.score.to_bits(), y.score.to_bits());
        }
    }

    #[test]
    fn test_all_oov_query_is_empty() {
        let index = build_index(DocVectorCodec::VarByte, 50);
        let (results, stats) = run(
            &two_stage_model(10),
            &["unseen", "absent"],
            &index,
            10,
            FeatureSource::Postings,
        )
        .unwrap();
        assert!(results.is_empty());
        assert!(stats.stages.is_empty());
    }

    #[test]
    fn test_partially_oov_query() {
        let index = build_index(DocVectorCodec::VarByte, 50);
        let (with_oov, _) = run(
            &two_stage_model(10),
            &["alpha", "unseen"],
            &index,
            10,
            FeatureSource::Postings,
        )
        .unwrap();
        assert_eq!(with_oov.len(), 10);
        // The OOV term and its window clique contribute exactly zero
        let alone = ModelSpec::new("alone").with_feature(
            term_feature(ScoringSpec::dirichlet(2500.0))
                .pruning(PruningFunction::TopK { count: 10 }),
        );
        let (alpha_only, _) =
            run(&alone, &["alpha"], &index, 10, FeatureSource::Postings).unwrap();
        assert_eq!(with_oov, alpha_only);
    }

    #[test]
    fn test_cheaper_stage_runs_first() {
        let index = build_index(DocVectorCodec::VarByte, 100);
        // Window clique declared as stage 0, terms as stage 1
        let spec = ModelSpec::new("reordered")
            .with_feature(uw_feature(0))
            .with_feature(term_feature(ScoringSpec::dirichlet(2500.0)).stage(1));

        let graph = CliqueGraph::build(
            &spec,
            &terms(&["alpha", "beta"]),
            &index,
            &CascadeParams::default(),
        )
        .unwrap();
        let model = CascadeModel::new(graph);
        let order: Vec<usize> = model.stages().iter().map(|s| s.index()).collect();
        assert_eq!(order, vec![1, 0]);
        assert!(model.stages()[0].cost() <= model.stages()[1].cost());
    }

    #[test]
    fn test_zero_k() {
        let index = build_index(DocVectorCodec::VarByte, 30);
        let (results, _) = run(
            &two_stage_model(10),
            &["alpha"],
            &index,
            0,
            FeatureSource::Postings,
        )
        .unwrap();
        assert!(results.is_empty());
    }

    /// Source whose document lengths fail for one document
    struct CorruptDocLengths {
        inner: PositionalIndex,
        bad_doc: DocId,
    }

    impl PostingsSource for CorruptDocLengths {
        fn open_postings(&self, term: &str) -> Result<Option<PositionPostingIterator>> {
            self.inner.open_postings(term)
        }

        fn doc_len(&self, doc: DocId) -> Result<u32> {
            if doc == self.bad_doc {
                return Err(Error::Decode(format!("corrupt length for doc {}", doc)));
            }
            self.inner.doc_len(doc)
        }

        fn global_evidence(&self) -> GlobalEvidence {
            self.inner.global_evidence()
        }

        fn term_evidence(&self, term: &str) -> GlobalTermEvidence {
            self.inner.term_evidence(term)
        }

        fn term_id(&self, term: &str) -> Option<TermId> {
            self.inner.term_id(term)
        }

        fn document_vector(&self, doc: DocId) -> Result<Box<dyn DocumentVector>> {
            self.inner.document_vector(doc)
        }

        fn num_docs(&self) -> u32 {
            self.inner.num_docs()
        }
    }

    #[test]
    fn test_decode_error_aborts_query() {
        let source = CorruptDocLengths {
            inner: build_index(DocVectorCodec::VarByte, 60),
            bad_doc: 0,
        };
        let result = run(
            &two_stage_model(10),
            &["alpha", "beta"],
            &source,
            10,
            FeatureSource::Postings,
        );
        assert!(matches!(result, Err(Error::Decode(_))));
    }
}
