// End-to-end tests of the enrichment pipeline on small synthetic data sets.

#[cfg(test)]
mod integration_tests {
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use single_gsea::config::{EnrichmentConfig, PermutationConfig, ResultFilter};
    use single_gsea::enrichment::{GeneSet, SetEnrichment, enrichment_scores};
    use single_gsea::ranking::{FeatureTable, Metric, Phenotype};

    const N_FEATURES: usize = 30;
    const N_SAMPLES: usize = 8;

    /// Rows 0-9 rise with the phenotype, rows 10-19 fall, rows 20-29 are noise.
    fn measurement_table() -> FeatureTable {
        let values = Array2::from_shape_fn((N_FEATURES, N_SAMPLES), |(i, j)| {
            let noise = ((i * 7 + j * 3) % 5) as f64 * 0.1;
            let j = j as f64;
            match i {
                0..=9 => j + noise,
                10..=19 => -j + noise,
                _ => noise,
            }
        });
        let ids: Vec<String> = (0..N_FEATURES).map(|i| format!("F{}", i)).collect();
        let samples: Vec<String> = (0..N_SAMPLES).map(|j| format!("s{}", j)).collect();
        FeatureTable::from_measurements(ids, samples, values).unwrap()
    }

    fn phenotype() -> Phenotype {
        Phenotype::from_pairs((0..N_SAMPLES).map(|j| (format!("s{}", j), j as f64)))
    }

    fn members(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|i| format!("F{}", i)).collect()
    }

    fn gene_sets() -> Vec<GeneSet> {
        vec![
            GeneSet::new("up", "Rising with phenotype", members(0..10)),
            GeneSet::new("down", "Falling with phenotype", members(10..20)),
            GeneSet::new("noise", "Unrelated", members(20..30)),
            GeneSet::new("small", "Too few members", members(0..3)),
        ]
    }

    fn fold_table() -> FeatureTable {
        let ids: Vec<String> = (0..40).map(|i| format!("P{}", i)).collect();
        // never exactly 1.0, so no log2 value is zero
        let fold: Vec<f64> = (0..40).map(|i| 4.05 - i as f64 * 0.1).collect();
        FeatureTable::from_fold_changes(ids, fold).unwrap()
    }

    fn fold_sets() -> Vec<GeneSet> {
        vec![
            GeneSet::new("top", "top", (0..8).map(|i| format!("P{}", i))),
            GeneSet::new("bottom", "bottom", (32..40).map(|i| format!("P{}", i))),
            GeneSet::new("even", "even", (0..40).step_by(2).map(|i| format!("P{}", i))),
        ]
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn assert_close(a: Option<f64>, b: Option<f64>) {
        match (a, b) {
            (Some(a), Some(b)) => assert_relative_eq!(a, b, epsilon = 1e-12),
            (None, None) => {}
            other => panic!("mismatch: {:?}", other),
        }
    }

    #[test]
    fn test_spearman_pipeline_scores_and_significance() {
        init_logging();
        let table = measurement_table();
        // q-values above 1 are possible, keep every row with defined p and q
        let config = EnrichmentConfig::default()
            .with_min_hits(5)
            .with_permutation(PermutationConfig::new(50).with_cpus(2).with_seed(7))
            .with_result_filter(ResultFilter {
                max_qval: f64::INFINITY,
                ..Default::default()
            });

        let result = table
            .enrichment_scores(&gene_sets(), Some(&phenotype()), &config)
            .unwrap();

        assert_eq!(result.gene_changes.len(), N_FEATURES);
        assert!(result.gene_changes.missing().is_empty());

        // filtered out before scoring, so neither a result nor a rejection
        assert!(result.get("small").is_none());
        assert!(result.rejected.iter().all(|r| r.id != "small"));
        assert_eq!(result.len(), 3);

        let up = result.get("up").unwrap();
        let down = result.get("down").unwrap();
        assert_relative_eq!(up.es, 1.0, epsilon = 1e-9);
        assert_relative_eq!(down.es, -1.0, epsilon = 1e-9);
        assert_eq!(up.n_hits, 10);
        assert_eq!(up.cumscore.len(), N_FEATURES + 1);

        assert!(result.significance_estimated());
        for row in &result.results {
            assert_eq!(row.null_pool.as_ref().unwrap().len(), 50);
            if let Some(nes) = row.nes() {
                assert_eq!(nes > 0.0, row.es > 0.0);
            }
            if let Some(p) = row.p_value() {
                assert!((0.0..=1.0).contains(&p));
            }
            if let Some(q) = row.q_value() {
                assert!(q >= 0.0);
            }
        }

        let nes: Vec<Option<f64>> = result.results.iter().map(|r| r.nes()).collect();
        for pair in nes.windows(2) {
            match (pair[0], pair[1]) {
                (Some(a), Some(b)) => assert!(a >= b),
                (None, Some(_)) => panic!("missing NES sorted before a defined one"),
                _ => {}
            }
        }

        let dist = result.nes_distribution.as_ref().unwrap();
        assert_eq!(dist.observed.len(), nes.iter().flatten().count());
    }

    #[test]
    fn test_pipeline_without_significance_sorts_by_es() {
        let table = measurement_table();
        let config = EnrichmentConfig::default()
            .with_min_hits(5)
            .with_significance(false);

        let result = enrichment_scores(&table, &gene_sets(), Some(&phenotype()), &config).unwrap();

        assert!(!result.significance_estimated());
        let ids: Vec<&str> = result.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.first(), Some(&"up"));
        assert_eq!(ids.last(), Some(&"down"));
        assert!(result.results.iter().all(|r| r.significance.is_none()));
        assert!(result.results.iter().all(|r| r.null_pool.is_none()));
    }

    #[test]
    fn test_reporting_filter_drops_weak_sets() {
        let table = measurement_table();
        let config = EnrichmentConfig::default()
            .with_min_hits(5)
            .with_significance(false)
            .with_result_filter(ResultFilter {
                min_abs_score: 0.9,
                ..ResultFilter::reporting()
            });

        let result = table
            .enrichment_scores(&gene_sets(), Some(&phenotype()), &config)
            .unwrap();
        let ids: Vec<&str> = result.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["up", "down"]);
    }

    #[test]
    fn test_fold_change_pipeline_is_deterministic() {
        init_logging();
        let table = fold_table();
        let sets = fold_sets();

        for metric in [Metric::Fold, Metric::Log2, Metric::Zscore] {
            let config = EnrichmentConfig::default()
                .with_metric(metric)
                .with_min_hits(5)
                .with_permutation(PermutationConfig::new(20).with_cpus(3).with_seed(42))
                .with_result_filter(ResultFilter {
                    max_qval: f64::INFINITY,
                    ..Default::default()
                });

            let first = table.enrichment_scores(&sets, None, &config).unwrap();
            let second = table.enrichment_scores(&sets, None, &config).unwrap();
            assert_eq!(first, second, "metric {}", metric);

            let top = first.get("top").unwrap();
            let bottom = first.get("bottom").unwrap();
            assert!(top.es > 0.0);
            assert!(bottom.es < 0.0);
        }
    }

    #[test]
    fn test_worker_count_does_not_change_results() {
        let table = fold_table();
        let sets = fold_sets();
        let sequential = EnrichmentConfig::default()
            .with_metric(Metric::Log2)
            .with_min_hits(5)
            .with_permutation(PermutationConfig::new(24).with_cpus(1).with_seed(3));
        let parallel = sequential
            .clone()
            .with_permutation(PermutationConfig::new(24).with_cpus(4).with_seed(3));

        let a = table.enrichment_scores(&sets, None, &sequential).unwrap();
        let b = table.enrichment_scores(&sets, None, &parallel).unwrap();

        assert_eq!(a.len(), b.len());
        for (ra, rb) in a.results.iter().zip(&b.results) {
            assert_eq!(ra.id, rb.id);
            assert_eq!(ra.es, rb.es);
            assert_close(ra.nes(), rb.nes());
            assert_close(ra.p_value(), rb.p_value());
            assert_close(ra.q_value(), rb.q_value());
        }
    }

    #[test]
    fn test_pre_filter_round_trip() {
        let table = measurement_table();
        let sets = gene_sets();
        let kept = table
            .filter_gene_sets(&sets, Some(&phenotype()), Metric::Spearman, 10)
            .unwrap();

        let ranked = table
            .rank_features(Some(&phenotype()), Metric::Spearman)
            .unwrap();
        for set in &kept {
            let overlap = ranked.ids().iter().filter(|id| set.contains(id)).count();
            assert!(overlap >= 10);
        }
        assert!(kept.iter().all(|s| s.id != "small"));

        let config = EnrichmentConfig::default().with_significance(false);
        let result = table
            .enrichment_scores(&sets, Some(&phenotype()), &config)
            .unwrap();
        assert!(result.get("small").is_none());
    }

    #[test]
    fn test_missing_phenotype_is_reported() {
        let table = measurement_table();
        let err = table
            .enrichment_scores(&gene_sets(), None, &EnrichmentConfig::default())
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("spearman"));
        assert!(message.contains("phenotype"));
    }

    #[test]
    fn test_no_surviving_gene_sets() {
        let table = fold_table();
        let config = EnrichmentConfig::default()
            .with_metric(Metric::Fold)
            .with_permutation(PermutationConfig::new(10).with_seed(1));
        let sets = vec![GeneSet::new("tiny", "tiny", ["P0", "P1"])];

        let result = table.enrichment_scores(&sets, None, &config).unwrap();
        assert!(result.is_empty());
        assert!(result.rejected.is_empty());
        assert_eq!(result.nes_distribution.unwrap().observed.len(), 0);
    }

    #[test]
    fn test_unscorable_sets_are_rejected() {
        let table =
            FeatureTable::from_fold_changes(["A", "B", "C", "D", "E"], vec![2.0, 1.0, 0.0, -1.0, -2.0])
                .unwrap();
        let sets = vec![
            GeneSet::new("none", "No ranked members", ["X"]),
            GeneSet::new("zero", "Only a zero fold-change", ["C"]),
            GeneSet::new("ok", "Top features", ["A", "B"]),
        ];
        let config = EnrichmentConfig::default()
            .with_metric(Metric::Fold)
            .with_min_hits(0)
            .with_permutation(PermutationConfig::new(20).with_cpus(2).with_seed(11))
            .with_result_filter(ResultFilter {
                max_qval: f64::INFINITY,
                ..Default::default()
            });

        let result = table.enrichment_scores(&sets, None, &config).unwrap();

        let rejected: Vec<&str> = result.rejected.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(rejected, vec!["none", "zero"]);
        assert!(result.rejected[0].reason.contains("0 hits"));
        assert!(result.rejected[1].reason.contains("zero total hit weight"));

        assert!(result.get("none").is_none());
        assert!(result.get("zero").is_none());
        let ok = result.get("ok").unwrap();
        assert_relative_eq!(ok.es, 1.0, epsilon = 1e-12);
        assert_eq!(ok.null_pool.as_ref().unwrap().len(), 20);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_result_table_serializes() {
        let table = fold_table();
        let config = EnrichmentConfig::default()
            .with_metric(Metric::Fold)
            .with_min_hits(5)
            .with_significance(false);
        let result = table.enrichment_scores(&fold_sets(), None, &config).unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["results"].as_array().unwrap().len(), 3);
        assert!(json["results"][0]["cumscore"].is_array());
    }
}
