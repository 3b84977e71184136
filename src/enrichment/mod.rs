//! Gene and phosphosite set enrichment analysis (GSEA / PSEA).
//!
//! Each gene set is scored against a ranked feature list with a weighted running-sum
//! statistic ES(S). Optionally the statistic's null distribution is estimated by
//! permuting the phenotype (correlation metrics) or the fold-changes (fold-change
//! metrics), from which NES(S), p-values and q-values are derived.
//!
//! ## Pipeline
//!
//! 1. Rank features ([`correlate_phenotype`]) and collapse duplicate IDs
//!    ([`get_gene_changes`])
//! 2. Drop gene sets with too little coverage ([`filter_gene_sets`])
//! 3. Score every gene set ([`calculate_es_s`])
//! 4. Build ES(S, pi) null pools ([`simulate_es_s_pi`]) and estimate significance
//!    ([`estimate_pq`](crate::testing::estimate_pq))
//! 5. Apply result cutoffs ([`filter_results`]) and sort ([`sort_results`])
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use single_gsea::config::{EnrichmentConfig, PermutationConfig};
//! use single_gsea::enrichment::{GeneSet, SetEnrichment};
//! use single_gsea::ranking::{FeatureTable, Metric};
//!
//! let table = FeatureTable::from_fold_changes(
//!     ["AKT1", "MAPK1", "MTOR", "TP53"],
//!     vec![2.5, 1.8, 0.6, 0.2],
//! )?;
//! let gene_sets = vec![GeneSet::new("hsa04151", "PI3K-Akt", ["AKT1", "MTOR"])];
//! let config = EnrichmentConfig::default()
//!     .with_metric(Metric::Log2)
//!     .with_min_hits(2)
//!     .with_permutation(PermutationConfig::new(1000).with_seed(42));
//!
//! let table = table.enrichment_scores(&gene_sets, None, &config)?;
//! for row in &table.results {
//!     println!("{}: ES={:.3} NES={:?} q={:?}", row.name, row.es, row.nes(), row.q_value());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

mod filter;
mod permutation;
mod score;

use std::collections::HashSet;

use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::EnrichmentConfig;
use crate::ranking::{
    FeatureTable, Metric, Phenotype, RankedList, correlate_phenotype, get_gene_changes,
};
use crate::testing::{NesDistribution, SignificanceRecord, estimate_pq};

pub use filter::{filter_gene_sets, filter_results, sort_results};
pub use permutation::{NullPools, simulate_es_s_pi};
pub use score::{EnrichmentScore, calculate_es_s};

/// A named collection of feature identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSet {
    pub id: String,
    pub name: String,
    pub set: HashSet<String>,
}

impl GeneSet {
    pub fn new<S: Into<String>>(
        id: impl Into<String>,
        name: impl Into<String>,
        members: impl IntoIterator<Item = S>,
    ) -> Self {
        GeneSet {
            id: id.into(),
            name: name.into(),
            set: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn contains(&self, feature_id: &str) -> bool {
        self.set.contains(feature_id)
    }
}

/// Enrichment of one gene set, the row type of the result table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentResult {
    pub id: String,
    pub name: String,
    pub set: HashSet<String>,
    /// Running-sum curve, N + 1 values
    pub cumscore: Vec<f64>,
    /// ES(S)
    pub es: f64,
    pub hits: Vec<bool>,
    pub hit_list: Vec<String>,
    pub n_hits: usize,
    /// ES(S, pi), one sample per permutation trial
    pub null_pool: Option<Vec<f64>>,
    pub significance: Option<SignificanceRecord>,
}

impl EnrichmentResult {
    pub fn from_score(gene_set: &GeneSet, score: EnrichmentScore) -> Self {
        let n_hits = score.n_hits();
        EnrichmentResult {
            id: gene_set.id.clone(),
            name: gene_set.name.clone(),
            set: gene_set.set.clone(),
            cumscore: score.cumscore,
            es: score.es,
            hits: score.hits,
            hit_list: score.hit_list,
            n_hits,
            null_pool: None,
            significance: None,
        }
    }

    pub fn with_null_pool(mut self, null_pool: Vec<f64>) -> Self {
        self.null_pool = Some(null_pool);
        self
    }

    /// NES(S), if significance was estimated and is defined for this gene set.
    pub fn nes(&self) -> Option<f64> {
        self.significance.as_ref().and_then(|s| s.nes)
    }

    pub fn p_value(&self) -> Option<f64> {
        self.significance.as_ref().and_then(|s| s.p_value)
    }

    pub fn q_value(&self) -> Option<f64> {
        self.significance.as_ref().and_then(|s| s.q_value)
    }
}

/// A gene set that passed pre-filtering but could not be scored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedGeneSet {
    pub id: String,
    pub name: String,
    pub reason: String,
}

/// Output of an enrichment run, consumed by reporting layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentTable {
    /// Filtered and sorted gene set results
    pub results: Vec<EnrichmentResult>,
    pub rejected: Vec<RejectedGeneSet>,
    /// The ranked list every gene set was scored against
    pub gene_changes: RankedList,
    /// Observed and permuted NES values, present when significance was estimated
    pub nes_distribution: Option<NesDistribution>,
}

impl EnrichmentTable {
    pub fn significance_estimated(&self) -> bool {
        self.nes_distribution.is_some()
    }

    pub fn get(&self, id: &str) -> Option<&EnrichmentResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Run the full enrichment pipeline.
///
/// Ranks `table` with the configured metric, pre-filters `gene_sets` against the
/// ranked list, scores each remaining set and, if enabled, estimates significance by
/// permutation. Gene sets that cannot be scored are reported in
/// [`EnrichmentTable::rejected`].
pub fn enrichment_scores(
    table: &FeatureTable,
    gene_sets: &[GeneSet],
    phenotype: Option<&Phenotype>,
    config: &EnrichmentConfig,
) -> anyhow::Result<EnrichmentTable> {
    config.validate().context("invalid enrichment configuration")?;

    let gene_changes = rank_features(table, phenotype, config.metric)?;
    info!(
        "Ranked {} features ({} without a ranking value)",
        gene_changes.len(),
        gene_changes.missing().len()
    );

    let candidates = filter_gene_sets(gene_sets, &gene_changes, config.min_hits);

    let mut results = Vec::with_capacity(candidates.len());
    let mut scored_sets = Vec::with_capacity(candidates.len());
    let mut rejected = Vec::new();

    for gene_set in candidates {
        match calculate_es_s(&gene_changes, &gene_set, config.weight) {
            Ok(score) => {
                results.push(EnrichmentResult::from_score(&gene_set, score));
                scored_sets.push(gene_set);
            }
            Err(err) if err.is_invalid_score() => {
                warn!("Skipping gene set '{}': {}", gene_set.id, err);
                rejected.push(RejectedGeneSet {
                    id: gene_set.id,
                    name: gene_set.name,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to score gene set '{}'", gene_set.id));
            }
        }
    }

    let nes_distribution = if !config.estimate_significance {
        None
    } else if results.is_empty() {
        Some(NesDistribution::default())
    } else {
        let pools = simulate_es_s_pi(
            table,
            &scored_sets,
            phenotype,
            config.metric,
            config.weight,
            &config.permutation,
        )
        .context("permutation testing failed")?;

        for (result, pool) in results.iter_mut().zip(pools.into_inner()) {
            result.null_pool = Some(pool);
        }

        Some(estimate_pq(&mut results).context("failed to estimate p- and q-values")?)
    };

    let mut results = filter_results(results, &config.result_filter);
    sort_results(&mut results, nes_distribution.is_some());

    Ok(EnrichmentTable {
        results,
        rejected,
        gene_changes,
        nes_distribution,
    })
}

fn rank_features(
    table: &FeatureTable,
    phenotype: Option<&Phenotype>,
    metric: Metric,
) -> anyhow::Result<RankedList> {
    let correlations = correlate_phenotype(table, phenotype, metric)
        .with_context(|| format!("failed to rank features with metric '{}'", metric))?;
    Ok(get_gene_changes(table.ids(), &correlations)?)
}

/// Enrichment analysis on a feature table.
pub trait SetEnrichment {
    /// Rank the features and collapse duplicate IDs.
    fn rank_features(
        &self,
        phenotype: Option<&Phenotype>,
        metric: Metric,
    ) -> anyhow::Result<RankedList>;

    /// Gene sets with at least `min_hits` members among the ranked features.
    fn filter_gene_sets(
        &self,
        gene_sets: &[GeneSet],
        phenotype: Option<&Phenotype>,
        metric: Metric,
        min_hits: usize,
    ) -> anyhow::Result<Vec<GeneSet>>;

    /// Run the full pipeline, see [`enrichment_scores`].
    fn enrichment_scores(
        &self,
        gene_sets: &[GeneSet],
        phenotype: Option<&Phenotype>,
        config: &EnrichmentConfig,
    ) -> anyhow::Result<EnrichmentTable>;
}

impl SetEnrichment for FeatureTable {
    fn rank_features(
        &self,
        phenotype: Option<&Phenotype>,
        metric: Metric,
    ) -> anyhow::Result<RankedList> {
        rank_features(self, phenotype, metric)
    }

    fn filter_gene_sets(
        &self,
        gene_sets: &[GeneSet],
        phenotype: Option<&Phenotype>,
        metric: Metric,
        min_hits: usize,
    ) -> anyhow::Result<Vec<GeneSet>> {
        let ranked = rank_features(self, phenotype, metric)?;
        Ok(filter_gene_sets(gene_sets, &ranked, min_hits))
    }

    fn enrichment_scores(
        &self,
        gene_sets: &[GeneSet],
        phenotype: Option<&Phenotype>,
        config: &EnrichmentConfig,
    ) -> anyhow::Result<EnrichmentTable> {
        enrichment_scores(self, gene_sets, phenotype, config)
    }
}
