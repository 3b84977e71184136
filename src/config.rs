//! Run configuration for the enrichment pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EnrichmentError, Result};
use crate::ranking::Metric;

/// Settings of a single enrichment run, passed to
/// [`enrichment_scores`](crate::enrichment::enrichment_scores).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Ranking metric
    pub metric: Metric,
    /// Exponent p applied to |ranking value| when weighting hits
    pub weight: f64,
    /// Run permutation testing and estimate NES(S), p- and q-values
    pub estimate_significance: bool,
    pub permutation: PermutationConfig,
    /// Pre-filter: minimum number of gene set members present in the ranked list
    pub min_hits: usize,
    /// Post-filter applied to the scored gene sets
    pub result_filter: ResultFilter,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        EnrichmentConfig {
            metric: Metric::default(),
            weight: 1.0,
            estimate_significance: true,
            permutation: PermutationConfig::default(),
            min_hits: 10,
            result_filter: ResultFilter::default(),
        }
    }
}

impl EnrichmentConfig {
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_significance(mut self, estimate: bool) -> Self {
        self.estimate_significance = estimate;
        self
    }

    pub fn with_permutation(mut self, permutation: PermutationConfig) -> Self {
        self.permutation = permutation;
        self
    }

    pub fn with_min_hits(mut self, min_hits: usize) -> Self {
        self.min_hits = min_hits;
        self
    }

    pub fn with_result_filter(mut self, filter: ResultFilter) -> Self {
        self.result_filter = filter;
        self
    }

    /// Check parameter ranges before any computation starts.
    pub fn validate(&self) -> Result<()> {
        validate_weight(self.weight)?;
        self.permutation.validate()?;
        self.result_filter.validate()
    }
}

pub(crate) fn validate_weight(weight: f64) -> Result<()> {
    if !(weight.is_finite() && weight >= 0.0) {
        return Err(EnrichmentError::InvalidParameter(format!(
            "weight exponent must be a finite value >= 0, got {}",
            weight
        )));
    }
    Ok(())
}

/// Settings of the permutation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermutationConfig {
    /// Number of permutation trials
    pub p_iter: usize,
    /// Worker count; `None` uses the metric's default, `<= 1` runs sequentially
    pub n_cpus: Option<usize>,
    /// Base seed; trial `i` is seeded with `seed + i`
    pub seed: Option<u64>,
    /// Overall time budget for the permutation batch
    pub deadline: Option<Duration>,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        PermutationConfig {
            p_iter: 1000,
            n_cpus: None,
            seed: None,
            deadline: None,
        }
    }
}

impl PermutationConfig {
    pub fn new(p_iter: usize) -> Self {
        PermutationConfig {
            p_iter,
            ..Default::default()
        }
    }

    pub fn with_cpus(mut self, n_cpus: usize) -> Self {
        self.n_cpus = Some(n_cpus);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.p_iter == 0 {
            return Err(EnrichmentError::InvalidParameter(
                "p_iter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cutoffs applied to scored gene sets.
///
/// The p- and q-value cutoffs only apply when significance was estimated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultFilter {
    pub min_hits: usize,
    pub min_abs_score: f64,
    pub max_pval: f64,
    pub max_qval: f64,
}

impl Default for ResultFilter {
    fn default() -> Self {
        ResultFilter {
            min_hits: 0,
            min_abs_score: 0.0,
            max_pval: 1.0,
            max_qval: 1.0,
        }
    }
}

impl ResultFilter {
    /// Cutoffs used for reports: only gene sets with |ES(S)| >= 0.3.
    pub fn reporting() -> Self {
        ResultFilter {
            min_abs_score: 0.3,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_abs_score", self.min_abs_score),
            ("max_pval", self.max_pval),
            ("max_qval", self.max_qval),
        ] {
            if value.is_nan() {
                return Err(EnrichmentError::InvalidParameter(format!(
                    "{} must not be NaN",
                    name
                )));
            }
        }
        Ok(())
    }
}
