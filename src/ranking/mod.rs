//! Feature ranking: per-feature ranking values and the canonical ranked list.
//!
//! A [`FeatureTable`] holds the rows handed over by a data-set loader: one feature ID per
//! row (IDs may repeat, e.g. several peptides of one phosphosite), an optional
//! fold-change column and an optional feature-by-sample measurement matrix.
//!
//! ## Metrics
//!
//! - **spearman / pearson / kendall**: correlation of each row against a [`Phenotype`],
//!   requiring at least [`MIN_PERIODS`] paired observations
//! - **fold**: the fold-change value itself
//! - **log2**: log2 of the fold-change
//! - **zscore**: log2 fold-change standardized across all features of the run

mod aggregate;
mod correlation;

use std::fmt;
use std::str::FromStr;

use log::debug;
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{EnrichmentError, Result};

pub use aggregate::{RankedList, get_gene_changes};
pub use correlation::{MIN_PERIODS, kendall, pearson, spearman};

/// Ranking metric used to score each feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Spearman,
    Pearson,
    Kendall,
    Fold,
    Log2,
    Zscore,
}

/// Signature shared by every ranking transformation.
pub type RankFn = fn(&FeatureTable, Option<&Phenotype>) -> Result<Vec<Option<f64>>>;

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Spearman,
        Metric::Pearson,
        Metric::Kendall,
        Metric::Fold,
        Metric::Log2,
        Metric::Zscore,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Spearman => "spearman",
            Metric::Pearson => "pearson",
            Metric::Kendall => "kendall",
            Metric::Fold => "fold",
            Metric::Log2 => "log2",
            Metric::Zscore => "zscore",
        }
    }

    /// Whether the metric correlates measurements against a phenotype.
    pub fn is_correlation(self) -> bool {
        matches!(self, Metric::Spearman | Metric::Pearson | Metric::Kendall)
    }

    /// Whether permutation testing shuffles the fold-change column rather than the
    /// phenotype.
    pub fn permutes_fold_change(self) -> bool {
        !self.is_correlation()
    }

    /// Default number of permutation workers.
    pub fn default_cpus(self) -> usize {
        if self.is_correlation() { 4 } else { 6 }
    }

    /// The ranking transformation for this metric.
    pub fn ranker(self) -> RankFn {
        match self {
            Metric::Spearman => rank_spearman,
            Metric::Pearson => rank_pearson,
            Metric::Kendall => rank_kendall,
            Metric::Fold => rank_fold,
            Metric::Log2 => rank_log2,
            Metric::Zscore => rank_zscore,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = EnrichmentError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| EnrichmentError::UnknownMetric(s.to_string()))
    }
}

/// Phenotype value per sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phenotype {
    samples: Vec<String>,
    values: Vec<f64>,
}

impl Phenotype {
    pub fn new(samples: Vec<String>, values: Vec<f64>) -> Result<Self> {
        if samples.len() != values.len() {
            return Err(EnrichmentError::DimensionMismatch {
                expected: samples.len(),
                actual: values.len(),
            });
        }
        Ok(Phenotype { samples, values })
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (samples, values) = pairs.into_iter().map(|(s, v)| (s.into(), v)).unzip();
        Phenotype { samples, values }
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Copy with the values randomly reassigned to the same sample names.
    pub fn shuffled<R: Rng + ?Sized>(&self, rng: &mut R) -> Phenotype {
        let mut values = self.values.clone();
        values.shuffle(rng);
        Phenotype {
            samples: self.samples.clone(),
            values,
        }
    }
}

/// Feature rows to be ranked. Missing quantifications are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    ids: Vec<String>,
    fold_change: Option<Vec<f64>>,
    samples: Vec<String>,
    values: Option<Array2<f64>>,
}

impl FeatureTable {
    /// Table ranked by fold-change based metrics.
    pub fn from_fold_changes<S: Into<String>>(
        ids: impl IntoIterator<Item = S>,
        fold_change: Vec<f64>,
    ) -> Result<Self> {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.len() != fold_change.len() {
            return Err(EnrichmentError::DimensionMismatch {
                expected: ids.len(),
                actual: fold_change.len(),
            });
        }
        Ok(FeatureTable {
            ids,
            fold_change: Some(fold_change),
            samples: Vec::new(),
            values: None,
        })
    }

    /// Table with a feature-by-sample measurement matrix, ranked by correlation metrics.
    pub fn from_measurements<S: Into<String>>(
        ids: impl IntoIterator<Item = S>,
        samples: impl IntoIterator<Item = S>,
        values: Array2<f64>,
    ) -> Result<Self> {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let samples: Vec<String> = samples.into_iter().map(Into::into).collect();
        if values.nrows() != ids.len() {
            return Err(EnrichmentError::DimensionMismatch {
                expected: ids.len(),
                actual: values.nrows(),
            });
        }
        if values.ncols() != samples.len() {
            return Err(EnrichmentError::DimensionMismatch {
                expected: samples.len(),
                actual: values.ncols(),
            });
        }
        Ok(FeatureTable {
            ids,
            fold_change: None,
            samples,
            values: Some(values),
        })
    }

    /// Attach a fold-change column to a measurement table.
    pub fn with_fold_changes(mut self, fold_change: Vec<f64>) -> Result<Self> {
        if fold_change.len() != self.ids.len() {
            return Err(EnrichmentError::DimensionMismatch {
                expected: self.ids.len(),
                actual: fold_change.len(),
            });
        }
        self.fold_change = Some(fold_change);
        Ok(self)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn fold_change(&self) -> Option<&[f64]> {
        self.fold_change.as_deref()
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn values(&self) -> Option<&Array2<f64>> {
        self.values.as_ref()
    }

    fn sample_index(&self, sample: &str) -> Option<usize> {
        self.samples.iter().position(|s| s == sample)
    }

    /// Copy of the fold-change rows with the fold-change values shuffled across
    /// features. The measurement matrix is not carried over.
    pub(crate) fn with_shuffled_fold_change<R: Rng + ?Sized>(
        &self,
        metric: Metric,
        rng: &mut R,
    ) -> Result<FeatureTable> {
        let mut fold_change = self
            .fold_change
            .clone()
            .ok_or(EnrichmentError::MissingFoldChange(metric))?;
        fold_change.shuffle(rng);
        Ok(FeatureTable {
            ids: self.ids.clone(),
            fold_change: Some(fold_change),
            samples: Vec::new(),
            values: None,
        })
    }
}

/// Calculate the ranking value of every row of `table` with the given metric.
///
/// The result is aligned with the table rows; `None` marks a missing value.
pub fn correlate_phenotype(
    table: &FeatureTable,
    phenotype: Option<&Phenotype>,
    metric: Metric,
) -> Result<Vec<Option<f64>>> {
    debug!(
        "Calculating '{}' ranking values for {} rows",
        metric,
        table.len()
    );
    (metric.ranker())(table, phenotype)
}

fn rank_spearman(table: &FeatureTable, phenotype: Option<&Phenotype>) -> Result<Vec<Option<f64>>> {
    rank_by_correlation(table, phenotype, Metric::Spearman, spearman)
}

fn rank_pearson(table: &FeatureTable, phenotype: Option<&Phenotype>) -> Result<Vec<Option<f64>>> {
    rank_by_correlation(table, phenotype, Metric::Pearson, pearson)
}

fn rank_kendall(table: &FeatureTable, phenotype: Option<&Phenotype>) -> Result<Vec<Option<f64>>> {
    rank_by_correlation(table, phenotype, Metric::Kendall, kendall)
}

fn rank_by_correlation(
    table: &FeatureTable,
    phenotype: Option<&Phenotype>,
    metric: Metric,
    method: fn(&[f64], &[f64]) -> Option<f64>,
) -> Result<Vec<Option<f64>>> {
    let phenotype = phenotype.ok_or(EnrichmentError::MissingPhenotype(metric))?;
    let values = table
        .values()
        .ok_or(EnrichmentError::MissingMeasurements(metric))?;

    let columns = phenotype
        .samples()
        .iter()
        .map(|s| {
            table
                .sample_index(s)
                .ok_or_else(|| EnrichmentError::UnknownSample(s.clone()))
        })
        .collect::<Result<Vec<usize>>>()?;

    let correlations = values
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|row| {
            let (x, y): (Vec<f64>, Vec<f64>) = columns
                .iter()
                .zip(phenotype.values())
                .map(|(&col, &p)| (row[col], p))
                .filter(|(v, p)| v.is_finite() && p.is_finite())
                .unzip();

            if x.len() < MIN_PERIODS {
                None
            } else {
                method(&x, &y)
            }
        })
        .collect();

    Ok(correlations)
}

fn fold_changes(table: &FeatureTable, metric: Metric) -> Result<&[f64]> {
    table
        .fold_change()
        .ok_or(EnrichmentError::MissingFoldChange(metric))
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn rank_fold(table: &FeatureTable, _phenotype: Option<&Phenotype>) -> Result<Vec<Option<f64>>> {
    let fold = fold_changes(table, Metric::Fold)?;
    Ok(fold.iter().map(|&v| finite(v)).collect())
}

fn rank_log2(table: &FeatureTable, _phenotype: Option<&Phenotype>) -> Result<Vec<Option<f64>>> {
    let fold = fold_changes(table, Metric::Log2)?;
    Ok(fold.iter().map(|&v| finite(v.log2())).collect())
}

fn rank_zscore(table: &FeatureTable, _phenotype: Option<&Phenotype>) -> Result<Vec<Option<f64>>> {
    let fold = fold_changes(table, Metric::Zscore)?;

    // only log-transform when every quantified fold-change is positive
    let log_scale = fold.iter().filter(|v| v.is_finite()).all(|&v| v > 0.0);
    let scaled: Vec<Option<f64>> = fold
        .iter()
        .map(|&v| finite(v).and_then(|v| if log_scale { finite(v.log2()) } else { Some(v) }))
        .collect();

    let present: Vec<f64> = scaled.iter().flatten().copied().collect();
    let mean = present.iter().mean();
    let std_dev = present.iter().std_dev();

    if !(std_dev.is_finite() && std_dev > 0.0) {
        debug!("zscore standard deviation is degenerate, all ranking values are missing");
        return Ok(vec![None; fold.len()]);
    }

    Ok(scaled
        .into_iter()
        .map(|v| v.map(|v| (v - mean) / std_dev))
        .collect())
}
