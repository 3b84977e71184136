//! Error types for the enrichment pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::ranking::Metric;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Unknown metric '{0}', expected one of: spearman, pearson, kendall, fold, log2, zscore")]
    UnknownMetric(String),

    #[error("Metric '{0}' requires a phenotype")]
    MissingPhenotype(Metric),

    #[error("Metric '{0}' requires a fold-change column")]
    MissingFoldChange(Metric),

    #[error("Metric '{0}' requires per-sample measurements")]
    MissingMeasurements(Metric),

    #[error("Phenotype sample '{0}' is not a column of the feature table")]
    UnknownSample(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Gene set '{set_id}' has {n_hits} hits in a ranked list of {n_features} features")]
    InvalidGeneSet {
        set_id: String,
        n_hits: usize,
        n_features: usize,
    },

    #[error("Gene set '{0}' has zero total hit weight")]
    ZeroHitWeight(String),

    #[error("Gene set '{0}' has no ES(S, pi) null pool")]
    MissingNullPool(String),

    #[error("Permutation trial {trial} failed")]
    TrialFailed {
        trial: usize,
        #[source]
        source: Box<EnrichmentError>,
    },

    #[error("Permutation deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Could not build permutation worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl EnrichmentError {
    /// Whether this error only invalidates the score of a single gene set.
    pub fn is_invalid_score(&self) -> bool {
        matches!(
            self,
            EnrichmentError::InvalidGeneSet { .. } | EnrichmentError::ZeroHitWeight(_)
        )
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, EnrichmentError>;
