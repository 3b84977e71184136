//! # single-gsea
//!
//! Gene set and phosphosite set enrichment analysis (GSEA / PSEA) for proteomics data, part of
//! the single-rust ecosystem.
//!
//! Features are ranked by their correlation with a phenotype or by their fold-change, and each
//! gene set is scored with a weighted running-sum enrichment score. Significance is estimated
//! empirically by permutation, normalizing positive and negative enrichment separately.
//!
//! ## Core Features
//!
//! - **Ranking**: Spearman, Pearson and Kendall correlation, fold-change, log2 fold-change and
//!   z-scores, with duplicate feature IDs collapsed to their mean
//! - **Enrichment Scores**: ES(S) with its full running-sum curve and hit list
//! - **Permutation Testing**: Parallel, seedable ES(S, pi) null pools built on rayon
//! - **Significance**: NES(S), empirical p-values and FDR q-values
//! - **Filtering**: Coverage pre-filter and p/q/score post-filter
//!
//! ## Quick Start
//!
//! Build a [`ranking::FeatureTable`] and call
//! [`enrichment_scores`](enrichment::SetEnrichment::enrichment_scores) through the
//! [`enrichment::SetEnrichment`] trait with an [`config::EnrichmentConfig`].
//!
//! ## Module Organization
//!
//! - **[`ranking`]**: Ranking metrics and the ranked feature list
//! - **[`enrichment`]**: Enrichment scores, permutation testing, filtering and the pipeline
//! - **[`testing`]**: Empirical distributions and p-/q-value estimation
//! - **[`config`]**: Run configuration
//! - **[`error`]**: Error types

pub mod config;
pub mod enrichment;
pub mod error;
pub mod ranking;
pub mod testing;

pub use config::{EnrichmentConfig, PermutationConfig, ResultFilter};
pub use enrichment::{EnrichmentResult, EnrichmentTable, GeneSet, SetEnrichment};
pub use error::{EnrichmentError, Result};
pub use ranking::{FeatureTable, Metric, Phenotype, RankedList};
