use log::{debug, info};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::enrichment::EnrichmentResult;
use crate::error::{EnrichmentError, Result};
use crate::testing::EmpiricalDistribution;

/// Significance estimate of one gene set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceRecord {
    /// NES(S)
    pub nes: Option<f64>,
    pub p_value: Option<f64>,
    pub q_value: Option<f64>,
    /// Positive ES(S, pi) samples normalized by their mean
    pub pos_nes_pi: Vec<f64>,
    /// Negative ES(S, pi) samples normalized by the magnitude of their mean
    pub neg_nes_pi: Vec<f64>,
}

/// Observed NES(S) and pooled NES(S, pi) values of a run, the data behind an NES
/// histogram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NesDistribution {
    pub observed: Vec<f64>,
    pub permuted: Vec<f64>,
}

impl NesDistribution {
    pub fn permuted_distribution(&self) -> EmpiricalDistribution<f64> {
        EmpiricalDistribution::new(&self.permuted)
    }
}

/// Per-sign split of one null pool.
struct SignSplit {
    pos_mean: Option<f64>,
    neg_mean: Option<f64>,
    pos_nes_pi: Vec<f64>,
    neg_nes_pi: Vec<f64>,
}

impl SignSplit {
    fn new(pool: &[f64]) -> Self {
        let pos: Vec<f64> = pool.iter().copied().filter(|&v| v > 0.0).collect();
        let neg: Vec<f64> = pool.iter().copied().filter(|&v| v < 0.0).collect();

        let pos_mean = mean(&pos);
        let neg_mean = mean(&neg);

        let pos_nes_pi = pos_mean
            .map(|m| pos.iter().map(|v| v / m).collect())
            .unwrap_or_default();
        let neg_nes_pi = neg_mean
            .map(|m| neg.iter().map(|v| -v / m).collect())
            .unwrap_or_default();

        SignSplit {
            pos_mean,
            neg_mean,
            pos_nes_pi,
            neg_nes_pi,
        }
    }

    fn nes(&self, es: f64) -> Option<f64> {
        if es > 0.0 {
            self.pos_mean.map(|m| es / m)
        } else {
            self.neg_mean.map(|m| -es / m)
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.mean())
    }
}

/// Fraction of same-sign ES(S, pi) samples at least as extreme as `es`.
fn p_value(es: f64, pool: &[f64]) -> Option<f64> {
    let same_sign: Vec<f64> = pool
        .iter()
        .copied()
        .filter(|&v| if es < 0.0 { v < 0.0 } else { v >= 0.0 })
        .collect();
    if same_sign.is_empty() {
        return None;
    }
    let extreme = same_sign.iter().filter(|v| v.abs() >= es.abs()).count();
    Some(extreme as f64 / same_sign.len() as f64)
}

fn q_value(
    nes: f64,
    observed: &EmpiricalDistribution<f64>,
    permuted: &EmpiricalDistribution<f64>,
) -> Option<f64> {
    if nes > 0.0 {
        Some(permuted.sf(nes)? / (observed.pdf(nes)? + observed.sf(nes)?))
    } else {
        Some(permuted.cdf(nes)? / (observed.pdf(nes)? + observed.cdf(nes)?))
    }
}

/// Estimate NES(S), p- and q-values from the ES(S, pi) pools attached to `results`.
///
/// Positive and negative enrichment are normalized separately: a positive ES(S) is
/// divided by the mean of the positive ES(S, pi) samples, a negative one by the
/// magnitude of the mean of the negative samples. q-values compare each NES(S)
/// against the NES(S, pi) values pooled over all gene sets of the same sign.
///
/// Attaches a [`SignificanceRecord`] to every result and returns the NES values of
/// the run.
///
/// # Errors
///
/// [`EnrichmentError::MissingNullPool`] when a result carries no ES(S, pi) pool.
pub fn estimate_pq(results: &mut [EnrichmentResult]) -> Result<NesDistribution> {
    let mut records = Vec::with_capacity(results.len());
    for result in results.iter() {
        let pool = result
            .null_pool
            .as_deref()
            .ok_or_else(|| EnrichmentError::MissingNullPool(result.id.clone()))?;

        let split = SignSplit::new(pool);
        records.push(SignificanceRecord {
            nes: split.nes(result.es),
            p_value: p_value(result.es, pool),
            q_value: None,
            pos_nes_pi: split.pos_nes_pi,
            neg_nes_pi: split.neg_nes_pi,
        });
    }

    let (pos_observed, neg_observed): (Vec<(f64, f64)>, Vec<(f64, f64)>) = results
        .iter()
        .zip(&records)
        .filter_map(|(result, record)| record.nes.map(|nes| (result.es, nes)))
        .partition(|&(es, _)| es > 0.0);
    let pos_observed: EmpiricalDistribution<f64> =
        pos_observed.into_iter().map(|(_, nes)| nes).collect();
    let neg_observed: EmpiricalDistribution<f64> =
        neg_observed.into_iter().map(|(_, nes)| nes).collect();

    let pos_permuted: Vec<f64> = records
        .iter()
        .flat_map(|r| r.pos_nes_pi.iter().copied())
        .collect();
    let neg_permuted: Vec<f64> = records
        .iter()
        .flat_map(|r| r.neg_nes_pi.iter().copied())
        .collect();
    let pos_permuted_dist = EmpiricalDistribution::new(&pos_permuted);
    let neg_permuted_dist = EmpiricalDistribution::new(&neg_permuted);

    debug!(
        "NES distributions: {} positive / {} negative observed, {} positive / {} negative permuted",
        pos_observed.len(),
        neg_observed.len(),
        pos_permuted_dist.len(),
        neg_permuted_dist.len()
    );

    for record in &mut records {
        record.q_value = record.nes.and_then(|nes| {
            if nes > 0.0 {
                q_value(nes, &pos_observed, &pos_permuted_dist)
            } else {
                q_value(nes, &neg_observed, &neg_permuted_dist)
            }
        });
    }

    let observed = records.iter().filter_map(|r| r.nes).collect();
    let mut permuted = pos_permuted;
    permuted.extend(neg_permuted);

    for (result, record) in results.iter_mut().zip(records) {
        result.significance = Some(record);
    }

    info!("Calculated p- and q-values for {} gene sets", results.len());
    Ok(NesDistribution { observed, permuted })
}
