use serde::Serialize;

use crate::config::validate_weight;
use crate::enrichment::GeneSet;
use crate::error::{EnrichmentError, Result};
use crate::ranking::RankedList;

/// Running-sum statistic of one gene set against a ranked list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentScore {
    /// Hit mask, one entry per rank position
    pub hits: Vec<bool>,
    /// Hit IDs in rank order
    pub hit_list: Vec<String>,
    /// Running sum, N + 1 values starting at 0
    pub cumscore: Vec<f64>,
    /// ES(S)
    pub es: f64,
}

impl EnrichmentScore {
    pub fn n_hits(&self) -> usize {
        self.hit_list.len()
    }
}

/// Calculate the enrichment score of `gene_set` against `ranked`.
///
/// Hits step up by |score|^p / N_R, misses step down by 1 / (N - n_h). ES(S) is the
/// running-sum value with the largest magnitude; the first one wins on ties.
///
/// # Errors
///
/// * [`EnrichmentError::InvalidGeneSet`] unless 0 < n_h < N
/// * [`EnrichmentError::ZeroHitWeight`] when no hit carries weight
pub fn calculate_es_s(ranked: &RankedList, gene_set: &GeneSet, p: f64) -> Result<EnrichmentScore> {
    validate_weight(p)?;

    let n = ranked.len();
    let hits: Vec<bool> = ranked.ids().iter().map(|id| gene_set.contains(id)).collect();
    let n_h = hits.iter().filter(|&&hit| hit).count();

    if n_h == 0 || n_h >= n {
        return Err(EnrichmentError::InvalidGeneSet {
            set_id: gene_set.id.clone(),
            n_hits: n_h,
            n_features: n,
        });
    }

    let n_r: f64 = hits
        .iter()
        .zip(ranked.scores())
        .filter(|&(&hit, _)| hit)
        .map(|(_, score)| score.abs().powf(p))
        .sum();

    if !(n_r.is_finite() && n_r > 0.0) {
        return Err(EnrichmentError::ZeroHitWeight(gene_set.id.clone()));
    }

    let miss_step = -1.0 / (n - n_h) as f64;
    let mut cumscore = Vec::with_capacity(n + 1);
    cumscore.push(0.0);

    let mut running = 0.0;
    let mut es: f64 = 0.0;
    for (&hit, score) in hits.iter().zip(ranked.scores()) {
        running += if hit {
            score.abs().powf(p) / n_r
        } else {
            miss_step
        };
        cumscore.push(running);
        if running.abs() > es.abs() {
            es = running;
        }
    }

    let hit_list = ranked
        .ids()
        .iter()
        .zip(&hits)
        .filter(|&(_, &hit)| hit)
        .map(|(id, _)| id.clone())
        .collect();

    Ok(EnrichmentScore {
        hits,
        hit_list,
        cumscore,
        es,
    })
}
