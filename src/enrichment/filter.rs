use std::cmp::Ordering;
use std::collections::HashSet;

use log::info;

use crate::config::ResultFilter;
use crate::enrichment::{EnrichmentResult, GeneSet};
use crate::ranking::RankedList;

/// Gene sets worth scoring against `ranked`.
///
/// A gene set is kept when it is strictly smaller than the ranked list and at least
/// `min_hits` of its members appear in it.
pub fn filter_gene_sets(
    gene_sets: &[GeneSet],
    ranked: &RankedList,
    min_hits: usize,
) -> Vec<GeneSet> {
    let n_features = ranked.len();
    let background: HashSet<&str> = ranked.ids().iter().map(String::as_str).collect();

    let kept: Vec<GeneSet> = gene_sets
        .iter()
        .filter(|gene_set| {
            let overlap = gene_set
                .set
                .iter()
                .filter(|id| background.contains(id.as_str()))
                .count();
            gene_set.len() < n_features && overlap >= min_hits
        })
        .cloned()
        .collect();

    info!(
        "Filtered {} gene sets down to {} with >= {} hits in {} ranked features",
        gene_sets.len(),
        kept.len(),
        min_hits,
        n_features
    );
    kept
}

/// Drop results that fail any of the cutoffs in `filter`.
///
/// The p- and q-value cutoffs only apply to results that carry a significance
/// estimate; a result whose p- or q-value is undefined fails them.
pub fn filter_results(
    results: Vec<EnrichmentResult>,
    filter: &ResultFilter,
) -> Vec<EnrichmentResult> {
    let before = results.len();
    let kept: Vec<EnrichmentResult> = results
        .into_iter()
        .filter(|r| passes(r, filter))
        .collect();

    if kept.len() < before {
        info!(
            "Result filter removed {} of {} gene sets",
            before - kept.len(),
            before
        );
    }
    kept
}

fn passes(result: &EnrichmentResult, filter: &ResultFilter) -> bool {
    if result.n_hits < filter.min_hits || result.es.abs() < filter.min_abs_score {
        return false;
    }
    if result.significance.is_none() {
        return true;
    }
    let p_ok = result.p_value().is_some_and(|p| p <= filter.max_pval);
    let q_ok = result.q_value().is_some_and(|q| q <= filter.max_qval);
    p_ok && q_ok
}

/// Sort results by NES(S) when significance was estimated, otherwise by ES(S).
///
/// Descending and stable; results without an NES go last.
pub fn sort_results(results: &mut [EnrichmentResult], by_nes: bool) {
    if by_nes {
        results.sort_by(|a, b| descending_missing_last(a.nes(), b.nes()));
    } else {
        results.sort_by(|a, b| b.es.total_cmp(&a.es));
    }
}

fn descending_missing_last(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
