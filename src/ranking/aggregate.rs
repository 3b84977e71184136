use std::cmp::Ordering;
use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use crate::error::{EnrichmentError, Result};

/// Features ordered by their ranking value, highest first.
///
/// Each ID appears once. IDs whose aggregated value is missing are not ranked and are
/// kept in [`RankedList::missing`] instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankedList {
    ids: Vec<String>,
    scores: Vec<f64>,
    missing: Vec<String>,
}

impl RankedList {
    /// Number of ranked features (N).
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// IDs that could not be ranked because every observation of them was missing.
    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.scores.iter().copied())
    }
}

struct Group<'a> {
    id: &'a str,
    sum: f64,
    count: usize,
}

/// Collapse duplicate IDs to their mean ranking value and sort descending.
///
/// Missing values are skipped when averaging; a group with no present value stays
/// missing. Ties keep the order in which IDs were first seen.
pub fn get_gene_changes<S: AsRef<str>>(
    ids: &[S],
    correlations: &[Option<f64>],
) -> Result<RankedList> {
    if ids.len() != correlations.len() {
        return Err(EnrichmentError::DimensionMismatch {
            expected: ids.len(),
            actual: correlations.len(),
        });
    }

    let mut lookup: HashMap<&str, usize> = HashMap::with_capacity(ids.len());
    let mut groups: Vec<Group> = Vec::new();

    for (id, value) in ids.iter().zip(correlations) {
        let id = id.as_ref();
        let idx = *lookup.entry(id).or_insert_with(|| {
            groups.push(Group {
                id,
                sum: 0.0,
                count: 0,
            });
            groups.len() - 1
        });

        if let Some(v) = value.filter(|v| v.is_finite()) {
            groups[idx].sum += v;
            groups[idx].count += 1;
        }
    }

    let mut ranked: Vec<(&str, f64)> = Vec::with_capacity(groups.len());
    let mut missing = Vec::new();
    for group in &groups {
        if group.count == 0 {
            missing.push(group.id.to_string());
        } else {
            ranked.push((group.id, group.sum / group.count as f64));
        }
    }

    // stable: equal scores keep first-seen group order
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    debug!(
        "Aggregated {} rows into {} ranked IDs ({} missing)",
        ids.len(),
        ranked.len(),
        missing.len()
    );

    let (ids, scores) = ranked
        .into_iter()
        .map(|(id, score)| (id.to_string(), score))
        .unzip();

    Ok(RankedList {
        ids,
        scores,
        missing,
    })
}
