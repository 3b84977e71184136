use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{PermutationConfig, validate_weight};
use crate::enrichment::{GeneSet, calculate_es_s};
use crate::error::{EnrichmentError, Result};
use crate::ranking::{FeatureTable, Metric, Phenotype, correlate_phenotype, get_gene_changes};

/// ES(S, pi) samples per gene set, indexed by the gene set's position in the
/// collection passed to [`simulate_es_s_pi`].
///
/// A permuted score that is undefined for a trial (no weighted hits after
/// relabeling) is stored as NaN, so every pool holds exactly one sample per trial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NullPools {
    pools: Vec<Vec<f64>>,
}

impl NullPools {
    /// Empty pools for `n_sets` gene sets, each with room for `capacity` samples.
    pub fn with_capacity(n_sets: usize, capacity: usize) -> Self {
        NullPools {
            pools: (0..n_sets).map(|_| Vec::with_capacity(capacity)).collect(),
        }
    }

    /// Number of gene sets.
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn get(&self, set_index: usize) -> Option<&[f64]> {
        self.pools.get(set_index).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.pools.iter().map(Vec::as_slice)
    }

    pub fn into_inner(self) -> Vec<Vec<f64>> {
        self.pools
    }

    fn record_trial(&mut self, scores: Vec<f64>) {
        debug_assert_eq!(scores.len(), self.pools.len());
        for (pool, es) in self.pools.iter_mut().zip(scores) {
            pool.push(es);
        }
    }

    fn merge(mut self, other: NullPools) -> NullPools {
        for (pool, samples) in self.pools.iter_mut().zip(other.pools) {
            pool.extend(samples);
        }
        self
    }
}

struct Progress {
    done: AtomicUsize,
    total: usize,
    every: usize,
}

impl Progress {
    fn new(total: usize) -> Self {
        Progress {
            done: AtomicUsize::new(0),
            total,
            every: total.div_ceil(10).max(1),
        }
    }

    fn tick(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.every == 0 {
            info!("Calculated {}/{} permutations", done, self.total);
        }
    }
}

/// Read-only state shared by every trial.
struct TrialContext<'a> {
    table: &'a FeatureTable,
    gene_sets: &'a [GeneSet],
    phenotype: Option<&'a Phenotype>,
    metric: Metric,
    weight: f64,
    seed: u64,
    started: Instant,
    deadline: Option<Duration>,
    progress: Progress,
}

impl TrialContext<'_> {
    fn run(&self, trial: usize) -> Result<Vec<f64>> {
        if let Some(deadline) = self.deadline {
            if self.started.elapsed() >= deadline {
                return Err(EnrichmentError::DeadlineExceeded(deadline));
            }
        }

        let scores = self
            .score_trial(trial)
            .map_err(|source| EnrichmentError::TrialFailed {
                trial,
                source: Box::new(source),
            })?;
        self.progress.tick();
        Ok(scores)
    }

    fn score_trial(&self, trial: usize) -> Result<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(trial as u64));

        let shuffled_table;
        let shuffled_phenotype;
        let (table, phenotype) = if self.metric.permutes_fold_change() {
            shuffled_table = self.table.with_shuffled_fold_change(self.metric, &mut rng)?;
            (&shuffled_table, self.phenotype)
        } else {
            shuffled_phenotype = self.phenotype.map(|p| p.shuffled(&mut rng));
            (self.table, shuffled_phenotype.as_ref())
        };

        let correlations = correlate_phenotype(table, phenotype, self.metric)?;
        let ranked = get_gene_changes(table.ids(), &correlations)?;

        let mut scores = Vec::with_capacity(self.gene_sets.len());
        for gene_set in self.gene_sets {
            match calculate_es_s(&ranked, gene_set, self.weight) {
                Ok(score) => scores.push(score.es),
                Err(err) if err.is_invalid_score() => {
                    debug!("Trial {}: {}", trial, err);
                    scores.push(f64::NAN);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(scores)
    }
}

/// Simulate ES(S, pi) by scrambling the phenotype (correlation metrics) or the
/// fold-change column (fold-change metrics) and re-scoring every gene set.
///
/// Trials run on a dedicated pool of `n_cpus` workers; `n_cpus <= 1` runs them one
/// after another. Trial `i` draws from its own RNG seeded with `seed + i`, so for a
/// fixed seed the resulting pools hold the same samples however the trials were
/// scheduled.
///
/// # Errors
///
/// The first failing trial aborts the batch with [`EnrichmentError::TrialFailed`];
/// no partially filled pools are returned. Exceeding the configured deadline aborts
/// with [`EnrichmentError::DeadlineExceeded`].
pub fn simulate_es_s_pi(
    table: &FeatureTable,
    gene_sets: &[GeneSet],
    phenotype: Option<&Phenotype>,
    metric: Metric,
    weight: f64,
    config: &PermutationConfig,
) -> Result<NullPools> {
    validate_weight(weight)?;
    config.validate()?;

    let p_iter = config.p_iter;
    let n_sets = gene_sets.len();
    let n_cpus = config.n_cpus.unwrap_or_else(|| metric.default_cpus()).max(1);
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());

    info!(
        "Calculating ES(S, pi) for {} gene sets ({} permutations, {} cpus)",
        n_sets, p_iter, n_cpus
    );

    let ctx = TrialContext {
        table,
        gene_sets,
        phenotype,
        metric,
        weight,
        seed,
        started: Instant::now(),
        deadline: config.deadline,
        progress: Progress::new(p_iter),
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_cpus)
        .thread_name(|i| format!("gsea-permutation-{}", i))
        .build()?;

    let mut pools = NullPools::with_capacity(n_sets, p_iter);

    if n_cpus == 1 {
        pool.install(|| -> Result<()> {
            for trial in 0..p_iter {
                pools.record_trial(ctx.run(trial)?);
            }
            Ok(())
        })?;
    } else {
        let merged = pool.install(|| {
            (0..p_iter)
                .into_par_iter()
                .try_fold(
                    || NullPools::with_capacity(n_sets, 0),
                    |mut partial, trial| -> Result<NullPools> {
                        partial.record_trial(ctx.run(trial)?);
                        Ok(partial)
                    },
                )
                .try_reduce(
                    || NullPools::with_capacity(n_sets, 0),
                    |a, b| Ok(a.merge(b)),
                )
        })?;
        pools = pools.merge(merged);
    }

    info!("Calculated ES(S, pi) in {:.2?}", ctx.started.elapsed());
    Ok(pools)
}
