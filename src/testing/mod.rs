//! Significance of enrichment scores: empirical distributions, NES normalization and
//! p-/q-value estimation from permutation null pools.

pub mod distribution;
pub mod significance;

pub use distribution::EmpiricalDistribution;
pub use significance::{NesDistribution, SignificanceRecord, estimate_pq};
