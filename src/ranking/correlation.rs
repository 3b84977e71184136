//! Pairwise correlation kernels used to rank features against a phenotype.
//!
//! The kernels take already-paired, finite observations. Dropping incomplete pairs and
//! enforcing [`MIN_PERIODS`] happens in the caller.

use statrs::statistics::{Data, OrderStatistics, RankTieBreaker, Statistics};

/// Minimum number of samples with both a quantification and a phenotype value needed
/// to produce a correlation score.
pub const MIN_PERIODS: usize = 5;

/// Pearson product-moment correlation.
///
/// Returns `None` when fewer than two observations are given or either side has zero
/// variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }

    let mean_x = x.mean();
    let mean_y = y.mean();

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&a, &b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }

    let r = cov / (var_x * var_y).sqrt();
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

/// Spearman rank correlation: Pearson correlation of the average ranks.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() {
        return None;
    }
    let rank_x = Data::new(x.to_vec()).ranks(RankTieBreaker::Average);
    let rank_y = Data::new(y.to_vec()).ranks(RankTieBreaker::Average);
    pearson(&rank_x, &rank_y)
}

/// Kendall's tau-b, which corrects for ties in either variable.
pub fn kendall(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }

    let mut concordant = 0usize;
    let mut discordant = 0usize;
    let mut ties_x = 0usize;
    let mut ties_y = 0usize;

    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i].partial_cmp(&x[j])?;
            let dy = y[i].partial_cmp(&y[j])?;
            match (dx.is_eq(), dy.is_eq()) {
                (true, true) => {}
                (true, false) => ties_x += 1,
                (false, true) => ties_y += 1,
                (false, false) if dx == dy => concordant += 1,
                (false, false) => discordant += 1,
            }
        }
    }

    let untied = (concordant + discordant) as f64;
    let denominator = ((untied + ties_x as f64) * (untied + ties_y as f64)).sqrt();
    if denominator <= 0.0 {
        return None;
    }

    Some((concordant as f64 - discordant as f64) / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pearson_perfect_linear() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 1.0, epsilon = 1e-12);

        let y_neg = [10.0, 8.0, 6.0, 4.0, 2.0];
        assert_relative_eq!(pearson(&x, &y_neg).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_known_value() {
        // r = 0.8 for this classic example
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        assert_relative_eq!(pearson(&x, &y).unwrap(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_variance_is_missing() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let flat = [3.0; 5];
        assert!(pearson(&x, &flat).is_none());
        assert!(spearman(&x, &flat).is_none());
        assert!(kendall(&x, &flat).is_none());
    }

    #[test]
    fn test_spearman_monotone_nonlinear() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y: Vec<f64> = x.iter().map(|v: &f64| v.powi(3)).collect();
        assert_relative_eq!(spearman(&x, &y).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_spearman_with_ties() {
        // ranks x: [1, 2.5, 2.5, 4, 5], ranks y: [1, 2, 3, 4, 5]
        let x = [1.0, 2.0, 2.0, 4.0, 5.0];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let rho = spearman(&x, &y).unwrap();
        assert_relative_eq!(rho, 0.9746794344808963, epsilon = 1e-12);
    }

    #[test]
    fn test_kendall_known_values() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 1.0, 4.0, 3.0, 5.0];
        // 8 concordant, 2 discordant pairs
        assert_relative_eq!(kendall(&x, &y).unwrap(), 0.6, epsilon = 1e-12);

        let reversed = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert_relative_eq!(kendall(&x, &reversed).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kendall_tau_b_ties() {
        // one tie in x: concordant = 9, discordant = 0, ties_x = 1
        let x = [1.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let expected = 9.0 / (9.0f64 * 10.0).sqrt();
        assert_relative_eq!(kendall(&x, &y).unwrap(), expected, epsilon = 1e-12);
    }
}
