use num_traits::Float;
use serde::Serialize;

/// Empirical distribution over a finite sample.
///
/// Non-finite values are dropped on construction and the remaining values are kept
/// sorted ascending, so every query is a binary search.
///
/// # Example
/// ```
/// use single_gsea::testing::EmpiricalDistribution;
///
/// let dist = EmpiricalDistribution::new(&[1.0, 2.0, 3.0, 4.0, 5.0]);
/// assert_eq!(dist.cdf(3.0), Some(0.4));
/// assert_eq!(dist.sf(3.0), Some(0.4));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmpiricalDistribution<T> {
    sorted: Vec<T>,
}

impl<T: Float> EmpiricalDistribution<T> {
    pub fn new(values: &[T]) -> Self {
        let mut sorted: Vec<T> = values.iter().copied().filter(|v| v.is_finite()).collect();
        // no NaN left, partial_cmp is total here
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        EmpiricalDistribution { sorted }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.sorted
    }

    /// Uniform mass 1/n, independent of `x`.
    pub fn pdf(&self, _x: T) -> Option<T> {
        let n = self.n()?;
        Some(T::one() / n)
    }

    /// Fraction of values strictly below `x`.
    pub fn cdf(&self, x: T) -> Option<T> {
        let n = self.n()?;
        let below = self.sorted.partition_point(|&v| v < x);
        T::from(below).map(|below| below / n)
    }

    /// One minus the fraction of values at or below `x`.
    pub fn sf(&self, x: T) -> Option<T> {
        let n = self.n()?;
        let at_or_below = self.sorted.partition_point(|&v| v <= x);
        T::from(at_or_below).map(|count| T::one() - count / n)
    }

    fn n(&self) -> Option<T> {
        if self.sorted.is_empty() {
            None
        } else {
            T::from(self.sorted.len())
        }
    }
}

impl<T: Float> FromIterator<T> for EmpiricalDistribution<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let values: Vec<T> = iter.into_iter().collect();
        EmpiricalDistribution::new(&values)
    }
}
