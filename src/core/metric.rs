//! Pluggable importance measure for simplification.

use super::store::VertexId;

/// Evaluates the importance of an arc during simplification.
///
/// The simplifier treats the returned value exactly like normalized
/// persistence: features whose accumulated value stays at or below the
/// simplification threshold are removed. Implementations must be pure —
/// the same arc data always yields the same value — and non-negative.
///
/// A closure `Fn(f64, f64, &[VertexId]) -> f64` works directly:
///
/// ```rust
/// use reeb::core::metric::SimplificationMetric;
///
/// let span_only = |lower: f64, upper: f64, _interior: &[u64]| upper - lower;
/// assert_eq!(span_only.compute(1.0, 3.0, &[]), 2.0);
/// ```
pub trait SimplificationMetric {
    /// Importance of an arc spanning `[lower, upper]` whose interior holds
    /// the given mesh vertices, sorted by scalar value.
    fn compute(&self, lower: f64, upper: f64, interior: &[VertexId]) -> f64;
}

impl<F> SimplificationMetric for F
where
    F: Fn(f64, f64, &[VertexId]) -> f64,
{
    fn compute(&self, lower: f64, upper: f64, interior: &[VertexId]) -> f64 {
        self(lower, upper, interior)
    }
}
