//! Capability contracts shared by terms, functionals and operators.
//!
//! Instead of one interface per mathematical object, everything in this crate is
//! described by three small contracts:
//!
//! - `Evaluable`: maps a point of R^n to an output (a scalar, a [`Vector`] or a [`Matrix`])
//! - `Differentiable`: produces a brand-new object for a partial derivative
//! - `VectorValued`: an ordered collection of functionals evaluated componentwise
//!
//! Gradients, Jacobians and Hessians are built by composing these rather than by
//! re-declaring parallel hierarchies.
//!
//! [`Matrix`]: crate::linalg::Matrix

use rayon::prelude::*;

use crate::backends::point::Point;
use crate::errors::CalculusError;
use crate::functional::Functional;
use crate::linalg::Vector;

/// Evaluation at a point of R^n.
///
/// Coordinate `k` (1-based) is read from position `k - 1` of the point's slice.
pub trait Evaluable {
    type Output;

    /// Evaluates at a point given as a raw slice.
    fn evaluate_slice(&self, point: &[f64]) -> Result<Self::Output, CalculusError>;

    /// Evaluates at any [`Point`] type.
    ///
    /// Points without a contiguous slice view are rejected with
    /// [`CalculusError::Construction`].
    fn evaluate<P: Point + ?Sized>(&self, point: &P) -> Result<Self::Output, CalculusError>
    where
        Self: Sized,
    {
        self.evaluate_slice(point.try_as_slice()?)
    }

    /// Evaluates a batch of points in parallel.
    ///
    /// Results are returned in the same order as `points`. The first error encountered
    /// aborts the batch.
    ///
    /// # Example
    /// ```
    /// # use symdiff::prelude::*;
    /// let f = Polynomial::new(vec![0.0, 0.0, 1.0], 1).unwrap();
    /// let values = f.evaluate_parallel(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
    /// assert_eq!(values, vec![1.0, 4.0, 9.0]);
    /// ```
    fn evaluate_parallel(&self, points: &[Vec<f64>]) -> Result<Vec<Self::Output>, CalculusError>
    where
        Self: Sync,
        Self::Output: Send,
    {
        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8);
        let chunk_size = (points.len() / (num_threads * 4)).max(1);

        points
            .par_chunks(chunk_size)
            .map(|chunk| {
                chunk
                    .iter()
                    .map(|point| self.evaluate_slice(point))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|chunks| chunks.into_iter().flatten().collect())
    }
}

/// Exact partial differentiation.
///
/// Every call returns a fresh object; the receiver is never modified and no
/// simplification is applied.
pub trait Differentiable {
    type Derivative;

    /// Returns the partial derivative with respect to the 1-based coordinate `k`.
    fn differentiate_wrt(&self, k: usize) -> Self::Derivative;
}

/// An ordered collection of functionals jointly defining a map R^n -> R^m.
pub trait VectorValued: Evaluable<Output = Vector> {
    /// The component functionals in output order.
    fn components(&self) -> &[Functional];

    /// Number of outputs, m.
    fn width(&self) -> usize {
        self.components().len()
    }
}
