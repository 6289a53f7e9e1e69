//! Vector- and matrix-valued differential operators.
//!
//! Operators are assembled by composition:
//!
//! - [`VectorOperator`]: ordered functionals `[f_1, ..., f_m]`, evaluates to a [`Vector`]
//! - [`Jacobian`]: ordered `VectorOperator` rows, evaluates to a [`Matrix`]
//! - [`Gradient`]: the operator `[df/dx_1, ..., df/dx_n]` of one functional
//! - [`Hessian`]: the Jacobian obtained by differentiating a gradient
//!
//! Positions are assigned in insertion order and never reordered. No simplification is
//! applied while composing, so every level of differentiation grows the underlying term
//! trees; see [`crate::opt::optimize`] for an explicit clean-up pass.

use colored::Colorize;
use log::debug;

use crate::backends::matrix::DenseMatrix;
use crate::backends::point::Point;
use crate::errors::CalculusError;
use crate::functional::Functional;
use crate::linalg::{Matrix, Vector};
use crate::traits::{Differentiable, Evaluable, VectorValued};

/// An ordered collection of functionals defining a map R^n -> R^m.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorOperator {
    components: Vec<Functional>,
}

impl VectorOperator {
    pub fn new(components: Vec<Functional>) -> Self {
        Self { components }
    }

    /// The input dimension n, the largest dimension among the components.
    pub fn dimension(&self) -> usize {
        self.components
            .iter()
            .map(Functional::dimension)
            .max()
            .unwrap_or(0)
    }

    /// Builds the Jacobian, one row of partials per component.
    ///
    /// Row `i` holds `[df_i/dx_1, ..., df_i/dx_n]` where n is [`Self::dimension`].
    pub fn jacobian(&self) -> Jacobian {
        let n = self.dimension();
        debug!(
            "assembling {}x{} jacobian from vector operator",
            self.components.len(),
            n
        );
        let rows = self
            .components
            .iter()
            .map(|f| VectorOperator::new((1..=n).map(|k| f.differentiate_wrt(k)).collect()))
            .collect();
        Jacobian::new(rows)
    }

    /// Applies the value-preserving rewrite pass to every component.
    pub fn optimize(&self) -> VectorOperator {
        VectorOperator::new(self.components.iter().map(Functional::optimize).collect())
    }
}

impl Evaluable for VectorOperator {
    type Output = Vector;

    /// # Errors
    /// Returns `CalculusError::Construction` if the operator has no components, or the
    /// first error raised by a component.
    fn evaluate_slice(&self, point: &[f64]) -> Result<Vector, CalculusError> {
        let values = self
            .components
            .iter()
            .map(|f| f.evaluate_slice(point))
            .collect::<Result<Vec<_>, _>>()?;
        Vector::new(values)
    }
}

impl Differentiable for VectorOperator {
    type Derivative = VectorOperator;

    /// Componentwise partial derivative `[df_1/dx_k, ..., df_m/dx_k]`.
    fn differentiate_wrt(&self, k: usize) -> VectorOperator {
        VectorOperator::new(
            self.components
                .iter()
                .map(|f| f.differentiate_wrt(k))
                .collect(),
        )
    }
}

impl VectorValued for VectorOperator {
    fn components(&self) -> &[Functional] {
        &self.components
    }
}

impl FromIterator<Functional> for VectorOperator {
    fn from_iter<I: IntoIterator<Item = Functional>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl std::fmt::Display for VectorOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{\n")?;
        for (i, component) in self.components.iter().enumerate() {
            writeln!(f, "    {}: {}\n", format!("f{}", i + 1).cyan(), component)?;
        }
        writeln!(f, "}}")?;
        Ok(())
    }
}

/// An ordered collection of `VectorOperator` rows, evaluating to a matrix.
///
/// Row widths are not checked at construction. They are checked on every evaluation,
/// since the width of a row is only known once its components have produced values.
#[derive(Debug, Clone, PartialEq)]
pub struct Jacobian {
    rows: Vec<VectorOperator>,
}

impl Jacobian {
    pub fn new(rows: Vec<VectorOperator>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[VectorOperator] {
        &self.rows
    }

    /// Evaluates into any dense matrix backend.
    ///
    /// # Example
    /// ```
    /// # use symdiff::prelude::*;
    /// let x = Term::coordinate(1).unwrap();
    /// let y = Term::coordinate(2).unwrap();
    /// let op = VectorOperator::new(vec![
    ///     Functional::from(Term::product(x.clone(), y.clone())),
    ///     Functional::from(Term::sum(x, y)),
    /// ]);
    ///
    /// let rows: Vec<Vec<f64>> = op.jacobian().evaluate_as(&[2.0, 5.0]).unwrap();
    /// assert_eq!(rows, vec![vec![5.0, 2.0], vec![1.0, 1.0]]);
    /// ```
    pub fn evaluate_as<M, P>(&self, point: &P) -> Result<M, CalculusError>
    where
        M: DenseMatrix,
        P: Point + ?Sized,
    {
        Ok(M::from_matrix(&self.evaluate(point)?))
    }

    /// Applies the value-preserving rewrite pass to every entry.
    pub fn optimize(&self) -> Jacobian {
        Jacobian::new(self.rows.iter().map(VectorOperator::optimize).collect())
    }
}

impl Evaluable for Jacobian {
    type Output = Matrix;

    /// # Errors
    /// Returns `CalculusError::DimensionMismatch` if the rows evaluate to vectors of
    /// different lengths, and `CalculusError::Construction` if there are no rows.
    fn evaluate_slice(&self, point: &[f64]) -> Result<Matrix, CalculusError> {
        let rows = self
            .rows
            .iter()
            .map(|row| row.evaluate_slice(point))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(first) = rows.first() {
            let expected = first.len();
            if let Some(row) = rows.iter().find(|row| row.len() != expected) {
                return Err(CalculusError::DimensionMismatch {
                    expected,
                    got: row.len(),
                });
            }
        }
        Matrix::from_rows(rows)
    }
}

impl std::fmt::Display for Jacobian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{\n")?;
        for (i, row) in self.rows.iter().enumerate() {
            for (j, entry) in row.components().iter().enumerate() {
                writeln!(
                    f,
                    "    {}: {}\n",
                    format!("[{},{}]", i + 1, j + 1).cyan(),
                    entry
                )?;
            }
        }
        writeln!(f, "}}")?;
        Ok(())
    }
}

/// The first partials `[df/dx_1, ..., df/dx_n]` of one functional.
///
/// Usually obtained through [`Functional::gradient`].
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    operator: VectorOperator,
}

impl Gradient {
    /// Wraps the partials of one functional, ordered by coordinate.
    pub fn new(partials: Vec<Functional>) -> Self {
        Self {
            operator: VectorOperator::new(partials),
        }
    }

    pub fn as_operator(&self) -> &VectorOperator {
        &self.operator
    }

    /// Differentiates every partial again, giving the Hessian.
    ///
    /// Row `i` holds the partials `d/dx_i` of every gradient component, so
    /// `hessian[i][j] = d/dx_i (df/dx_j)`.
    pub fn differentiate(&self) -> Hessian {
        let n = self.width();
        debug!("assembling {n}x{n} hessian from gradient");
        let rows = (1..=n)
            .map(|i| self.operator.differentiate_wrt(i))
            .collect();
        Hessian {
            jacobian: Jacobian::new(rows),
        }
    }
}

impl Evaluable for Gradient {
    type Output = Vector;

    fn evaluate_slice(&self, point: &[f64]) -> Result<Vector, CalculusError> {
        self.operator.evaluate_slice(point)
    }
}

impl VectorValued for Gradient {
    fn components(&self) -> &[Functional] {
        self.operator.components()
    }
}

impl std::fmt::Display for Gradient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{\n")?;
        for (i, partial) in self.components().iter().enumerate() {
            writeln!(f, "    {}: {}\n", format!("d/dx{}", i + 1).cyan(), partial)?;
        }
        writeln!(f, "}}")?;
        Ok(())
    }
}

/// The matrix of second partials of one functional.
///
/// Only produced by [`Gradient::differentiate`]; rows and evaluation are delegated to the
/// underlying [`Jacobian`].
#[derive(Debug, Clone, PartialEq)]
pub struct Hessian {
    jacobian: Jacobian,
}

impl Hessian {
    pub fn rows(&self) -> &[VectorOperator] {
        self.jacobian.rows()
    }

    pub fn as_jacobian(&self) -> &Jacobian {
        &self.jacobian
    }

    /// Evaluates into any dense matrix backend.
    pub fn evaluate_as<M, P>(&self, point: &P) -> Result<M, CalculusError>
    where
        M: DenseMatrix,
        P: Point + ?Sized,
    {
        self.jacobian.evaluate_as(point)
    }

    /// Applies the value-preserving rewrite pass to every entry.
    pub fn optimize(&self) -> Hessian {
        Hessian {
            jacobian: self.jacobian.optimize(),
        }
    }
}

impl Evaluable for Hessian {
    type Output = Matrix;

    fn evaluate_slice(&self, point: &[f64]) -> Result<Matrix, CalculusError> {
        self.jacobian.evaluate_slice(point)
    }
}

impl std::fmt::Display for Hessian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.jacobian)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functional::{ConstantFunction, Polynomial};
    use crate::term::Term;
    use approx::assert_abs_diff_eq;

    fn x(k: usize) -> Term {
        Term::coordinate(k).unwrap()
    }

    /// f(x, y) = x^2 * y
    fn x_squared_y() -> Functional {
        Functional::from(Term::product(Term::power(x(1), 2.0), x(2)))
    }

    #[test]
    fn test_evaluation_preserves_order() {
        let op = VectorOperator::new(vec![
            Functional::from(ConstantFunction::new(7.0)),
            Functional::from(Polynomial::new(vec![0.0, 0.0, 1.0], 1).unwrap()),
            Functional::from(Term::product(x(1), x(2))),
        ]);
        let value = op.evaluate(&[3.0, 4.0]).unwrap();
        assert_eq!(value.as_slice(), &[7.0, 9.0, 12.0]);
        assert_eq!(op.width(), 3);
        assert_eq!(op.dimension(), 2);
    }

    #[test]
    fn test_empty_operator() {
        let op = VectorOperator::new(vec![]);
        assert!(matches!(
            op.evaluate(&[1.0]),
            Err(CalculusError::Construction(_))
        ));
    }

    #[test]
    fn test_gradient() {
        let gradient = x_squared_y().gradient();
        assert_eq!(gradient.width(), 2);

        let value = gradient.evaluate(&[3.0, 2.0]).unwrap();
        assert_eq!(value.as_slice(), &[12.0, 9.0]);
    }

    #[test]
    fn test_hessian_mixed_partials() {
        let hessian = x_squared_y().hessian();
        assert_eq!(hessian.rows().len(), 2);

        for (a, b) in [(1.0, 2.0), (-3.0, 0.5), (0.25, -4.0)] {
            let m = hessian.evaluate(&[a, b]).unwrap();
            assert_abs_diff_eq!(m.get(1, 2).unwrap(), 2.0 * a);
            assert_abs_diff_eq!(m.get(2, 1).unwrap(), 2.0 * a);
            assert_abs_diff_eq!(m.get(1, 1).unwrap(), 2.0 * b);
            assert_abs_diff_eq!(m.get(2, 2).unwrap(), 0.0);
        }
    }

    #[test]
    fn test_hessian_row_order() {
        // f(x, y) = sin(x) * y^3
        let f = Functional::from(Term::product(Term::sin(x(1)), Term::power(x(2), 3.0)));
        let m = f.hessian().evaluate(&[0.3, 2.0]).unwrap();

        assert_abs_diff_eq!(m.get(1, 1).unwrap(), -(0.3f64).sin() * 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.get(1, 2).unwrap(), (0.3f64).cos() * 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.get(2, 1).unwrap(), (0.3f64).cos() * 12.0, epsilon = 1e-12);
        assert_abs_diff_eq!(m.get(2, 2).unwrap(), (0.3f64).sin() * 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobian_of_operator() {
        let op = VectorOperator::new(vec![
            Functional::from(Term::product(x(1), x(2))),
            Functional::from(Term::exp(x(1))),
        ]);
        let m = op.jacobian().evaluate(&[0.0, 3.0]).unwrap();
        assert_eq!(m.dims(), (2, 2));
        assert_eq!(m.row(1).unwrap().as_slice(), &[3.0, 0.0]);
        assert_eq!(m.row(2).unwrap().as_slice(), &[1.0, 0.0]);
    }

    #[test]
    fn test_jacobian_width_mismatch_on_evaluate() {
        let narrow = VectorOperator::new(vec![Functional::zero(1), Functional::zero(1)]);
        let wide = VectorOperator::new(vec![
            Functional::zero(1),
            Functional::zero(1),
            Functional::zero(1),
        ]);

        // construction succeeds
        let jacobian = Jacobian::new(vec![narrow, wide]);
        assert_eq!(
            jacobian.evaluate(&[1.0]),
            Err(CalculusError::DimensionMismatch {
                expected: 2,
                got: 3
            })
        );
    }

    #[test]
    fn test_empty_jacobian() {
        assert!(matches!(
            Jacobian::new(vec![]).evaluate(&[1.0]),
            Err(CalculusError::Construction(_))
        ));
    }

    #[test]
    fn test_evaluate_parallel() {
        let gradient = x_squared_y().gradient();
        let points: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64, 2.0]).collect();

        let values = gradient.evaluate_parallel(&points).unwrap();
        assert_eq!(values.len(), 100);
        for (point, value) in points.iter().zip(&values) {
            assert_eq!(value.as_slice(), &[4.0 * point[0], point[0] * point[0]]);
        }

        let short = vec![vec![1.0, 2.0], vec![1.0]];
        assert!(gradient.evaluate_parallel(&short).is_err());
    }

    #[test]
    fn test_evaluate_as_backends() {
        let hessian = x_squared_y().hessian();
        let rows: Vec<Vec<f64>> = hessian.evaluate_as(&[1.0, 2.0]).unwrap();
        assert_eq!(rows, vec![vec![4.0, 2.0], vec![2.0, 0.0]]);

        let m: Matrix = hessian.evaluate_as(&vec![1.0, 2.0]).unwrap();
        assert_eq!(m.to_rows(), rows);
    }

    #[cfg(feature = "nalgebra")]
    #[test]
    fn test_evaluate_as_nalgebra() {
        let hessian = x_squared_y().hessian();
        let point = nalgebra::DVector::from_vec(vec![1.0, 2.0]);
        let m: nalgebra::DMatrix<f64> = hessian.evaluate_as(&point).unwrap();
        assert_eq!(m[(0, 1)], 2.0);
    }

    #[test]
    fn test_optimized_hessian_matches() {
        let hessian = x_squared_y().hessian();
        let optimized = hessian.optimize();
        assert_eq!(
            optimized.evaluate(&[1.5, -2.0]).unwrap(),
            hessian.evaluate(&[1.5, -2.0]).unwrap()
        );
    }

    #[test]
    fn test_core_types_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Term>();
        assert_send_sync::<Functional>();
        assert_send_sync::<crate::expression::Expression>();
        assert_send_sync::<VectorOperator>();
        assert_send_sync::<Jacobian>();
        assert_send_sync::<Gradient>();
        assert_send_sync::<Hessian>();
    }

    #[test]
    fn test_shared_functional_across_threads() {
        let f = x_squared_y();
        let expected = f.gradient().evaluate(&[1.5, -2.0]).unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| f.gradient().evaluate(&[1.5, -2.0]).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn test_display() {
        let rendered = format!("{}", x_squared_y().gradient());
        assert!(rendered.contains("d/dx1"));
        assert!(rendered.contains("d/dx2"));
    }
}
