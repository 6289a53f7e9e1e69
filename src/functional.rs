//! Scalar functionals f: R^n -> R.
//!
//! A [`Functional`] is a scalar function of `n` coordinates that can be evaluated at a
//! point and differentiated with respect to any single coordinate, producing another
//! `Functional`. Three representations are provided:
//!
//! - [`ConstantFunction`]: a single value; every partial derivative is zero
//! - [`Polynomial`]: a univariate polynomial in one coordinate x_k
//! - [`ScalarField`]: an arbitrary [`Term`] tree over the coordinates x_1..x_n
//!
//! The dimension `n` of a functional decides how many partials its gradient has.
//! Polynomials and constants default to the smallest dimension that contains their
//! coordinate and can be embedded into a larger space with `in_dimension`.

use itertools::Itertools;
use log::debug;

use crate::errors::CalculusError;
use crate::operator::{Gradient, Hessian};
use crate::opt;
use crate::term::{CompositeKind, Term};
use crate::traits::{Differentiable, Evaluable};

/// A constant function on R^n.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantFunction {
    scalar: f64,
    dimension: usize,
}

impl ConstantFunction {
    pub fn new(scalar: f64) -> Self {
        Self {
            scalar,
            dimension: 1,
        }
    }

    /// The zero function on R^1.
    pub fn zero() -> Self {
        Self::new(0.0)
    }

    /// Embeds the constant into R^n.
    pub fn in_dimension(self, dimension: usize) -> Result<Self, CalculusError> {
        check_dimension(dimension, 1)?;
        Ok(Self { dimension, ..self })
    }

    pub fn scalar(&self) -> f64 {
        self.scalar
    }
}

/// A polynomial `a_0 + a_1 x_k + ... + a_d x_k^d` in the single coordinate x_k.
///
/// # Example
/// ```
/// # use symdiff::prelude::*;
/// let f = Polynomial::new(vec![100.0, 20.0, 1.0], 1).unwrap();
/// assert_eq!(f.evaluate_scalar(4.0), 196.0);
///
/// let df = f.differentiate_wrt(1);
/// assert_eq!(df.evaluate(&[4.0]).unwrap(), 28.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    /// coefficients[i] is the coefficient of x_k^i
    coefficients: Vec<f64>,
    variable_index: usize,
    dimension: usize,
}

impl Polynomial {
    /// Creates a polynomial in the 1-based coordinate `variable_index`.
    ///
    /// # Errors
    /// Returns `CalculusError::Construction` if `coefficients` is empty or
    /// `variable_index` is zero.
    pub fn new(coefficients: Vec<f64>, variable_index: usize) -> Result<Self, CalculusError> {
        if coefficients.is_empty() {
            return Err(CalculusError::Construction(
                "polynomial needs at least a constant coefficient".to_string(),
            ));
        }
        if variable_index == 0 {
            return Err(CalculusError::Construction(
                "coordinate indices are 1-based".to_string(),
            ));
        }
        Ok(Self {
            coefficients,
            variable_index,
            dimension: variable_index,
        })
    }

    /// Embeds the polynomial into R^n, n >= variable index.
    pub fn in_dimension(self, dimension: usize) -> Result<Self, CalculusError> {
        check_dimension(dimension, self.variable_index)?;
        Ok(Self { dimension, ..self })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn variable_index(&self) -> usize {
        self.variable_index
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Evaluates the polynomial at the scalar `x`.
    pub fn evaluate_scalar(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, coefficient| acc * x + coefficient)
    }

    /// Expresses the polynomial in the term algebra as a sum of scaled powers.
    pub fn to_term(&self) -> Term {
        let x = Term::Coordinate(self.variable_index);
        self.coefficients
            .iter()
            .enumerate()
            .map(|(i, &coefficient)| match i {
                0 => Term::Constant(coefficient),
                _ => Term::composite(CompositeKind::General, coefficient, i as f64, x.clone()),
            })
            .reduce(Term::sum)
            .unwrap_or(Term::Constant(0.0))
    }
}

impl Evaluable for Polynomial {
    type Output = f64;

    /// # Errors
    /// Returns `CalculusError::IndexOutOfRange` if the point is shorter than the
    /// polynomial's variable index.
    fn evaluate_slice(&self, point: &[f64]) -> Result<f64, CalculusError> {
        let x = point
            .get(self.variable_index - 1)
            .ok_or(CalculusError::IndexOutOfRange {
                index: self.variable_index,
                len: point.len(),
            })?;
        Ok(self.evaluate_scalar(*x))
    }
}

impl Differentiable for Polynomial {
    type Derivative = Functional;

    fn differentiate_wrt(&self, k: usize) -> Functional {
        if k != self.variable_index || self.degree() == 0 {
            return Functional::zero(self.dimension);
        }

        let coefficients = self
            .coefficients
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, coefficient)| i as f64 * coefficient)
            .collect();

        Functional::Polynomial(Polynomial {
            coefficients,
            ..self.clone()
        })
    }
}

/// An arbitrary term tree viewed as a functional on R^n.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    term: Term,
    dimension: usize,
}

impl ScalarField {
    /// Wraps `term` as a functional on R^n.
    ///
    /// # Errors
    /// Returns `CalculusError::Construction` if the term references a coordinate
    /// beyond `dimension` or `dimension` is zero.
    pub fn new(term: Term, dimension: usize) -> Result<Self, CalculusError> {
        check_dimension(dimension, term.max_coordinate().max(1))?;
        Ok(Self { term, dimension })
    }

    /// Wraps `term` in the smallest space containing all of its coordinates.
    pub fn from_term(term: Term) -> Self {
        let dimension = term.max_coordinate().max(1);
        Self { term, dimension }
    }

    pub fn term(&self) -> &Term {
        &self.term
    }
}

impl Evaluable for ScalarField {
    type Output = f64;

    fn evaluate_slice(&self, point: &[f64]) -> Result<f64, CalculusError> {
        self.term.evaluate_slice(point)
    }
}

impl Differentiable for ScalarField {
    type Derivative = Functional;

    fn differentiate_wrt(&self, k: usize) -> Functional {
        Functional::Field(ScalarField {
            term: self.term.differentiate_wrt(k),
            dimension: self.dimension,
        })
    }
}

/// A scalar function R^n -> R that is differentiable with respect to every coordinate.
#[derive(Debug, Clone, PartialEq)]
pub enum Functional {
    Constant(ConstantFunction),
    Polynomial(Polynomial),
    Field(ScalarField),
}

impl Functional {
    /// The zero functional on R^n.
    pub fn zero(dimension: usize) -> Functional {
        Functional::Constant(ConstantFunction {
            scalar: 0.0,
            dimension: dimension.max(1),
        })
    }

    /// The number of input coordinates, n.
    pub fn dimension(&self) -> usize {
        match self {
            Functional::Constant(f) => f.dimension,
            Functional::Polynomial(f) => f.dimension,
            Functional::Field(f) => f.dimension,
        }
    }

    /// Expresses the functional as a term tree.
    pub fn to_term(&self) -> Term {
        match self {
            Functional::Constant(f) => Term::Constant(f.scalar),
            Functional::Polynomial(f) => f.to_term(),
            Functional::Field(f) => f.term.clone(),
        }
    }

    /// Builds the gradient `[df/dx_1, ..., df/dx_n]`.
    ///
    /// # Example
    /// ```
    /// # use symdiff::prelude::*;
    /// // f(x, y) = x^2 * y
    /// let x = Term::coordinate(1).unwrap();
    /// let y = Term::coordinate(2).unwrap();
    /// let f = Functional::from(Term::product(Term::power(x, 2.0), y));
    ///
    /// let gradient = f.gradient();
    /// let value = gradient.evaluate(&[3.0, 2.0]).unwrap();
    /// assert_eq!(value.as_slice(), &[12.0, 9.0]);
    /// ```
    pub fn gradient(&self) -> Gradient {
        debug!("building gradient over {} coordinates", self.dimension());
        Gradient::new(
            (1..=self.dimension())
                .map(|k| self.differentiate_wrt(k))
                .collect(),
        )
    }

    /// Builds the Hessian by differentiating the gradient.
    pub fn hessian(&self) -> Hessian {
        self.gradient().differentiate()
    }

    /// Applies the value-preserving rewrite pass to term-backed functionals.
    pub fn optimize(&self) -> Functional {
        match self {
            Functional::Field(f) => Functional::Field(ScalarField {
                term: opt::optimize(&f.term),
                dimension: f.dimension,
            }),
            _ => self.clone(),
        }
    }
}

impl Evaluable for Functional {
    type Output = f64;

    fn evaluate_slice(&self, point: &[f64]) -> Result<f64, CalculusError> {
        match self {
            Functional::Constant(f) => Ok(f.scalar),
            Functional::Polynomial(f) => f.evaluate_slice(point),
            Functional::Field(f) => f.evaluate_slice(point),
        }
    }
}

impl Differentiable for Functional {
    type Derivative = Functional;

    fn differentiate_wrt(&self, k: usize) -> Functional {
        match self {
            Functional::Constant(f) => Functional::zero(f.dimension),
            Functional::Polynomial(f) => f.differentiate_wrt(k),
            Functional::Field(f) => f.differentiate_wrt(k),
        }
    }
}

impl From<ConstantFunction> for Functional {
    fn from(f: ConstantFunction) -> Self {
        Functional::Constant(f)
    }
}

impl From<Polynomial> for Functional {
    fn from(f: Polynomial) -> Self {
        Functional::Polynomial(f)
    }
}

impl From<ScalarField> for Functional {
    fn from(f: ScalarField) -> Self {
        Functional::Field(f)
    }
}

impl From<Term> for Functional {
    fn from(term: Term) -> Self {
        Functional::Field(ScalarField::from_term(term))
    }
}

impl std::fmt::Display for Functional {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Functional::Constant(c) => write!(f, "{}", c.scalar),
            Functional::Polynomial(p) => {
                let x = format!("x{}", p.variable_index);
                let terms = p
                    .coefficients
                    .iter()
                    .enumerate()
                    .map(|(i, c)| match i {
                        0 => format!("{c}"),
                        1 => format!("{c}*{x}"),
                        _ => format!("{c}*{x}^{i}"),
                    })
                    .join(" + ");
                write!(f, "{terms}")
            }
            Functional::Field(s) => write!(f, "{}", s.term),
        }
    }
}

fn check_dimension(dimension: usize, minimum: usize) -> Result<(), CalculusError> {
    if dimension < minimum {
        return Err(CalculusError::Construction(format!(
            "dimension {dimension} cannot hold coordinate x{minimum}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::VectorValued;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_polynomial_evaluation() {
        let f = Polynomial::new(vec![100.0, 20.0, 1.0], 1).unwrap();
        assert_eq!(f.evaluate_scalar(4.0), 196.0);
        assert_eq!(f.evaluate(&[4.0]).unwrap(), 196.0);
        assert_eq!(f.degree(), 2);
    }

    #[test]
    fn test_polynomial_derivative() {
        let f = Polynomial::new(vec![100.0, 20.0, 1.0], 1).unwrap();
        let df = f.differentiate_wrt(1);

        let Functional::Polynomial(df) = df else {
            panic!("expected a polynomial derivative");
        };
        assert_eq!(df.coefficients(), &[20.0, 2.0]);
        assert_eq!(df.evaluate_scalar(4.0), 28.0);
    }

    #[test]
    fn test_polynomial_reads_its_own_coordinate() {
        let f = Polynomial::new(vec![0.0, 1.0], 2).unwrap();
        assert_eq!(f.evaluate(&[10.0, 3.0]).unwrap(), 3.0);
        assert_eq!(
            f.evaluate(&[10.0]),
            Err(CalculusError::IndexOutOfRange { index: 2, len: 1 })
        );
    }

    #[test]
    fn test_polynomial_zero_derivatives() {
        let f = Polynomial::new(vec![1.0, 2.0, 3.0], 2)
            .unwrap()
            .in_dimension(3)
            .unwrap();
        assert_eq!(f.differentiate_wrt(1), Functional::zero(3));
        assert_eq!(f.differentiate_wrt(3), Functional::zero(3));

        let constant = Polynomial::new(vec![5.0], 1).unwrap();
        assert_eq!(constant.differentiate_wrt(1), Functional::zero(1));
    }

    #[test]
    fn test_polynomial_construction_errors() {
        assert!(Polynomial::new(vec![], 1).is_err());
        assert!(Polynomial::new(vec![1.0], 0).is_err());
        assert!(Polynomial::new(vec![1.0], 3)
            .unwrap()
            .in_dimension(2)
            .is_err());
    }

    #[test]
    fn test_polynomial_as_term() {
        let f = Polynomial::new(vec![1.0, -2.0, 0.5, 3.0], 1).unwrap();
        let term = f.to_term();
        for x in [-2.0, -0.5, 0.0, 1.5, 3.0] {
            assert_abs_diff_eq!(
                term.evaluate(&[x]).unwrap(),
                f.evaluate_scalar(x),
                epsilon = 1e-12
            );
            assert_abs_diff_eq!(
                term.differentiate_wrt(1).evaluate(&[x]).unwrap(),
                f.differentiate_wrt(1).evaluate(&[x]).unwrap(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_constant_function() {
        let f = Functional::from(ConstantFunction::new(3.5).in_dimension(2).unwrap());
        assert_eq!(f.evaluate(&[1.0, 2.0]).unwrap(), 3.5);
        assert_eq!(f.differentiate_wrt(1), Functional::zero(2));
        assert_eq!(f.differentiate_wrt(9), Functional::zero(2));
        assert_eq!(ConstantFunction::zero().scalar(), 0.0);
    }

    #[test]
    fn test_scalar_field_dimension() {
        let term = Term::product(Term::Coordinate(1), Term::Coordinate(3));
        assert!(ScalarField::new(term.clone(), 2).is_err());

        let field = ScalarField::new(term.clone(), 4).unwrap();
        assert_eq!(Functional::from(field).gradient().width(), 4);
        assert_eq!(Functional::from(term).dimension(), 3);
        assert_eq!(Functional::from(Term::constant(2.0)).dimension(), 1);
    }

    #[test]
    fn test_gradient_of_polynomial() {
        let f = Functional::from(
            Polynomial::new(vec![0.0, 0.0, 1.0], 2)
                .unwrap()
                .in_dimension(2)
                .unwrap(),
        );
        let gradient = f.gradient();
        assert_eq!(gradient.evaluate(&[5.0, 3.0]).unwrap().as_slice(), &[0.0, 6.0]);
    }

    #[test]
    fn test_optimize_preserves_values() {
        let x = Term::Coordinate(1);
        let f = Functional::from(Term::product(Term::sin(x.clone()), Term::exp(x)));
        let df = f.differentiate_wrt(1).differentiate_wrt(1);
        let optimized = df.optimize();

        assert!(optimized.to_term().node_count() < df.to_term().node_count());
        assert_eq!(
            optimized.evaluate(&[0.4]).unwrap(),
            df.evaluate(&[0.4]).unwrap()
        );
    }

    #[test]
    fn test_display() {
        let p = Functional::from(Polynomial::new(vec![100.0, 20.0, 1.0], 1).unwrap());
        assert_eq!(format!("{p}"), "100 + 20*x1 + 1*x1^2");
        assert_eq!(format!("{}", Functional::zero(1)), "0");
    }
}
