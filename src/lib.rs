//! Exact symbolic differentiation of multivariate scalar functions.
//!
//! This crate represents real functions f: R^n -> R as immutable expression trees and
//! differentiates them exactly by structural recursion over the sum, product and chain
//! rules. Scalar functions compose into vector- and matrix-valued operators: gradients,
//! Jacobians and Hessians. Expressions can be built directly in the term algebra or parsed
//! from strings with the [evalexpr](https://github.com/ISibboI/evalexpr) crate.
//!
//! # Features
//!
//! - Nine chain-ruled elementary functions: power, sin, cos, tan, arcsin, arccos,
//!   arctan, exp and ln, each scaled and raised to a real power
//! - Gradient, Jacobian and Hessian operators assembled by composition
//! - Parallel batch evaluation with rayon
//! - Evaluation at `Vec<f64>`, arrays, and optionally nalgebra and ndarray vectors
//!
//! Differentiation never simplifies, so derivative trees grow with every order. The
//! [`opt::optimize`] pass removes neutral elements without changing any value.
//!
//! # Example
//!
//! ```rust
//! use symdiff::prelude::*;
//!
//! // f(x, y) = x^2 * y
//! let x = Term::coordinate(1).unwrap();
//! let y = Term::coordinate(2).unwrap();
//! let f = Functional::from(Term::product(Term::power(x, 2.0), y));
//!
//! // Gradient [2xy, x^2] at (3, 2)
//! let gradient = f.gradient().evaluate(&[3.0, 2.0]).unwrap();
//! assert_eq!(gradient.as_slice(), &[12.0, 9.0]);
//!
//! // Mixed partials are both 2x
//! let hessian = f.hessian().evaluate(&[3.0, 2.0]).unwrap();
//! assert_eq!(hessian.get(1, 2).unwrap(), 6.0);
//! assert_eq!(hessian.get(2, 1).unwrap(), 6.0);
//!
//! // The same function parsed from a string
//! let expr = Expression::new("x^2 * y".to_string()).unwrap();
//! assert_eq!(expr.gradient(&[3.0, 2.0]).unwrap(), vec![12.0, 9.0]);
//! ```

pub use expression::Expression;
pub use functional::Functional;
pub use term::{CompositeKind, Term};

pub mod prelude {
    pub use crate::backends::matrix::DenseMatrix;
    pub use crate::backends::point::Point;
    pub use crate::errors::{CalculusError, ConvertError, ExpressionError};
    pub use crate::expression::Expression;
    pub use crate::functional::{ConstantFunction, Functional, Polynomial, ScalarField};
    pub use crate::linalg::{Matrix, Vector};
    pub use crate::operator::{Gradient, Hessian, Jacobian, VectorOperator};
    pub use crate::opt::optimize;
    pub use crate::term::{CompositeKind, Term};
    pub use crate::traits::{Differentiable, Evaluable, VectorValued};
}

/// Interop traits for input points and output matrices
pub mod backends {
    pub mod matrix;
    pub mod point;
}
/// Conversion from parsed expressions to term trees
pub mod convert;
/// Error types for the various failure modes
pub mod errors;
/// High-level parsed expressions
pub mod expression;
/// Scalar functionals: polynomials, constants and term-backed fields
pub mod functional;
/// Dense 1-indexed vectors and matrices
pub mod linalg {
    pub mod matrix;
    pub mod vector;

    pub use matrix::Matrix;
    pub use vector::Vector;
}
/// Vector operators, Jacobians, gradients and Hessians
pub mod operator;
/// Value-preserving rewrite pass for term trees
pub mod opt;
/// The term algebra and its differentiation rules
pub mod term;
/// Capability contracts shared by terms, functionals and operators
pub mod traits;
