//! Term module for representing differentiable scalar expressions.
//!
//! This module defines the expression tree that the whole crate is built on. The main
//! types are:
//!
//! - `Term`: A closed set of node variants (constants, coordinates, sums, products and
//!   chain-ruled elementary functions)
//! - `CompositeKind`: The elementary function applied by a `Composite` node
//!
//! A `Composite` node represents `scalar * g(inner)^power` where `g` is selected by its
//! kind. The one exception is `Exp`, which represents `scalar * e^(power * inner)`.
//!
//! # Symbolic Differentiation
//! `differentiate_wrt` builds a brand-new tree by structural recursion:
//! - Constant rule: d/dx(c) = 0
//! - Sum rule: d/dx(g + h) = g' + h'
//! - Product rule: d/dx(g * h) = g' * h + g * h'
//! - Chain rule: one case per `CompositeKind`, each with a power == 1 short-circuit
//!
//! No simplification is ever applied, so derivative trees grow with every
//! differentiation. Each product rule application copies both factors, which makes the
//! tree size grow combinatorially with the differentiation order for nested
//! products and composites. `crate::opt::optimize` can be invoked explicitly to shrink a
//! tree without changing its values.
//!
//! # Evaluation
//! Domain violations (logarithm of a non-positive number, arcsin outside [-1, 1],
//! division by zero inside a chain-rule denominator) are not errors: they produce NaN or
//! infinity exactly as the native floating point functions do.

use std::str::FromStr;

use log::trace;

use crate::errors::CalculusError;
use crate::traits::{Differentiable, Evaluable};

/// The elementary function applied by a `Composite` term.
///
/// The numeric tags are stable and can be recovered with `TryFrom<u8>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeKind {
    /// `s * h^p`
    General = 0,
    /// `s * sin(h)^p`
    Sin = 1,
    /// `s * cos(h)^p`
    Cos = 2,
    /// `s * tan(h)^p`
    Tan = 3,
    /// `s * arcsin(h)^p`
    Arcsin = 4,
    /// `s * arccos(h)^p`
    Arccos = 5,
    /// `s * arctan(h)^p`
    Arctan = 6,
    /// `s * e^(p * h)`
    Exp = 7,
    /// `s * ln(h)^p`
    Ln = 8,
}

impl CompositeKind {
    /// All kinds in tag order.
    pub const ALL: [CompositeKind; 9] = [
        CompositeKind::General,
        CompositeKind::Sin,
        CompositeKind::Cos,
        CompositeKind::Tan,
        CompositeKind::Arcsin,
        CompositeKind::Arccos,
        CompositeKind::Arctan,
        CompositeKind::Exp,
        CompositeKind::Ln,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CompositeKind::General => "general",
            CompositeKind::Sin => "sin",
            CompositeKind::Cos => "cos",
            CompositeKind::Tan => "tan",
            CompositeKind::Arcsin => "arcsin",
            CompositeKind::Arccos => "arccos",
            CompositeKind::Arctan => "arctan",
            CompositeKind::Exp => "exp",
            CompositeKind::Ln => "ln",
        }
    }

    /// Applies `scalar * g(value)^power` for this kind to an already evaluated inner value.
    pub fn apply(self, scalar: f64, power: f64, value: f64) -> f64 {
        match self {
            CompositeKind::General => scalar * value.powf(power),
            CompositeKind::Sin => scalar * value.sin().powf(power),
            CompositeKind::Cos => scalar * value.cos().powf(power),
            CompositeKind::Tan => scalar * value.tan().powf(power),
            CompositeKind::Arcsin => scalar * value.asin().powf(power),
            CompositeKind::Arccos => scalar * value.acos().powf(power),
            CompositeKind::Arctan => scalar * value.atan().powf(power),
            CompositeKind::Exp => scalar * (power * value).exp(),
            CompositeKind::Ln => scalar * value.ln().powf(power),
        }
    }
}

impl TryFrom<u8> for CompositeKind {
    type Error = CalculusError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        CompositeKind::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| CalculusError::InvalidVariant(format!("unknown tag {tag}")))
    }
}

impl FromStr for CompositeKind {
    type Err = CalculusError;

    /// Parses a kind from its name. The evalexpr spellings (`asin`, `acos`, `atan`,
    /// `log`) and their `math::` prefixed forms are accepted as aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("math::").unwrap_or(s);
        match name {
            "general" => Ok(CompositeKind::General),
            "sin" => Ok(CompositeKind::Sin),
            "cos" => Ok(CompositeKind::Cos),
            "tan" => Ok(CompositeKind::Tan),
            "arcsin" | "asin" => Ok(CompositeKind::Arcsin),
            "arccos" | "acos" => Ok(CompositeKind::Arccos),
            "arctan" | "atan" => Ok(CompositeKind::Arctan),
            "exp" => Ok(CompositeKind::Exp),
            "ln" | "log" => Ok(CompositeKind::Ln),
            _ => Err(CalculusError::InvalidVariant(s.to_string())),
        }
    }
}

impl std::fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable expression tree node representing a real scalar function of n
/// coordinates.
///
/// Children are exclusively owned by their parent and every differentiation builds new
/// nodes, so trees are acyclic by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A constant floating point value
    Constant(f64),
    /// The 1-based coordinate x_k of the evaluation point
    Coordinate(usize),
    /// Sum of two terms
    Sum(Box<Term>, Box<Term>),
    /// Product of two terms
    Product(Box<Term>, Box<Term>),
    /// An elementary function applied to an inner term, scaled and raised to a power
    Composite {
        kind: CompositeKind,
        scalar: f64,
        power: f64,
        inner: Box<Term>,
    },
}

impl Term {
    pub fn constant(value: f64) -> Term {
        Term::Constant(value)
    }

    /// The coordinate x_k.
    ///
    /// # Errors
    /// Returns `CalculusError::Construction` if `k` is zero; coordinates are 1-based.
    pub fn coordinate(k: usize) -> Result<Term, CalculusError> {
        if k == 0 {
            return Err(CalculusError::Construction(
                "coordinate indices are 1-based".to_string(),
            ));
        }
        Ok(Term::Coordinate(k))
    }

    pub fn sum(left: Term, right: Term) -> Term {
        Term::Sum(Box::new(left), Box::new(right))
    }

    pub fn product(left: Term, right: Term) -> Term {
        Term::Product(Box::new(left), Box::new(right))
    }

    /// `scalar * g(inner)^power` for the elementary function `g` selected by `kind`.
    pub fn composite(kind: CompositeKind, scalar: f64, power: f64, inner: Term) -> Term {
        Term::Composite {
            kind,
            scalar,
            power,
            inner: Box::new(inner),
        }
    }

    /// `inner^power`
    pub fn power(inner: Term, power: f64) -> Term {
        Term::composite(CompositeKind::General, 1.0, power, inner)
    }

    pub fn sin(inner: Term) -> Term {
        Term::composite(CompositeKind::Sin, 1.0, 1.0, inner)
    }

    pub fn cos(inner: Term) -> Term {
        Term::composite(CompositeKind::Cos, 1.0, 1.0, inner)
    }

    pub fn tan(inner: Term) -> Term {
        Term::composite(CompositeKind::Tan, 1.0, 1.0, inner)
    }

    pub fn arcsin(inner: Term) -> Term {
        Term::composite(CompositeKind::Arcsin, 1.0, 1.0, inner)
    }

    pub fn arccos(inner: Term) -> Term {
        Term::composite(CompositeKind::Arccos, 1.0, 1.0, inner)
    }

    pub fn arctan(inner: Term) -> Term {
        Term::composite(CompositeKind::Arctan, 1.0, 1.0, inner)
    }

    pub fn exp(inner: Term) -> Term {
        Term::composite(CompositeKind::Exp, 1.0, 1.0, inner)
    }

    pub fn ln(inner: Term) -> Term {
        Term::composite(CompositeKind::Ln, 1.0, 1.0, inner)
    }

    /// `-term`, expressed as `(-1) * term`.
    pub fn neg(term: Term) -> Term {
        Term::product(Term::Constant(-1.0), term)
    }

    /// `left - right`, expressed as `left + (-1) * right`.
    pub fn sub(left: Term, right: Term) -> Term {
        Term::sum(left, Term::neg(right))
    }

    /// `left / right`, expressed as `left * right^-1`.
    pub fn div(left: Term, right: Term) -> Term {
        Term::product(left, Term::power(right, -1.0))
    }

    /// Returns the number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        match self {
            Term::Constant(_) | Term::Coordinate(_) => 1,
            Term::Sum(left, right) | Term::Product(left, right) => {
                1 + left.node_count() + right.node_count()
            }
            Term::Composite { inner, .. } => 1 + inner.node_count(),
        }
    }

    /// Returns the highest coordinate index referenced by the tree, or 0 if the term is
    /// constant.
    pub fn max_coordinate(&self) -> usize {
        match self {
            Term::Constant(_) => 0,
            Term::Coordinate(k) => *k,
            Term::Sum(left, right) | Term::Product(left, right) => {
                left.max_coordinate().max(right.max_coordinate())
            }
            Term::Composite { inner, .. } => inner.max_coordinate(),
        }
    }

    /// Chain rule for `s * g(h)^p` with respect to x_k.
    fn differentiate_composite(
        kind: CompositeKind,
        scalar: f64,
        power: f64,
        inner: &Term,
        k: usize,
    ) -> Term {
        trace!("differentiating {kind} composite with power {power} wrt x{k}");

        let h = inner;
        let h_prime = h.differentiate_wrt(k);

        match kind {
            // d/dx(s h^p) = p s h^(p-1) h'
            CompositeKind::General => Term::product(
                Term::composite(CompositeKind::General, power * scalar, power - 1.0, h.clone()),
                h_prime,
            ),
            // d/dx(s sin^p h) = p s sin^(p-1)(h) cos(h) h'
            CompositeKind::Sin => {
                if power == 1.0 {
                    Term::product(
                        Term::composite(CompositeKind::Cos, scalar, 1.0, h.clone()),
                        h_prime,
                    )
                } else {
                    power_rule(kind, scalar, power, h, Term::cos(h.clone()), h_prime)
                }
            }
            // d/dx(s cos^p h) = -p s cos^(p-1)(h) sin(h) h'
            CompositeKind::Cos => {
                if power == 1.0 {
                    Term::product(
                        Term::composite(CompositeKind::Sin, -scalar, 1.0, h.clone()),
                        h_prime,
                    )
                } else {
                    power_rule(kind, -scalar, power, h, Term::sin(h.clone()), h_prime)
                }
            }
            // d/dx(s tan^p h) = p s tan^(p-1)(h) h' / cos^2(h)
            CompositeKind::Tan => {
                if power == 1.0 {
                    Term::product(
                        Term::composite(CompositeKind::Cos, scalar, -2.0, h.clone()),
                        h_prime,
                    )
                } else {
                    let sec_squared = Term::composite(CompositeKind::Cos, 1.0, -2.0, h.clone());
                    power_rule(kind, scalar, power, h, sec_squared, h_prime)
                }
            }
            // d/dx(s arcsin^p h) = p s arcsin^(p-1)(h) h' / sqrt(1 - h^2)
            CompositeKind::Arcsin => {
                arc_rule(kind, scalar, power, h, inverse_sqrt_one_minus_square, h_prime)
            }
            // d/dx(s arccos^p h) = -p s arccos^(p-1)(h) h' / sqrt(1 - h^2)
            CompositeKind::Arccos => {
                arc_rule(kind, -scalar, power, h, inverse_sqrt_one_minus_square, h_prime)
            }
            // d/dx(s arctan^p h) = p s arctan^(p-1)(h) h' / (1 + h^2)
            CompositeKind::Arctan => {
                arc_rule(kind, scalar, power, h, inverse_one_plus_square, h_prime)
            }
            // d/dx(s e^(p h)) = s p e^(p h) h'
            CompositeKind::Exp => Term::product(
                Term::composite(CompositeKind::Exp, scalar * power, power, h.clone()),
                h_prime,
            ),
            // d/dx(s ln^p h) = p s ln^(p-1)(h) h' / h
            CompositeKind::Ln => {
                if power == 1.0 {
                    Term::product(
                        Term::composite(CompositeKind::General, scalar, -1.0, h.clone()),
                        h_prime,
                    )
                } else {
                    let reciprocal = Term::composite(CompositeKind::General, 1.0, -1.0, h.clone());
                    power_rule(kind, scalar, power, h, reciprocal, h_prime)
                }
            }
        }
    }
}

/// `(p s g^(p-1)(h) * factor) * h'`
fn power_rule(
    kind: CompositeKind,
    scalar: f64,
    power: f64,
    h: &Term,
    factor: Term,
    h_prime: Term,
) -> Term {
    let lowered = Term::composite(kind, power * scalar, power - 1.0, h.clone());
    Term::product(Term::product(lowered, factor), h_prime)
}

/// Shared shape of the inverse trigonometric rules, whose derivative is
/// `s * denominator(h)^-1 * h'` at power 1.
fn arc_rule(
    kind: CompositeKind,
    scalar: f64,
    power: f64,
    h: &Term,
    denominator: fn(f64, &Term) -> Term,
    h_prime: Term,
) -> Term {
    if power == 1.0 {
        Term::product(denominator(scalar, h), h_prime)
    } else {
        power_rule(kind, scalar, power, h, denominator(1.0, h), h_prime)
    }
}

/// `scalar * (1 - h^2)^(-1/2)`
fn inverse_sqrt_one_minus_square(scalar: f64, h: &Term) -> Term {
    let one_minus_square = Term::sum(
        Term::Constant(1.0),
        Term::composite(CompositeKind::General, -1.0, 2.0, h.clone()),
    );
    Term::composite(CompositeKind::General, scalar, -0.5, one_minus_square)
}

/// `scalar * (1 + h^2)^-1`
fn inverse_one_plus_square(scalar: f64, h: &Term) -> Term {
    let one_plus_square = Term::sum(
        Term::Constant(1.0),
        Term::composite(CompositeKind::General, 1.0, 2.0, h.clone()),
    );
    Term::composite(CompositeKind::General, scalar, -1.0, one_plus_square)
}

impl Evaluable for Term {
    type Output = f64;

    fn evaluate_slice(&self, point: &[f64]) -> Result<f64, CalculusError> {
        match self {
            Term::Constant(value) => Ok(*value),
            Term::Coordinate(k) => k
                .checked_sub(1)
                .and_then(|i| point.get(i))
                .copied()
                .ok_or(CalculusError::IndexOutOfRange {
                    index: *k,
                    len: point.len(),
                }),
            Term::Sum(left, right) => Ok(left.evaluate_slice(point)? + right.evaluate_slice(point)?),
            Term::Product(left, right) => {
                Ok(left.evaluate_slice(point)? * right.evaluate_slice(point)?)
            }
            Term::Composite {
                kind,
                scalar,
                power,
                inner,
            } => Ok(kind.apply(*scalar, *power, inner.evaluate_slice(point)?)),
        }
    }
}

impl Differentiable for Term {
    type Derivative = Term;

    /// Computes the symbolic partial derivative with respect to x_k.
    ///
    /// # Example
    /// ```
    /// # use symdiff::prelude::*;
    /// // f(x) = sin(x), f'(0) = cos(0) = 1
    /// let f = Term::sin(Term::coordinate(1).unwrap());
    /// assert_eq!(f.differentiate_wrt(1).evaluate(&[0.0]).unwrap(), 1.0);
    /// ```
    fn differentiate_wrt(&self, k: usize) -> Term {
        match self {
            Term::Constant(_) => Term::Constant(0.0),

            Term::Coordinate(j) => Term::Constant(if *j == k { 1.0 } else { 0.0 }),

            // d/dx(g + h) = g' + h'
            Term::Sum(left, right) => {
                Term::sum(left.differentiate_wrt(k), right.differentiate_wrt(k))
            }

            // d/dx(g * h) = g' * h + g * h'
            Term::Product(left, right) => Term::sum(
                Term::Product(Box::new(left.differentiate_wrt(k)), right.clone()),
                Term::Product(left.clone(), Box::new(right.differentiate_wrt(k))),
            ),

            Term::Composite {
                kind,
                scalar,
                power,
                inner,
            } => Term::differentiate_composite(*kind, *scalar, *power, inner, k),
        }
    }
}

/// Renders the term in infix notation. Coordinates are printed as `x1`, `x2`, ...
/// A unit scalar and a unit power are omitted.
impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Constant(value) => write!(f, "{value}"),
            Term::Coordinate(k) => write!(f, "x{k}"),
            Term::Sum(left, right) => write!(f, "({left} + {right})"),
            Term::Product(left, right) => write!(f, "({left} * {right})"),
            Term::Composite {
                kind,
                scalar,
                power,
                inner,
            } => {
                if *scalar != 1.0 {
                    write!(f, "{scalar}*")?;
                }
                match kind {
                    CompositeKind::General => write!(f, "({inner})")?,
                    CompositeKind::Exp if *power == 1.0 => return write!(f, "exp({inner})"),
                    CompositeKind::Exp => return write!(f, "exp({power}*{inner})"),
                    _ => write!(f, "{kind}({inner})")?,
                }
                if *power != 1.0 {
                    write!(f, "^{power}")?;
                }
                Ok(())
            }
        }
    }
}
