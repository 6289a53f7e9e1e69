//! Error types for the symdiff crate.
//!
//! This module defines the error types that can occur while building, evaluating and
//! differentiating expressions. The main error types are:
//!
//! - `CalculusError`: Errors raised by the term algebra, the functionals, the vector and
//!   matrix operators and the numeric containers they evaluate into
//! - `ConvertError`: Errors during conversion from an evalexpr AST to a `Term`
//! - `ExpressionError`: High-level errors when working with parsed expressions
//!
//! Floating-point domain violations (for example the logarithm of a negative number) are
//! not errors. They propagate as NaN or infinity through every dependent evaluation.

use evalexpr::{DefaultNumericTypes, EvalexprError};
use thiserror::Error;

/// Errors raised by the core differentiation engine and its numeric containers.
///
/// Every fallible operation fails atomically: nothing is mutated when one of these
/// is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculusError {
    /// Error when a vector, matrix, term or functional is built from invalid parts,
    /// e.g. a zero-length vector, ragged matrix rows or a zero coordinate index
    #[error("construction error: {0}")]
    Construction(String),
    /// Error when two operands or the rows of a Jacobian have incompatible sizes
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    /// Error when a 1-based index lies outside `[1, len]`
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    /// Error when an unknown composite kind tag or name is dispatched on
    #[error("invalid composite kind: {0}")]
    InvalidVariant(String),
}

/// Errors that can occur during conversion from evalexpr AST to a `Term`.
///
/// The term algebra only knows constants, sums, products and chain-ruled elementary
/// functions, so every other evalexpr construct is rejected here.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Error when the exponent of `^` is not a numeric constant
    #[error("Could not convert exponent in Exp operator: {0}")]
    ExpOperator(String),
    /// Error when encountering an operator that has no counterpart in the term algebra
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),
    /// Error when encountering a function that has no counterpart in the term algebra
    #[error("Unsupported function: {0}")]
    UnsupportedFunction(String),
    /// Error when the root node does not have exactly one child
    #[error("Expected single child for root node: {0}")]
    RootNode(String),
    /// Error when a constant value is not a number
    #[error("Expected numeric constant: {0}")]
    ConstOperator(String),
    /// Error when a variable is not found in the variable map
    #[error("Variable not found: {0}")]
    VariableNotFound(String),
}

/// High-level errors that can occur when working with parsed expressions.
///
/// This enum wraps the lower-level errors from parsing, conversion and the
/// differentiation engine.
#[derive(Debug, Error)]
pub enum ExpressionError {
    /// Error when parsing the initial expression string with evalexpr
    #[error("Failed to build Evalexpr AST")]
    BuildEvalexprError(#[from] EvalexprError<DefaultNumericTypes>),
    /// Error when converting from evalexpr AST to a term tree
    #[error("Failed to build term tree")]
    BuildTermError(#[from] ConvertError),
    /// Error raised by the differentiation engine
    #[error("Calculus error")]
    CalculusError(#[from] CalculusError),
    /// Error when the input length is not the same as the number of variables
    #[error("Invalid input length: expected {expected}, got {got}")]
    InvalidInputLength { expected: usize, got: usize },
    /// Error when a variable is not found in the expression
    #[error("Variable not found in expression: {0}")]
    VariableNotFound(String),
}
