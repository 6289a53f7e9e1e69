//! Conversion of evalexpr AST nodes into term trees.
//!
//! The evalexpr crate parses strings like `"x^2 * sin(y)"` into an operator tree. This
//! module walks that tree and rebuilds it in the closed term algebra of [`Term`]:
//!
//! * `+` and `*` fold their operands into nested `Sum` and `Product` nodes
//! * `-`, unary `-` and `/` are expressed with `(-1) * b` and `b^-1`
//! * `x^c` requires a numeric constant exponent `c` and becomes a power composite
//! * function calls map onto the composite kinds by name (`sin`, `math::cos`, `ln`, ...),
//!   and `sqrt(h)` becomes `h^0.5`
//! * variables become coordinates, `x_k = var_map[name] + 1`
//!
//! The main entry point is [`build_term`].

use std::collections::HashMap;
use std::str::FromStr;

use evalexpr::{Node, Operator};

use crate::errors::ConvertError;
use crate::term::{CompositeKind, Term};

/// Converts an evalexpr AST node into a term tree.
///
/// # Arguments
/// * `node` - The evalexpr AST node to convert
/// * `var_map` - A mapping of variable names to their 0-based positions in input arrays
///
/// # Returns
/// * `Result<Term, ConvertError>` - The converted term or an error if conversion fails
///
/// # Example
/// ```
/// # use std::collections::HashMap;
/// # use symdiff::convert::build_term;
/// # use symdiff::prelude::*;
/// let node = evalexpr::build_operator_tree("3 * x^2").unwrap();
/// let var_map = HashMap::from([("x".to_string(), 0)]);
///
/// let term = build_term(&node, &var_map).unwrap();
/// assert_eq!(term.evaluate(&[2.0]).unwrap(), 12.0);
/// ```
pub fn build_term(node: &Node, var_map: &HashMap<String, u32>) -> Result<Term, ConvertError> {
    match node.operator() {
        Operator::Add => fold_children(node, var_map, Term::sum),
        Operator::Mul => fold_children(node, var_map, Term::product),
        Operator::Sub => Ok(Term::sub(
            build_term(child(node, 0)?, var_map)?,
            build_term(child(node, 1)?, var_map)?,
        )),
        Operator::Div => Ok(Term::div(
            build_term(child(node, 0)?, var_map)?,
            build_term(child(node, 1)?, var_map)?,
        )),
        Operator::Neg => Ok(Term::neg(build_term(child(node, 0)?, var_map)?)),
        Operator::Const { .. } => numeric_constant(node)
            .map(Term::Constant)
            .ok_or_else(|| ConvertError::ConstOperator(format!("{:?}", node.operator()))),
        Operator::VariableIdentifierRead { identifier } => {
            let index = var_map
                .get(identifier.as_str())
                .ok_or_else(|| ConvertError::VariableNotFound(identifier.to_string()))?;
            Ok(Term::Coordinate(*index as usize + 1))
        }
        Operator::FunctionIdentifier { identifier } => {
            let inner = build_term(child(node, 0)?, var_map)?;
            match identifier.as_str() {
                "sqrt" | "math::sqrt" => Ok(Term::power(inner, 0.5)),
                name => CompositeKind::from_str(name)
                    .map(|kind| Term::composite(kind, 1.0, 1.0, inner))
                    .map_err(|_| ConvertError::UnsupportedFunction(name.to_string())),
            }
        }
        Operator::Exp => {
            let base = build_term(child(node, 0)?, var_map)?;
            let exponent = child(node, 1)?;
            let power = numeric_constant(exponent)
                .ok_or_else(|| ConvertError::ExpOperator(format!("{:?}", exponent.operator())))?;
            Ok(raise(base, power))
        }
        Operator::RootNode => match node.children() {
            [only] => build_term(only, var_map),
            children => Err(ConvertError::RootNode(format!("{children:?}"))),
        },
        other => Err(ConvertError::UnsupportedOperator(format!("{other:?}"))),
    }
}

/// Folds an n-ary operator into a left-leaning chain of binary nodes.
fn fold_children(
    node: &Node,
    var_map: &HashMap<String, u32>,
    combine: fn(Term, Term) -> Term,
) -> Result<Term, ConvertError> {
    node.children()
        .iter()
        .skip(1)
        .try_fold(build_term(child(node, 0)?, var_map)?, |acc, next| {
            Ok(combine(acc, build_term(next, var_map)?))
        })
}

fn child(node: &Node, index: usize) -> Result<&Node, ConvertError> {
    node.children().get(index).ok_or_else(|| {
        ConvertError::UnsupportedOperator(format!(
            "{:?} is missing operand {}",
            node.operator(),
            index + 1
        ))
    })
}

/// Reads a numeric literal, allowing a leading unary minus.
fn numeric_constant(node: &Node) -> Option<f64> {
    match node.operator() {
        Operator::Const { value } => match value {
            evalexpr::Value::Float(f) => Some(*f),
            evalexpr::Value::Int(i) => Some(*i as f64),
            _ => None,
        },
        Operator::Neg => node.children().first().and_then(numeric_constant).map(|v| -v),
        Operator::RootNode => match node.children() {
            [only] => numeric_constant(only),
            _ => None,
        },
        _ => None,
    }
}

/// `base^power`, merged into an existing unit composite so that `sin(x)^2` becomes
/// `sin^2(x)` rather than `(sin(x))^2`.
fn raise(base: Term, power: f64) -> Term {
    match base {
        Term::Composite {
            kind,
            scalar,
            power: unit,
            inner,
        } if scalar == 1.0 && unit == 1.0 => Term::composite(kind, 1.0, power, *inner),
        base => Term::power(base, power),
    }
}
