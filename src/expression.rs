//! Parsed expressions with exact symbolic derivatives.
//!
//! This module provides the `Expression` type, a convenience layer over the term algebra.
//! An expression string is parsed with evalexpr, converted into a [`Term`] and wrapped as a
//! functional whose gradient and Hessian are built once on creation.
//!
//! # Example
//!
//! ```
//! use symdiff::Expression;
//!
//! let expr = Expression::new("2*x + y^2".to_string()).unwrap();
//! let result = expr.eval(&[1.0, 2.0]).unwrap(); // 6.0
//! let gradient = expr.gradient(&[1.0, 2.0]).unwrap(); // [2.0, 4.0]
//! let hessian = expr.hessian(&[1.0, 2.0]).unwrap(); // [[0.0, 0.0], [0.0, 2.0]]
//! # assert_eq!(result, 6.0);
//! # assert_eq!(gradient, vec![2.0, 4.0]);
//! # assert_eq!(hessian, vec![vec![0.0, 0.0], vec![0.0, 2.0]]);
//! ```
//!
//! # Variable Handling
//!
//! Variables can be specified either:
//! - Automatically extracted and sorted alphabetically using `new()`
//! - Explicitly mapped to indices using `from_var_map()`
//!
//! Input arrays must match the variable ordering. The variable at index `i` is the
//! coordinate `x_{i+1}` of the underlying term.

use std::collections::{HashMap, HashSet};

use colored::Colorize;
use evalexpr::{build_operator_tree, Node, Operator};
use itertools::Itertools;
use log::debug;

use crate::backends::point::Point;
use crate::convert::build_term;
use crate::errors::ExpressionError;
use crate::functional::{Functional, ScalarField};
use crate::operator::{Gradient, Hessian, VectorOperator};
use crate::opt::optimize;
use crate::term::Term;
use crate::traits::{Differentiable, Evaluable, VectorValued};

/// A parsed expression together with its gradient and Hessian.
///
/// Derivative trees are passed through the value-preserving rewrite pass once, when the
/// expression is built, so repeated evaluations do not pay for `* 1` and `+ 0` nodes.
#[derive(Clone)]
pub struct Expression {
    expression_str: String,
    functional: Functional,
    gradient: Gradient,
    hessian: Hessian,
    var_map: HashMap<String, u32>,
    sorted_variables: Vec<String>,
    dimension: usize,
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{\n")?;
        writeln!(f, "    {}: {}\n", "Expression".cyan(), self.expression_str)?;
        writeln!(f, "    {}: {}\n", "Term".cyan(), self.functional)?;
        writeln!(f, "    {}: {:?}\n", "Variables".cyan(), self.var_map)?;
        writeln!(
            f,
            "    {}: {:?}\n",
            "Sorted Variables".cyan(),
            self.sorted_variables
        )?;
        writeln!(f, "}}")?;
        Ok(())
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{\n")?;
        writeln!(f, "    {}: {}\n", "Expression".cyan(), self.expression_str)?;
        writeln!(
            f,
            "    {}: {:?}\n",
            "Sorted Variables".cyan(),
            self.sorted_variables
        )?;
        writeln!(f, "}}")?;
        Ok(())
    }
}

impl Expression {
    /// Creates a new `Expression` from a string representation.
    ///
    /// The variable names are extracted from the expression and sorted alphabetically;
    /// input arrays are expected in that order. For more control over variable ordering,
    /// use `from_var_map()` instead.
    ///
    /// # Example
    /// ```
    /// # use symdiff::Expression;
    /// let expr = Expression::new("2*x + y^2".to_string()).unwrap();
    /// let result = expr.eval(&[1.0, 2.0]).unwrap(); // x=1, y=2 -> 2*1 + 2^2 = 6
    /// assert_eq!(result, 6.0);
    /// ```
    pub fn new(expression_str: String) -> Result<Self, ExpressionError> {
        let node = build_operator_tree(&expression_str)?;
        let variables = extract_symbols(&node);
        Self::build(&variables, expression_str)
    }

    /// Creates a new `Expression` from a map of variable names to their 0-based indices.
    ///
    /// # Example
    /// ```
    /// # use symdiff::Expression;
    /// # use std::collections::HashMap;
    /// let mut vars = HashMap::new();
    /// vars.insert("y".to_string(), 0); // y will be first in input arrays
    /// vars.insert("x".to_string(), 1); // x will be second
    ///
    /// let expr = Expression::from_var_map("2*x + y^2".to_string(), &vars).unwrap();
    /// let result = expr.eval(&[2.0, 1.0]).unwrap(); // y=2, x=1 -> 2*1 + 2^2 = 6
    /// assert_eq!(result, 6.0);
    /// ```
    pub fn from_var_map(
        expression_str: String,
        variables: &HashMap<String, u32>,
    ) -> Result<Self, ExpressionError> {
        Self::build(variables, expression_str)
    }

    /// Parses the expression, converts it into a term and differentiates it.
    ///
    /// # Errors
    /// Returns `ExpressionError` if:
    /// - Expression string fails to parse
    /// - Conversion into the term algebra fails
    /// - Variables in the expression are not found in the provided map
    fn build(
        variables: &HashMap<String, u32>,
        expression_str: String,
    ) -> Result<Self, ExpressionError> {
        let node = build_operator_tree(&expression_str)?;

        let undefined: Vec<String> = extract_symbols(&node)
            .into_keys()
            .filter(|variable| !variables.contains_key(variable))
            .sorted()
            .collect();
        if !undefined.is_empty() {
            return Err(ExpressionError::VariableNotFound(undefined.join(", ")));
        }

        let sorted_variables: Vec<String> = variables
            .iter()
            .sorted_by_key(|(_, &idx)| idx)
            .map(|(var, _)| var.clone())
            .collect();
        let dimension = variables
            .values()
            .max()
            .map_or(0, |&idx| idx as usize + 1);

        let term = optimize(&build_term(&node, variables)?);
        debug!(
            "built expression '{}' over {} variables ({} nodes)",
            expression_str,
            dimension,
            term.node_count()
        );

        let functional = Functional::from(ScalarField::new(term, dimension.max(1))?);
        let gradient = Gradient::new(
            (1..=dimension)
                .map(|k| functional.differentiate_wrt(k).optimize())
                .collect(),
        );
        let hessian = gradient.differentiate().optimize();

        Ok(Self {
            expression_str,
            functional,
            gradient,
            hessian,
            var_map: variables.clone(),
            sorted_variables,
            dimension,
        })
    }

    /// Evaluates the expression for the given input values.
    ///
    /// # Errors
    /// Returns `ExpressionError::InvalidInputLength` if the length of values doesn't match
    /// the number of variables, and a wrapped `CalculusError::Construction` if `values`
    /// has no contiguous slice view (a strided `ndarray::Array1`).
    pub fn eval<V: Point + ?Sized>(&self, values: &V) -> Result<f64, ExpressionError> {
        let values = values.try_as_slice()?;
        self.validate_input_length(values)?;
        Ok(self.functional.evaluate_slice(values)?)
    }

    /// Evaluates the expression for a batch of inputs in parallel.
    ///
    /// # Example
    /// ```
    /// # use symdiff::Expression;
    /// let expr = Expression::new("x * y".to_string()).unwrap();
    /// let results = expr
    ///     .eval_parallel(&[vec![1.0, 2.0], vec![3.0, 4.0]])
    ///     .unwrap();
    /// assert_eq!(results, vec![2.0, 12.0]);
    /// ```
    pub fn eval_parallel(&self, input_sets: &[Vec<f64>]) -> Result<Vec<f64>, ExpressionError> {
        for values in input_sets {
            self.validate_input_length(values)?;
        }
        Ok(self.functional.evaluate_parallel(input_sets)?)
    }

    /// Computes the gradient (all first order partial derivatives) in variable order.
    ///
    /// # Example
    /// ```
    /// # use symdiff::Expression;
    /// let expr = Expression::new("2*x + y^2".to_string()).unwrap();
    /// let gradient = expr.gradient(&[1.0, 2.0]).unwrap();
    /// assert_eq!(gradient, vec![2.0, 4.0]); // [d/dx, d/dy] = [2, 2y]
    /// ```
    pub fn gradient(&self, values: &[f64]) -> Result<Vec<f64>, ExpressionError> {
        self.validate_input_length(values)?;
        Ok(evaluate_all(self.gradient.components(), values)?)
    }

    /// Computes the Hessian matrix (all second order partial derivatives) in variable
    /// order, `hessian[i][j] = d/dx_i (df/dx_j)`.
    ///
    /// # Example
    /// ```
    /// # use symdiff::Expression;
    /// let expr = Expression::new("x^2 * y".to_string()).unwrap();
    /// let hessian = expr.hessian(&[3.0, 2.0]).unwrap();
    /// assert_eq!(hessian, vec![vec![4.0, 6.0], vec![6.0, 0.0]]);
    /// ```
    pub fn hessian(&self, values: &[f64]) -> Result<Vec<Vec<f64>>, ExpressionError> {
        self.validate_input_length(values)?;
        self.hessian
            .rows()
            .iter()
            .map(|row| Ok(evaluate_all(row.components(), values)?))
            .collect()
    }

    /// Returns the first order partial derivative with respect to one variable.
    ///
    /// # Errors
    /// Returns `ExpressionError::VariableNotFound` if the variable is not known.
    pub fn derivative(&self, variable: &str) -> Result<&Functional, ExpressionError> {
        let k = self.coordinate_of(variable)?;
        self.gradient
            .components()
            .get(k - 1)
            .ok_or_else(|| ExpressionError::VariableNotFound(variable.to_string()))
    }

    /// Computes the higher-order partial derivative with respect to multiple variables,
    /// differentiating in the given order.
    ///
    /// # Example
    /// ```
    /// # use symdiff::prelude::*;
    /// let expr = Expression::new("x^2 * y^2".to_string()).unwrap();
    /// let dxdy = expr.derive_wrt(&["x", "y"]).unwrap();
    /// assert_eq!(dxdy.evaluate(&[2.0, 3.0]).unwrap(), 24.0); // 4xy
    /// ```
    ///
    /// # Errors
    /// Returns `ExpressionError::VariableNotFound` if any variable is not known.
    pub fn derive_wrt(&self, variables: &[&str]) -> Result<Functional, ExpressionError> {
        let coordinates = self.coordinates_of(variables)?;
        let derivative = coordinates
            .into_iter()
            .fold(self.functional.clone(), |f, k| f.differentiate_wrt(k));
        Ok(derivative.optimize())
    }

    /// Computes several first order partials at once, returned as one operator whose
    /// outputs follow the order of `variables`.
    ///
    /// # Example
    /// ```
    /// # use symdiff::prelude::*;
    /// let expr = Expression::new("x^2 + 2*x*y + y^2 + z^3".to_string()).unwrap();
    /// let op = expr.derive_wrt_stack(&["z", "x"]).unwrap();
    /// let values = op.evaluate(&[2.0, 3.0, 2.0]).unwrap();
    /// assert_eq!(values.as_slice(), &[12.0, 10.0]);
    /// ```
    pub fn derive_wrt_stack(&self, variables: &[&str]) -> Result<VectorOperator, ExpressionError> {
        let coordinates = self.coordinates_of(variables)?;
        let components = self.gradient.components();
        Ok(coordinates
            .into_iter()
            .map(|k| components[k - 1].clone())
            .collect())
    }

    /// Returns the map of variable names to their indices.
    pub fn variables(&self) -> &HashMap<String, u32> {
        &self.var_map
    }

    /// Returns the original expression string.
    pub fn expression_str(&self) -> &str {
        &self.expression_str
    }

    /// Returns the sorted variables.
    pub fn sorted_variables(&self) -> &[String] {
        &self.sorted_variables
    }

    /// Returns the underlying term tree.
    pub fn term(&self) -> Term {
        self.functional.to_term()
    }

    pub fn functional(&self) -> &Functional {
        &self.functional
    }

    pub fn gradient_operator(&self) -> &Gradient {
        &self.gradient
    }

    pub fn hessian_operator(&self) -> &Hessian {
        &self.hessian
    }

    fn coordinate_of(&self, variable: &str) -> Result<usize, ExpressionError> {
        self.var_map
            .get(variable)
            .map(|&idx| idx as usize + 1)
            .ok_or_else(|| ExpressionError::VariableNotFound(variable.to_string()))
    }

    fn coordinates_of(&self, variables: &[&str]) -> Result<Vec<usize>, ExpressionError> {
        let undefined: HashSet<&str> = variables
            .iter()
            .copied()
            .filter(|variable| !self.var_map.contains_key(*variable))
            .collect();
        if !undefined.is_empty() {
            return Err(ExpressionError::VariableNotFound(
                undefined.into_iter().sorted().join(", "),
            ));
        }
        variables.iter().map(|v| self.coordinate_of(v)).collect()
    }

    /// Validates that the input array length matches the number of variables.
    fn validate_input_length(&self, values: &[f64]) -> Result<(), ExpressionError> {
        if values.len() != self.dimension {
            return Err(ExpressionError::InvalidInputLength {
                expected: self.dimension,
                got: values.len(),
            });
        }
        Ok(())
    }
}

fn evaluate_all(
    functionals: &[Functional],
    values: &[f64],
) -> Result<Vec<f64>, crate::errors::CalculusError> {
    functionals
        .iter()
        .map(|f| f.evaluate_slice(values))
        .collect()
}

/// Extracts variables from an expression tree and assigns them indices in alphabetical
/// order.
pub fn extract_symbols(node: &Node) -> HashMap<String, u32> {
    let mut symbols = HashSet::new();
    extract_symbols_from_node(node, &mut symbols);

    symbols
        .into_iter()
        .sorted()
        .enumerate()
        .map(|(i, v)| (v, i as u32))
        .collect()
}

fn extract_symbols_from_node(node: &Node, symbols: &mut HashSet<String>) {
    match node.operator() {
        Operator::VariableIdentifierRead { identifier } => {
            symbols.insert(identifier.to_string());
        }
        _ => {
            for child in node.children() {
                extract_symbols_from_node(child, symbols);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_expression() {
        let expr = Expression::new("2*x + y^2".to_string()).unwrap();
        assert_eq!(expr.eval(&[1.0, 2.0]).unwrap(), 6.0);
    }

    #[test]
    fn test_gradient() {
        let expr = Expression::new("2*x + y^2".to_string()).unwrap();
        assert_eq!(expr.gradient(&[1.0, 2.0]).unwrap(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_hessian() {
        let expr = Expression::new("2*x + y^2".to_string()).unwrap();
        let hessian = expr.hessian(&[1.0, 2.0]).unwrap();
        assert_eq!(hessian, vec![vec![0.0, 0.0], vec![0.0, 2.0]]);
    }

    #[test]
    fn test_derivative() {
        let expr = Expression::new("2*x + y^2".to_string()).unwrap();
        let dx = expr.derivative("x").unwrap();
        assert_eq!(dx.evaluate(&[1.0, 2.0]).unwrap(), 2.0);
        assert!(expr.derivative("z").is_err());
    }

    #[test]
    fn test_derive_wrt() {
        let expr = Expression::new("x^2 * y^2".to_string()).unwrap();
        let dxdy = expr.derive_wrt(&["x", "y"]).unwrap();
        assert_eq!(dxdy.evaluate(&[2.0, 3.0]).unwrap(), 24.0);

        let third = expr.derive_wrt(&["x", "x", "y"]).unwrap();
        assert_eq!(third.evaluate(&[2.0, 3.0]).unwrap(), 12.0);
    }

    #[test]
    fn test_derive_wrt_invalid() {
        let expr = Expression::new("x^2 * y^2".to_string()).unwrap();
        assert!(matches!(
            expr.derive_wrt(&["x", "z"]),
            Err(ExpressionError::VariableNotFound(name)) if name == "z"
        ));
    }

    #[test]
    fn test_derive_wrt_stack() {
        let expr = Expression::new("x^2 + 2*x*y + y^2 + z^3".to_string()).unwrap();
        let values = [2.0, 3.0, 2.0];

        let op = expr.derive_wrt_stack(&["x", "z"]).unwrap();
        assert_eq!(op.evaluate(&values).unwrap().as_slice(), &[10.0, 12.0]);

        let op = expr.derive_wrt_stack(&["z", "x"]).unwrap();
        assert_eq!(op.evaluate(&values).unwrap().as_slice(), &[12.0, 10.0]);
    }

    #[test]
    fn test_eval_invalid() {
        let expr = Expression::new("2*x + y^2".to_string()).unwrap();
        assert!(matches!(
            expr.eval(&[1.0]),
            Err(ExpressionError::InvalidInputLength {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_from_var_map() {
        let expr = Expression::from_var_map(
            "2*x + y^2".to_string(),
            &HashMap::from([("x".to_string(), 1), ("y".to_string(), 0)]),
        )
        .unwrap();
        assert_eq!(expr.eval(&[2.0, 1.0]).unwrap(), 6.0);
        assert_eq!(expr.gradient(&[2.0, 1.0]).unwrap(), vec![4.0, 2.0]);
    }

    #[test]
    fn test_from_var_map_invalid() {
        let result = Expression::from_var_map(
            "2*x + y^2".to_string(),
            &HashMap::from([("x".to_string(), 0), ("z".to_string(), 1)]),
        );
        assert!(matches!(result, Err(ExpressionError::VariableNotFound(name)) if name == "y"));
    }

    #[test]
    fn test_transcendental_functions() {
        let expr = Expression::new("sin(x) * exp(y) + ln(x)".to_string()).unwrap();
        let (x, y) = (0.8f64, -0.3f64);

        let gradient = expr.gradient(&[x, y]).unwrap();
        assert_abs_diff_eq!(gradient[0], x.cos() * y.exp() + 1.0 / x, epsilon = 1e-12);
        assert_abs_diff_eq!(gradient[1], x.sin() * y.exp(), epsilon = 1e-12);

        let hessian = expr.hessian(&[x, y]).unwrap();
        assert_abs_diff_eq!(
            hessian[0][0],
            -x.sin() * y.exp() - 1.0 / (x * x),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(hessian[0][1], x.cos() * y.exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(hessian[1][0], hessian[0][1], epsilon = 1e-12);
    }

    #[test]
    fn test_constant_expression() {
        let expr = Expression::new("2 + 3".to_string()).unwrap();
        assert_eq!(expr.eval(&[] as &[f64]).unwrap(), 5.0);
        assert!(expr.gradient(&[]).unwrap().is_empty());
        assert!(expr.hessian(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_eval_parallel() {
        let expr = Expression::new("x^2 + y".to_string()).unwrap();
        let inputs: Vec<Vec<f64>> = (0..50).map(|i| vec![i as f64, 1.0]).collect();
        let results = expr.eval_parallel(&inputs).unwrap();
        for (i, result) in results.iter().enumerate() {
            assert_eq!(*result, (i * i) as f64 + 1.0);
        }

        assert!(expr.eval_parallel(&[vec![1.0]]).is_err());
    }

    #[test]
    fn test_all_backends() {
        let expr = Expression::new("2*x + y^2".to_string()).unwrap();
        let expected = 6.0;

        assert_eq!(expr.eval(&vec![1.0, 2.0]).unwrap(), expected);
        assert_eq!(expr.eval(&[1.0, 2.0][..]).unwrap(), expected);

        #[cfg(feature = "nalgebra")]
        {
            let input = nalgebra::DVector::from_vec(vec![1.0, 2.0]);
            assert_eq!(expr.eval(&input).unwrap(), expected);
        }

        #[cfg(feature = "ndarray")]
        {
            let input = ndarray::Array1::from_vec(vec![1.0, 2.0]);
            assert_eq!(expr.eval(&input).unwrap(), expected);

            use crate::errors::CalculusError;

            let strided = ndarray::Array1::from_vec(vec![1.0, 0.0, 2.0, 0.0])
                .slice_move(ndarray::s![..;2]);
            assert!(matches!(
                expr.eval(&strided),
                Err(ExpressionError::CalculusError(CalculusError::Construction(_)))
            ));
        }
    }

    #[test]
    fn test_debug_and_display_formatting() {
        let expr = Expression::new("2*x + y^2".to_string()).unwrap();

        let debug_output = format!("{:?}", expr);
        assert!(debug_output.contains("Expression"));
        assert!(debug_output.contains("2*x + y^2"));

        let display_output = format!("{}", expr);
        assert!(display_output.contains("Expression"));
        assert!(display_output.contains("2*x + y^2"));
    }

    #[test]
    fn test_invalid_expression() {
        assert!(Expression::new("2*x + )".to_string()).is_err());
        assert!(matches!(
            Expression::new("x^y".to_string()),
            Err(ExpressionError::BuildTermError(_))
        ));
    }

    #[test]
    fn test_variable_ordering() {
        let vars = HashMap::from([
            ("z".to_string(), 0),
            ("y".to_string(), 1),
            ("x".to_string(), 2),
        ]);

        let expr = Expression::from_var_map("x + y + z".to_string(), &vars).unwrap();
        assert_eq!(expr.sorted_variables(), &["z", "y", "x"]);
        assert_eq!(expr.eval(&[1.0, 2.0, 3.0]).unwrap(), 6.0);
        assert_eq!(expr.variables().len(), 3);
        assert_eq!(expr.expression_str(), "x + y + z");
    }

    #[test]
    fn test_extract_symbols() {
        let node = build_operator_tree("b * a + sin(c)").unwrap();
        let symbols = extract_symbols(&node);
        assert_eq!(symbols["a"], 0);
        assert_eq!(symbols["b"], 1);
        assert_eq!(symbols["c"], 2);
    }
}
