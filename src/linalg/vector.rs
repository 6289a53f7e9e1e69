use itertools::Itertools;

use crate::errors::CalculusError;

/// A fixed-length, non-empty real vector with 1-based element access.
///
/// This is the numeric container that vector-valued operators evaluate into. Element
/// access is 1-based to match the coordinate numbering of the term algebra, while
/// `as_slice` exposes the 0-based storage for interop.
///
/// # Examples
///
/// ```rust
/// use symdiff::linalg::Vector;
///
/// let v = Vector::new(vec![1.0, 2.0, 3.0]).unwrap();
/// assert_eq!(v.get(1).unwrap(), 1.0);
/// assert_eq!(v.dot(&v).unwrap(), 14.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    data: Vec<f64>,
}

impl Vector {
    /// Creates a vector from its elements.
    ///
    /// # Errors
    /// Returns `CalculusError::Construction` if `data` is empty.
    pub fn new(data: Vec<f64>) -> Result<Self, CalculusError> {
        if data.is_empty() {
            return Err(CalculusError::Construction(
                "vector must have at least one element".to_string(),
            ));
        }
        Ok(Self { data })
    }

    /// Creates a zero vector of length `len`.
    pub fn zeros(len: usize) -> Result<Self, CalculusError> {
        Self::new(vec![0.0; len])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false, vectors are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the element at 1-based position `index`.
    pub fn get(&self, index: usize) -> Result<f64, CalculusError> {
        let offset = self.offset(index)?;
        Ok(self.data[offset])
    }

    /// Overwrites the element at 1-based position `index`.
    pub fn set(&mut self, index: usize, value: f64) -> Result<(), CalculusError> {
        let offset = self.offset(index)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Elementwise sum.
    pub fn add(&self, other: &Vector) -> Result<Vector, CalculusError> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Elementwise difference.
    pub fn sub(&self, other: &Vector) -> Result<Vector, CalculusError> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Multiplies every element by `factor`.
    pub fn scale(&self, factor: f64) -> Vector {
        Vector {
            data: self.data.iter().map(|x| x * factor).collect(),
        }
    }

    /// Inner product.
    pub fn dot(&self, other: &Vector) -> Result<f64, CalculusError> {
        self.check_len(other)?;
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    fn offset(&self, index: usize) -> Result<usize, CalculusError> {
        if index == 0 || index > self.data.len() {
            return Err(CalculusError::IndexOutOfRange {
                index,
                len: self.data.len(),
            });
        }
        Ok(index - 1)
    }

    fn check_len(&self, other: &Vector) -> Result<(), CalculusError> {
        if self.len() != other.len() {
            return Err(CalculusError::DimensionMismatch {
                expected: self.len(),
                got: other.len(),
            });
        }
        Ok(())
    }

    fn zip_with<F>(&self, other: &Vector, op: F) -> Result<Vector, CalculusError>
    where
        F: Fn(f64, f64) -> f64,
    {
        self.check_len(other)?;
        Ok(Vector {
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(a, b)| op(*a, *b))
                .collect(),
        })
    }
}

impl TryFrom<Vec<f64>> for Vector {
    type Error = CalculusError;

    fn try_from(data: Vec<f64>) -> Result<Self, Self::Error> {
        Vector::new(data)
    }
}

impl std::fmt::Display for Vector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.data.iter().join(", "))
    }
}
