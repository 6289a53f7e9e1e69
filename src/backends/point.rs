use crate::errors::CalculusError;
use crate::linalg::Vector;

/// A trait for vector-like types that can be used as evaluation points.
///
/// This trait provides a common interface for the different vector implementations a
/// caller may hold, allowing them to be passed interchangeably to `evaluate`. Coordinate
/// `k` of the term algebra is read from slice position `k - 1`.
///
/// # Examples
///
/// ```rust
/// use symdiff::prelude::*;
///
/// let f = Term::product(Term::coordinate(1).unwrap(), Term::coordinate(2).unwrap());
///
/// // The same term evaluated at points held in different containers
/// assert_eq!(f.evaluate(&[2.0, 3.0]).unwrap(), 6.0);
/// assert_eq!(f.evaluate(&vec![2.0, 3.0]).unwrap(), 6.0);
/// assert_eq!(f.evaluate(&Vector::new(vec![2.0, 3.0]).unwrap()).unwrap(), 6.0);
/// ```
pub trait Point {
    /// Returns a reference to the point's coordinates as a slice.
    fn as_slice(&self) -> &[f64];

    /// Returns the coordinates as a slice, or an error when the container has no
    /// contiguous view of them.
    fn try_as_slice(&self) -> Result<&[f64], CalculusError> {
        Ok(self.as_slice())
    }

    /// Returns the number of coordinates.
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Checks if the point has no coordinates.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Point for [f64] {
    fn as_slice(&self) -> &[f64] {
        self
    }
}

impl Point for Vec<f64> {
    fn as_slice(&self) -> &[f64] {
        self
    }
}

impl<const N: usize> Point for [f64; N] {
    fn as_slice(&self) -> &[f64] {
        self
    }
}

impl Point for Vector {
    fn as_slice(&self) -> &[f64] {
        Vector::as_slice(self)
    }
}

/// Implementation of Point trait for ndarray's Array1<f64>.
///
/// Non-contiguous arrays have no slice view. `try_as_slice` rejects them with
/// [`CalculusError::Construction`], and `evaluate` goes through it.
#[cfg(feature = "ndarray")]
impl Point for ndarray::Array1<f64> {
    fn as_slice(&self) -> &[f64] {
        ndarray::Array1::as_slice(self).unwrap_or(&[])
    }

    fn try_as_slice(&self) -> Result<&[f64], CalculusError> {
        ndarray::Array1::as_slice(self).ok_or_else(|| {
            CalculusError::Construction(format!(
                "ndarray point of length {} is not contiguous",
                ndarray::Array1::len(self)
            ))
        })
    }

    fn len(&self) -> usize {
        ndarray::Array1::len(self)
    }
}

/// Implementation of Point trait for nalgebra's DVector<f64>.
#[cfg(feature = "nalgebra")]
impl Point for nalgebra::DVector<f64> {
    fn as_slice(&self) -> &[f64] {
        nalgebra::DVector::as_slice(self)
    }
}
