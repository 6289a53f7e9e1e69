use crate::errors::CalculusError;
use crate::linalg::Matrix;

/// A trait for matrix-like types that matrix-valued operators can evaluate into.
///
/// The Jacobian and Hessian always evaluate into a [`Matrix`] first, which checks that
/// the rows agree in width. Implementors of this trait only need to copy the checked
/// row-major data into their own layout.
///
/// # Examples
///
/// ```rust
/// use symdiff::prelude::*;
///
/// let m = Matrix::zeros(2, 3).unwrap();
/// let rows: Vec<Vec<f64>> = DenseMatrix::from_matrix(&m);
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[0].len(), 3);
/// ```
pub trait DenseMatrix: Sized {
    /// Builds the backend matrix from a checked dense matrix.
    fn from_matrix(matrix: &Matrix) -> Self;

    /// Returns the dimensions of the matrix as (rows, columns).
    fn dims(&self) -> (usize, usize);
}

impl DenseMatrix for Matrix {
    fn from_matrix(matrix: &Matrix) -> Self {
        matrix.clone()
    }

    fn dims(&self) -> (usize, usize) {
        Matrix::dims(self)
    }
}

impl DenseMatrix for Vec<Vec<f64>> {
    fn from_matrix(matrix: &Matrix) -> Self {
        matrix.to_rows()
    }

    fn dims(&self) -> (usize, usize) {
        (self.len(), self.first().map_or(0, Vec::len))
    }
}

/// Implementation of DenseMatrix trait for ndarray's Array2<f64>.
#[cfg(feature = "ndarray")]
impl DenseMatrix for ndarray::Array2<f64> {
    fn from_matrix(matrix: &Matrix) -> Self {
        let (rows, cols) = matrix.dims();
        ndarray::Array2::from_shape_fn((rows, cols), |(i, j)| {
            matrix.flat_slice()[i * cols + j]
        })
    }

    fn dims(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
}

/// Implementation of DenseMatrix trait for nalgebra's DMatrix<f64>.
///
/// nalgebra stores column-major, so the row-major data is handed over through
/// `from_row_slice`.
#[cfg(feature = "nalgebra")]
impl DenseMatrix for nalgebra::DMatrix<f64> {
    fn from_matrix(matrix: &Matrix) -> Self {
        let (rows, cols) = matrix.dims();
        nalgebra::DMatrix::from_row_slice(rows, cols, matrix.flat_slice())
    }

    fn dims(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }
}

/// Builds a [`Matrix`] back from nested rows.
impl TryFrom<Vec<Vec<f64>>> for Matrix {
    type Error = CalculusError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        let rows = rows
            .into_iter()
            .map(crate::linalg::Vector::new)
            .collect::<Result<Vec<_>, _>>()?;
        Matrix::from_rows(rows)
    }
}
