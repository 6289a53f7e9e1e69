use itertools::Itertools;

use crate::errors::CalculusError;
use crate::linalg::Vector;

/// A dense, non-empty real matrix with 1-based element access.
///
/// Data is stored in row-major order. For a matrix with dimensions (m,n), element
/// (i,j) lives at flat offset (i-1)*n + (j-1).
///
/// # Examples
///
/// ```rust
/// use symdiff::linalg::{Matrix, Vector};
///
/// let m = Matrix::from_rows(vec![
///     Vector::new(vec![1.0, 2.0]).unwrap(),
///     Vector::new(vec![3.0, 4.0]).unwrap(),
/// ])
/// .unwrap();
/// assert_eq!(m.get(2, 1).unwrap(), 3.0);
/// assert_eq!(m.column(2).unwrap().as_slice(), &[2.0, 4.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    /// Builds a matrix from an ordered sequence of equal-length row vectors.
    ///
    /// # Errors
    /// Returns `CalculusError::Construction` if `rows` is empty or the rows are ragged.
    pub fn from_rows(rows: Vec<Vector>) -> Result<Self, CalculusError> {
        let Some(first) = rows.first() else {
            return Err(CalculusError::Construction(
                "matrix must have at least one row".to_string(),
            ));
        };
        let cols = first.len();

        if let Some((i, row)) = rows.iter().find_position(|row| row.len() != cols) {
            return Err(CalculusError::Construction(format!(
                "ragged rows: row 1 has {cols} columns, row {} has {}",
                i + 1,
                row.len()
            )));
        }

        let n_rows = rows.len();
        let data = rows.into_iter().flat_map(Vector::into_vec).collect();
        Ok(Self {
            rows: n_rows,
            cols,
            data,
        })
    }

    /// Creates a zero matrix of the given dimensions.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self, CalculusError> {
        if rows == 0 || cols == 0 {
            return Err(CalculusError::Construction(format!(
                "matrix dimensions must be non-zero, got ({rows}, {cols})"
            )));
        }
        Ok(Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        })
    }

    /// Returns the dimensions of the matrix as (rows, columns).
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64, CalculusError> {
        let offset = self.offset(row, col)?;
        Ok(self.data[offset])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), CalculusError> {
        let offset = self.offset(row, col)?;
        self.data[offset] = value;
        Ok(())
    }

    /// Extracts the 1-based row `row`.
    pub fn row(&self, row: usize) -> Result<Vector, CalculusError> {
        check_index(row, self.rows)?;
        let start = (row - 1) * self.cols;
        Vector::new(self.data[start..start + self.cols].to_vec())
    }

    /// Extracts the 1-based column `col`.
    pub fn column(&self, col: usize) -> Result<Vector, CalculusError> {
        check_index(col, self.cols)?;
        Vector::new(
            self.data
                .iter()
                .skip(col - 1)
                .step_by(self.cols)
                .copied()
                .collect(),
        )
    }

    pub fn transpose(&self) -> Matrix {
        let data = (0..self.cols)
            .cartesian_product(0..self.rows)
            .map(|(j, i)| self.data[i * self.cols + j])
            .collect();
        Matrix {
            rows: self.cols,
            cols: self.rows,
            data,
        }
    }

    /// Returns the elements as a flat slice in row-major order.
    pub fn flat_slice(&self) -> &[f64] {
        &self.data
    }

    /// Converts the matrix into nested row vectors.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.data.chunks(self.cols).map(<[f64]>::to_vec).collect()
    }

    fn offset(&self, row: usize, col: usize) -> Result<usize, CalculusError> {
        check_index(row, self.rows)?;
        check_index(col, self.cols)?;
        Ok((row - 1) * self.cols + (col - 1))
    }
}

fn check_index(index: usize, len: usize) -> Result<(), CalculusError> {
    if index == 0 || index > len {
        return Err(CalculusError::IndexOutOfRange { index, len });
    }
    Ok(())
}

impl std::fmt::Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.data.chunks(self.cols) {
            writeln!(f, "[{}]", row.iter().join(", "))?;
        }
        Ok(())
    }
}
