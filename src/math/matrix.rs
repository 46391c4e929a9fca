use std::ops::{Index, IndexMut};

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::math::elementwise::Elementwise;
use crate::math::executor::Executor;
use crate::math::random::{fresh_rng, sample_standard_normal};
use crate::math::vector::{arg_best, mean_of, var_of, Vector};

/// Row-major two-dimensional `f64` container.
///
/// The backing buffer is the only storage: `m[(r, c)]`, `row()` and the
/// [`Elementwise`] slice all read and write the same memory. Every row has
/// `cols` elements; a matrix with zero rows has shape `(0, cols)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixRepr", into = "MatrixRepr")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

/// On-disk form; validated on the way back in.
#[derive(Serialize, Deserialize)]
struct MatrixRepr {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl TryFrom<MatrixRepr> for Matrix {
    type Error = NnError;

    fn try_from(repr: MatrixRepr) -> Result<Matrix> {
        Matrix::new(repr.rows, repr.cols, repr.data)
    }
}

impl From<Matrix> for MatrixRepr {
    fn from(m: Matrix) -> Self {
        MatrixRepr { rows: m.rows, cols: m.cols, data: m.data }
    }
}

impl Matrix {
    /// Wraps a row-major buffer; `data.len()` must equal `rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Matrix> {
        if data.len() != rows * cols {
            return Err(NnError::InvalidConstruction(format!(
                "{} values cannot fill a {rows}x{cols} matrix",
                data.len()
            )));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Builds a matrix from equal-length rows. Jagged input fails fast.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Matrix> {
        let cols = rows.first().map_or(0, Vec::len);
        let n = rows.len();
        let mut data = Vec::with_capacity(n * cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != cols {
                return Err(NnError::InvalidConstruction(format!(
                    "row {i} has {} columns, expected {cols}",
                    row.len()
                )));
            }
            data.extend(row);
        }
        Ok(Matrix { rows: n, cols, data })
    }

    pub fn from_vectors(rows: &[Vector]) -> Result<Matrix> {
        Matrix::from_rows(rows.iter().map(|v| v.values().to_vec()).collect())
    }

    /// Single-column matrix, one row per value.
    pub fn column_from(values: &[f64]) -> Matrix {
        Matrix { rows: values.len(), cols: 1, data: values.to_vec() }
    }

    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix::filled(rows, cols, 0.0)
    }

    pub fn ones(rows: usize, cols: usize) -> Matrix {
        Matrix::filled(rows, cols, 1.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix { rows, cols, data: vec![value; rows * cols] }
    }

    pub fn identity(n: usize) -> Matrix {
        let mut res = Matrix::zeros(n, n);
        for i in 0..n {
            res[(i, i)] = 1.0;
        }
        res
    }

    /// Uniform samples on [0, 1).
    pub fn rand(rows: usize, cols: usize) -> Matrix {
        Matrix::rand_with(rows, cols, &mut fresh_rng())
    }

    pub fn rand_with<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let data = (0..rows * cols).map(|_| rng.gen::<f64>()).collect();
        Matrix { rows, cols, data }
    }

    /// Standard normal samples (Box-Muller).
    pub fn randn(rows: usize, cols: usize) -> Matrix {
        Matrix::randn_with(rows, cols, &mut fresh_rng())
    }

    pub fn randn_with<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let data = (0..rows * cols).map(|_| sample_standard_normal(rng)).collect();
        Matrix { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn row_vector(&self, i: usize) -> Vector {
        Vector::new(self.row(i).to_vec())
    }

    pub fn column(&self, j: usize) -> Vector {
        Vector::new((0..self.rows).map(|i| self[(i, j)]).collect())
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.iter_rows().map(<[f64]>::to_vec).collect()
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                res[(j, i)] = self[(i, j)];
            }
        }
        res
    }

    /// Standard matrix product; requires `self.cols == other.rows`.
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix> {
        Executor::Serial.matmul(self, other)
    }

    pub fn matmul_with(&self, other: &Matrix, executor: &Executor) -> Result<Matrix> {
        executor.matmul(self, other)
    }

    /// Axis 0 sums down each column (length `cols`); axis 1 sums across each
    /// row (length `rows`).
    pub fn sum_axis(&self, axis: usize) -> Result<Vector> {
        Ok(Vector::new(self.lanes(axis)?.iter().map(|lane| lane.iter().sum()).collect()))
    }

    pub fn mean_all(&self) -> f64 {
        mean_of(&self.data)
    }

    pub fn var_all(&self, ddof: usize) -> f64 {
        var_of(&self.data, ddof)
    }

    pub fn std_all(&self, ddof: usize) -> f64 {
        self.var_all(ddof).sqrt()
    }

    pub fn mean_axis(&self, axis: usize) -> Result<Vector> {
        Ok(Vector::new(self.lanes(axis)?.iter().map(|lane| mean_of(lane)).collect()))
    }

    pub fn var_axis(&self, axis: usize, ddof: usize) -> Result<Vector> {
        Ok(Vector::new(self.lanes(axis)?.iter().map(|lane| var_of(lane, ddof)).collect()))
    }

    pub fn std_axis(&self, axis: usize, ddof: usize) -> Result<Vector> {
        Ok(self.var_axis(axis, ddof)?.map(f64::sqrt))
    }

    /// Per-lane argmax. Axis 1 gives one index per row.
    pub fn argmax_axis(&self, axis: usize) -> Result<Vec<usize>> {
        self.arg_axis(axis, |candidate, best| candidate > best)
    }

    pub fn argmin_axis(&self, axis: usize) -> Result<Vec<usize>> {
        self.arg_axis(axis, |candidate, best| candidate < best)
    }

    fn arg_axis<F>(&self, axis: usize, better: F) -> Result<Vec<usize>>
    where
        F: Fn(f64, f64) -> bool + Copy,
    {
        self.lanes(axis)?
            .iter()
            .map(|lane| {
                arg_best(lane, better).ok_or_else(|| {
                    NnError::InvalidArgument(format!("argmax/argmin over an empty axis {axis}"))
                })
            })
            .collect()
    }

    fn lanes(&self, axis: usize) -> Result<Vec<Vec<f64>>> {
        match axis {
            0 => Ok((0..self.cols).map(|j| self.column(j).into_inner()).collect()),
            1 => Ok(self.to_rows()),
            _ => Err(NnError::InvalidArgument(format!("axis must be 0 or 1, got {axis}"))),
        }
    }

    /// Axis 0 stacks `other` below `self`; axis 1 places it to the right.
    pub fn concat(&self, other: &Matrix, axis: usize) -> Result<Matrix> {
        match axis {
            0 => {
                // A (0, 0) operand is the empty accumulator and matches anything.
                let untyped = |m: &Matrix| m.rows == 0 && m.cols == 0;
                if self.cols != other.cols && !untyped(self) && !untyped(other) {
                    return Err(NnError::shape("concat(axis=0)", self.shape(), other.shape()));
                }
                if self.rows == 0 {
                    return Ok(other.clone());
                }
                if other.rows == 0 {
                    return Ok(self.clone());
                }
                let mut data = self.data.clone();
                data.extend_from_slice(&other.data);
                Ok(Matrix { rows: self.rows + other.rows, cols: self.cols, data })
            }
            1 => {
                if self.rows != other.rows {
                    return Err(NnError::shape("concat(axis=1)", self.shape(), other.shape()));
                }
                let cols = self.cols + other.cols;
                let mut data = Vec::with_capacity(self.rows * cols);
                for i in 0..self.rows {
                    data.extend_from_slice(self.row(i));
                    data.extend_from_slice(other.row(i));
                }
                Ok(Matrix { rows: self.rows, cols, data })
            }
            _ => Err(NnError::InvalidArgument(format!("axis must be 0 or 1, got {axis}"))),
        }
    }

    /// Appends a constant column of ones (bias augmentation).
    pub fn with_bias_column(&self) -> Matrix {
        let cols = self.cols + 1;
        let mut data = Vec::with_capacity(self.rows * cols);
        for row in self.iter_rows() {
            data.extend_from_slice(row);
            data.push(1.0);
        }
        Matrix { rows: self.rows, cols, data }
    }

    /// Drops the last column; undoes [`Matrix::with_bias_column`].
    pub fn without_last_column(&self) -> Matrix {
        let cols = self.cols.saturating_sub(1);
        let mut data = Vec::with_capacity(self.rows * cols);
        for row in self.iter_rows() {
            data.extend_from_slice(&row[..cols]);
        }
        Matrix { rows: self.rows, cols, data }
    }

    /// Gathers the listed rows, in order.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Matrix> {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            if i >= self.rows {
                return Err(NnError::InvalidArgument(format!(
                    "row index {i} out of range for {} rows",
                    self.rows
                )));
            }
            data.extend_from_slice(self.row(i));
        }
        Ok(Matrix { rows: indices.len(), cols: self.cols, data })
    }

    /// Top-left block of at most `rows x cols`.
    pub fn truncate(&self, rows: usize, cols: usize) -> Matrix {
        let rows = rows.min(self.rows);
        let cols = cols.min(self.cols);
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            data.extend_from_slice(&self.row(i)[..cols]);
        }
        Matrix { rows, cols, data }
    }

    /// Copies `self` into the top-left corner of a zero matrix of the given
    /// shape. The target must be at least as large on both axes.
    pub fn zero_padded(&self, rows: usize, cols: usize) -> Result<Matrix> {
        if rows < self.rows || cols < self.cols {
            return Err(NnError::shape("zero_padded", self.shape(), (rows, cols)));
        }
        let mut res = Matrix::zeros(rows, cols);
        for i in 0..self.rows {
            res.row_mut(i)[..self.cols].copy_from_slice(self.row(i));
        }
        Ok(res)
    }
}

impl Elementwise for Matrix {
    fn dims(&self) -> (usize, usize) {
        self.shape()
    }

    fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        assert!(c < self.cols, "column {c} out of range for {} columns", self.cols);
        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        assert!(c < self.cols, "column {c} out of range for {} columns", self.cols);
        &mut self.data[r * self.cols + c]
    }
}

/// Free-function form of [`Matrix::concat`].
pub fn concat(a: &Matrix, b: &Matrix, axis: usize) -> Result<Matrix> {
    a.concat(b, axis)
}
