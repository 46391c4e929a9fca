use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

/// Pivots with magnitude below this are treated as zero.
const PIVOT_EPS: f64 = 1e-12;

impl Matrix {
    /// Determinant by Gaussian elimination with partial pivoting.
    ///
    /// A near-zero pivot means the matrix is singular and `0.0` is returned.
    pub fn determinant(&self) -> Result<f64> {
        self.require_square("determinant")?;

        let n = self.rows();
        let mut a = self.clone();
        let mut det = 1.0;

        for col in 0..n {
            let pivot = pivot_row(&a, col);
            if a[(pivot, col)].abs() < PIVOT_EPS {
                return Ok(0.0);
            }
            if pivot != col {
                swap_rows(&mut a, pivot, col);
                det = -det;
            }
            det *= a[(col, col)];
            for r in col + 1..n {
                let factor = a[(r, col)] / a[(col, col)];
                for c in col..n {
                    a[(r, c)] -= factor * a[(col, c)];
                }
            }
        }

        Ok(det)
    }

    /// Inverse by Gauss-Jordan elimination.
    ///
    /// Returns [`NnError::SingularMatrix`] instead of a numerically meaningless
    /// result when a pivot vanishes.
    pub fn inverse(&self) -> Result<Matrix> {
        self.require_square("inverse")?;

        let n = self.rows();
        let mut a = self.clone();
        let mut inv = Matrix::identity(n);

        for col in 0..n {
            let pivot = pivot_row(&a, col);
            if a[(pivot, col)].abs() < PIVOT_EPS {
                return Err(NnError::SingularMatrix);
            }
            swap_rows(&mut a, pivot, col);
            swap_rows(&mut inv, pivot, col);

            let p = a[(col, col)];
            for c in 0..n {
                a[(col, c)] /= p;
                inv[(col, c)] /= p;
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = a[(r, col)];
                if factor == 0.0 {
                    continue;
                }
                for c in 0..n {
                    a[(r, c)] -= factor * a[(col, c)];
                    inv[(r, c)] -= factor * inv[(col, c)];
                }
            }
        }

        Ok(inv)
    }

    fn require_square(&self, op: &'static str) -> Result<()> {
        if self.rows() != self.cols() {
            return Err(NnError::shape(op, self.shape(), (self.cols(), self.rows())));
        }
        Ok(())
    }
}

/// Row at or below `col` with the largest magnitude in column `col`.
fn pivot_row(a: &Matrix, col: usize) -> usize {
    (col..a.rows())
        .max_by(|&x, &y| a[(x, col)].abs().total_cmp(&a[(y, col)].abs()))
        .unwrap_or(col)
}

fn swap_rows(a: &mut Matrix, x: usize, y: usize) {
    if x == y {
        return;
    }
    for c in 0..a.cols() {
        let tmp = a[(x, c)];
        a[(x, c)] = a[(y, c)];
        a[(y, c)] = tmp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn determinant_of_known_matrices() {
        let a = Matrix::from_rows(vec![vec![4.0, 3.0], vec![6.0, 3.0]]).unwrap();
        assert_abs_diff_eq!(a.determinant().unwrap(), -6.0, epsilon = 1e-12);

        let singular = Matrix::from_rows(vec![vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        assert_eq!(singular.determinant().unwrap(), 0.0);
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let a = Matrix::from_rows(vec![
            vec![2.0, -1.0, 0.0],
            vec![-1.0, 2.0, -1.0],
            vec![0.0, -1.0, 2.0],
        ])
        .unwrap();
        let product = a.inverse().unwrap().matmul(&a).unwrap();
        let id = Matrix::identity(3);
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(product[(i, j)], id[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn singular_and_non_square_inputs_have_no_inverse() {
        let singular = Matrix::from_rows(vec![vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        assert!(matches!(singular.inverse(), Err(NnError::SingularMatrix)));
        assert!(matches!(Matrix::zeros(2, 3).inverse(), Err(NnError::ShapeMismatch { .. })));
    }
}
