use crate::error::Result;
use crate::loss::loss_function::{check_shapes, per_example, LossFunction};
use crate::math::elementwise::Elementwise;
use crate::math::matrix::Matrix;

/// Half sum of squared errors per example. The regression default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquareLoss;

impl LossFunction for SquareLoss {
    /// loss = 0.5·Σ(p − t)², gradient = p − t
    fn forward(&self, prediction: &Matrix, target: &Matrix) -> Result<(Matrix, Matrix)> {
        check_shapes("square loss", prediction, target)?;
        let diff = prediction.subtract(target)?;
        let loss = per_example(&diff.map(|e| 0.5 * e * e));
        Ok((loss, diff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn loss_and_gradient() {
        let p = Matrix::from_rows(vec![vec![1.0, 2.0], vec![0.0, 0.0]]).unwrap();
        let t = Matrix::from_rows(vec![vec![0.0, 0.0], vec![0.0, 3.0]]).unwrap();
        let (loss, grad) = SquareLoss.forward(&p, &t).unwrap();

        assert_eq!(loss.shape(), (2, 1));
        assert_abs_diff_eq!(loss[(0, 0)], 2.5);
        assert_abs_diff_eq!(loss[(1, 0)], 4.5);
        assert_eq!(grad, p.subtract(&t).unwrap());
        assert_abs_diff_eq!(SquareLoss.batch_loss(&t, &p).unwrap(), 3.5);
    }

    #[test]
    fn mismatched_shapes_fail() {
        assert!(SquareLoss.forward(&Matrix::zeros(2, 1), &Matrix::zeros(2, 2)).is_err());
    }
}
