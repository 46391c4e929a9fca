use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loss::loss_function::{check_shapes, per_example, LossFunction};
use crate::math::matrix::Matrix;

/// Quadratic for |e| ≤ δ, linear beyond.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HuberLoss {
    pub delta: f64,
}

impl Default for HuberLoss {
    fn default() -> Self {
        HuberLoss { delta: 1.0 }
    }
}

impl LossFunction for HuberLoss {
    /// h(e) = 0.5·e²          if |e| ≤ δ
    ///        δ·(|e| − 0.5·δ)  otherwise
    /// gradient = e  if |e| ≤ δ,  else δ·sign(e)
    fn forward(&self, prediction: &Matrix, target: &Matrix) -> Result<(Matrix, Matrix)> {
        check_shapes("huber loss", prediction, target)?;
        let delta = self.delta;
        let (rows, cols) = prediction.shape();
        let mut elementwise = Matrix::zeros(rows, cols);
        let mut gradient = Matrix::zeros(rows, cols);

        for i in 0..rows {
            for j in 0..cols {
                let e = prediction[(i, j)] - target[(i, j)];
                if e.abs() <= delta {
                    elementwise[(i, j)] = 0.5 * e * e;
                    gradient[(i, j)] = e;
                } else {
                    elementwise[(i, j)] = delta * (e.abs() - 0.5 * delta);
                    gradient[(i, j)] = delta * e.signum();
                }
            }
        }

        Ok((per_example(&elementwise), gradient))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_then_linear() {
        let p = Matrix::from_rows(vec![vec![0.5], vec![3.0], vec![-4.0]]).unwrap();
        let t = Matrix::zeros(3, 1);
        let (loss, grad) = HuberLoss::default().forward(&p, &t).unwrap();

        assert_eq!(loss.column(0).values(), &[0.125, 2.5, 3.5]);
        assert_eq!(grad.column(0).values(), &[0.5, 1.0, -1.0]);
    }

    #[test]
    fn delta_is_configurable() {
        let p = Matrix::from_rows(vec![vec![3.0]]).unwrap();
        let (loss, grad) = HuberLoss { delta: 2.0 }.forward(&p, &Matrix::zeros(1, 1)).unwrap();
        assert_eq!(loss[(0, 0)], 4.0);
        assert_eq!(grad[(0, 0)], 2.0);
    }
}
