use crate::error::Result;
use crate::loss::loss_function::{check_shapes, per_example, LossFunction};
use crate::math::matrix::Matrix;

/// Margin (1.0) hinge loss for targets in {−1, +1}.
#[derive(Debug, Clone, Copy, Default)]
pub struct HingeLoss;

impl LossFunction for HingeLoss {
    /// loss = Σ max(0, 1 − t·p); gradient = −t inside the margin, 0 outside.
    fn forward(&self, prediction: &Matrix, target: &Matrix) -> Result<(Matrix, Matrix)> {
        check_shapes("hinge loss", prediction, target)?;
        let (rows, cols) = prediction.shape();
        let mut elementwise = Matrix::zeros(rows, cols);
        let mut gradient = Matrix::zeros(rows, cols);

        for i in 0..rows {
            for j in 0..cols {
                let (p, t) = (prediction[(i, j)], target[(i, j)]);
                let margin = 1.0 - t * p;
                if margin > 0.0 {
                    elementwise[(i, j)] = margin;
                    gradient[(i, j)] = -t;
                }
            }
        }

        Ok((per_example(&elementwise), gradient))
    }
}
