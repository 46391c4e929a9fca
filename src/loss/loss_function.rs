use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

/// Maps a batch of predictions and targets to a per-example loss and the
/// gradient of that loss with respect to the prediction.
///
/// Rows are examples. `forward` returns a `(n, 1)` loss column and a gradient
/// shaped like `prediction`.
pub trait LossFunction {
    fn forward(&self, prediction: &Matrix, target: &Matrix) -> Result<(Matrix, Matrix)>;

    /// Mean per-example loss of inference-space predictions (the output of
    /// [`LossFunction::inference_transform`]). Zero for an empty batch.
    fn batch_loss(&self, target: &Matrix, prediction: &Matrix) -> Result<f64> {
        let (loss, _) = self.forward(prediction, target)?;
        Ok(mean_loss(&loss))
    }

    /// Output-only transform applied by `Model::predict`.
    fn inference_transform(&self, raw: &Matrix) -> Matrix {
        raw.clone()
    }
}

pub(crate) fn check_shapes(op: &'static str, prediction: &Matrix, target: &Matrix) -> Result<()> {
    if prediction.shape() != target.shape() {
        return Err(NnError::shape(op, prediction.shape(), target.shape()));
    }
    Ok(())
}

/// Collapses an element-wise loss matrix into a `(n, 1)` per-example column.
pub(crate) fn per_example(elementwise: &Matrix) -> Matrix {
    let sums: Vec<f64> = elementwise.iter_rows().map(|row| row.iter().sum()).collect();
    Matrix::column_from(&sums)
}

pub(crate) fn mean_loss(per_example: &Matrix) -> f64 {
    if per_example.rows() == 0 {
        return 0.0;
    }
    per_example.mean_all()
}
