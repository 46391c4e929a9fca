use crate::activation::sigmoid;
use crate::error::Result;
use crate::loss::loss_function::{check_shapes, per_example, LossFunction};
use crate::math::elementwise::Elementwise;
use crate::math::matrix::Matrix;

/// Predictions are clamped to [EPS, 1 − EPS] before ln() so the loss stays finite.
pub const EPS: f64 = 1e-15;

/// Cross-entropy over probabilities; inference outputs go through a sigmoid
/// (binary classification convention).
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss;

impl LossFunction for CrossEntropyLoss {
    /// loss = −Σ t·ln(p̂), gradient = p̂ − t, with p̂ the clamped prediction.
    fn forward(&self, prediction: &Matrix, target: &Matrix) -> Result<(Matrix, Matrix)> {
        check_shapes("cross-entropy loss", prediction, target)?;
        let clamped = prediction.map(|p| p.clamp(EPS, 1.0 - EPS));

        let mut elementwise = clamped.ln();
        elementwise.multiply_inplace(target)?;
        elementwise.scale_inplace(-1.0);

        let gradient = clamped.subtract(target)?;
        Ok((per_example(&elementwise), gradient))
    }

    fn inference_transform(&self, raw: &Matrix) -> Matrix {
        raw.map(sigmoid)
    }
}
