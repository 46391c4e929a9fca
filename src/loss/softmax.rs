use crate::error::Result;
use crate::loss::cross_entropy::EPS;
use crate::loss::loss_function::{check_shapes, mean_loss, per_example, LossFunction};
use crate::math::elementwise::Elementwise;
use crate::math::matrix::Matrix;

/// Softmax output fused with cross-entropy.
///
/// The model's last layer emits raw scores; the combined gradient with
/// respect to those scores simplifies to `softmax(o) − t`, so the output
/// layer should carry no activation of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftmaxLoss;

impl LossFunction for SoftmaxLoss {
    fn forward(&self, prediction: &Matrix, target: &Matrix) -> Result<(Matrix, Matrix)> {
        check_shapes("softmax loss", prediction, target)?;
        let probs = softmax_rows(prediction);
        let loss = cross_entropy_rows(&probs, target)?;
        let gradient = probs.subtract(target)?;
        Ok((loss, gradient))
    }

    /// −mean over examples of Σ t·ln|p|, on already-normalized predictions.
    fn batch_loss(&self, target: &Matrix, prediction: &Matrix) -> Result<f64> {
        check_shapes("softmax loss", prediction, target)?;
        Ok(mean_loss(&cross_entropy_rows(&prediction.abs(), target)?))
    }

    fn inference_transform(&self, raw: &Matrix) -> Matrix {
        softmax_rows(raw)
    }
}

/// Row-wise softmax, shifted by the row maximum for stability.
pub fn softmax_rows(raw: &Matrix) -> Matrix {
    let mut out = raw.clone();
    for i in 0..out.rows() {
        let row = out.row_mut(i);
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut total = 0.0;
        for x in row.iter_mut() {
            *x = (*x - max).exp();
            total += *x;
        }
        for x in row.iter_mut() {
            *x /= total;
        }
    }
    out
}

fn cross_entropy_rows(probs: &Matrix, target: &Matrix) -> Result<Matrix> {
    let mut elementwise = probs.map(|p| p.max(EPS).ln());
    elementwise.multiply_inplace(target)?;
    elementwise.scale_inplace(-1.0);
    Ok(per_example(&elementwise))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::random::seeded_rng;
    use approx::assert_abs_diff_eq;

    #[test]
    fn inference_rows_sum_to_one() {
        let mut rng = seeded_rng(5);
        let raw = Matrix::randn_with(16, 6, &mut rng).scale(20.0);
        let probs = SoftmaxLoss.inference_transform(&raw);
        for row in probs.iter_rows() {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn gradient_is_softmax_minus_target() {
        let raw = Matrix::from_rows(vec![vec![0.0, 0.0]]).unwrap();
        let t = Matrix::from_rows(vec![vec![1.0, 0.0]]).unwrap();
        let (loss, grad) = SoftmaxLoss.forward(&raw, &t).unwrap();

        assert_abs_diff_eq!(grad[(0, 0)], -0.5);
        assert_abs_diff_eq!(grad[(0, 1)], 0.5);
        assert_abs_diff_eq!(loss[(0, 0)], 2f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn batch_loss_uses_probabilities_directly() {
        let p = Matrix::from_rows(vec![vec![0.25, 0.75], vec![0.5, 0.5]]).unwrap();
        let t = Matrix::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let expected = -(0.75f64.ln() + 0.5f64.ln()) / 2.0;
        assert_abs_diff_eq!(SoftmaxLoss.batch_loss(&t, &p).unwrap(), expected, epsilon = 1e-12);
    }
}
