use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::loss::hinge::HingeLoss;
use crate::loss::huber::HuberLoss;
use crate::loss::loss_function::LossFunction;
use crate::loss::softmax::SoftmaxLoss;
use crate::loss::square::SquareLoss;
use crate::math::matrix::Matrix;

/// Selects which loss function a model trains against. This is the tag
/// written into saved models.
///
/// - `Square`       — half squared error; pair with a linear output. Default.
/// - `CrossEntropy` — clamped cross-entropy; predictions pass through a sigmoid at inference.
/// - `Softmax`      — softmax fused with cross-entropy; the output layer emits raw scores.
/// - `Hinge`        — margin 1.0; targets in {−1, +1}.
/// - `Huber`        — quadratic within `delta`, linear beyond.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LossType {
    #[default]
    Square,
    CrossEntropy,
    Softmax,
    Hinge,
    Huber { delta: f64 },
}

impl LossType {
    /// Huber with δ = 1.0.
    pub fn huber() -> LossType {
        LossType::Huber { delta: HuberLoss::default().delta }
    }

    fn as_loss(&self) -> Box<dyn LossFunction> {
        match *self {
            LossType::Square => Box::new(SquareLoss),
            LossType::CrossEntropy => Box::new(CrossEntropyLoss),
            LossType::Softmax => Box::new(SoftmaxLoss),
            LossType::Hinge => Box::new(HingeLoss),
            LossType::Huber { delta } => Box::new(HuberLoss { delta }),
        }
    }
}

impl LossFunction for LossType {
    fn forward(&self, prediction: &Matrix, target: &Matrix) -> Result<(Matrix, Matrix)> {
        self.as_loss().forward(prediction, target)
    }

    fn batch_loss(&self, target: &Matrix, prediction: &Matrix) -> Result<f64> {
        self.as_loss().batch_loss(target, prediction)
    }

    fn inference_transform(&self, raw: &Matrix) -> Matrix {
        self.as_loss().inference_transform(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_matches_concrete_losses() {
        let p = Matrix::from_rows(vec![vec![0.2, 0.8]]).unwrap();
        let t = Matrix::from_rows(vec![vec![0.0, 1.0]]).unwrap();

        let cases: Vec<(LossType, Box<dyn LossFunction>)> = vec![
            (LossType::Square, Box::new(SquareLoss) as Box<dyn LossFunction>),
            (LossType::CrossEntropy, Box::new(CrossEntropyLoss) as Box<dyn LossFunction>),
            (LossType::Softmax, Box::new(SoftmaxLoss) as Box<dyn LossFunction>),
            (LossType::Hinge, Box::new(HingeLoss) as Box<dyn LossFunction>),
            (LossType::huber(), Box::new(HuberLoss::default()) as Box<dyn LossFunction>),
        ];
        for (tag, concrete) in cases {
            assert_eq!(tag.forward(&p, &t).unwrap(), concrete.forward(&p, &t).unwrap());
            assert_eq!(tag.inference_transform(&p), concrete.inference_transform(&p));
        }
    }

    #[test]
    fn serde_round_trip() {
        let json = serde_json::to_string(&LossType::Huber { delta: 0.5 }).unwrap();
        assert_eq!(json, r#"{"type":"huber","delta":0.5}"#);
        let back: LossType = serde_json::from_str(r#"{"type":"cross_entropy"}"#).unwrap();
        assert_eq!(back, LossType::CrossEntropy);
    }
}
