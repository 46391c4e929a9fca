use serde::{Deserialize, Serialize};

use crate::math::elementwise::Elementwise;
use crate::math::matrix::Matrix;

/// Element-wise activation, resolved once when a layer is built.
///
/// Every variant is a pure function of its input: `forward` returns the
/// activated matrix together with the local derivative ∂a/∂z, both shaped
/// like `z`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivationFunction {
    Sigmoid,
    Tanh,
    /// Subgradient at exactly zero is taken as 0.
    #[serde(rename = "relu")]
    ReLU,
    #[serde(rename = "leaky_relu")]
    LeakyReLU { alpha: f64 },
    Elu { alpha: f64 },
    Swish,
}

impl ActivationFunction {
    /// `LeakyReLU` with the conventional slope of 0.01.
    pub fn leaky_relu() -> ActivationFunction {
        ActivationFunction::LeakyReLU { alpha: 0.01 }
    }

    pub fn elu() -> ActivationFunction {
        ActivationFunction::Elu { alpha: 1.0 }
    }

    pub fn forward(&self, z: &Matrix) -> (Matrix, Matrix) {
        let activated = z.map(|x| self.function(x));
        let derivative = match self {
            // Both derive cheaply from the forward output.
            ActivationFunction::Sigmoid => activated.map(|s| s * (1.0 - s)),
            ActivationFunction::Tanh => activated.map(|t| 1.0 - t * t),
            _ => z.map(|x| self.derivative(x)),
        };
        (activated, derivative)
    }

    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => sigmoid(x),
            ActivationFunction::Tanh => x.tanh(),
            ActivationFunction::ReLU => if x > 0.0 { x } else { 0.0 },
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { x } else { alpha * x },
            ActivationFunction::Elu { alpha } => {
                if x > 0.0 { x } else { alpha * (x.exp() - 1.0) }
            }
            ActivationFunction::Swish => x * sigmoid(x),
        }
    }

    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            ActivationFunction::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationFunction::ReLU => if x > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::LeakyReLU { alpha } => if x > 0.0 { 1.0 } else { *alpha },
            ActivationFunction::Elu { alpha } => {
                if x > 0.0 { 1.0 } else { alpha * x.exp() }
            }
            ActivationFunction::Swish => {
                let s = sigmoid(x);
                s * (1.0 + x * (1.0 - s))
            }
        }
    }
}

/// Logistic function, split on sign so large negative inputs do not overflow.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
