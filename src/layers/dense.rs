use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::math::elementwise::Elementwise;
use crate::math::executor::Executor;
use crate::math::matrix::Matrix;

/// Fully connected layer with the bias folded into the weights.
///
/// `weights` has shape `(input_dim + 1, units)`: the last row is the bias.
/// The caller appends a column of ones to every input before `forward`; the
/// layer never adds the bias itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    units: usize,
    input_dim: Option<usize>,
    activation: Option<ActivationFunction>,
    weights: Option<Matrix>,
    /// Momentum buffer owned by the optimizer; not persisted.
    #[serde(skip)]
    velocity: Option<Matrix>,
}

impl Dense {
    /// A layer whose weights are created on the first forward pass.
    pub fn new(units: usize, activation: Option<ActivationFunction>) -> Dense {
        Dense { units, input_dim: None, activation, weights: None, velocity: None }
    }

    /// A layer materialized immediately for a known input width.
    pub fn with_input_dim<R: Rng + ?Sized>(
        units: usize,
        input_dim: usize,
        activation: Option<ActivationFunction>,
        rng: &mut R,
    ) -> Dense {
        let mut layer = Dense::new(units, activation);
        layer.weights = Some(init_weights(input_dim, units, rng));
        layer.input_dim = Some(input_dim);
        layer
    }

    pub fn size(&self) -> usize {
        self.units
    }

    pub fn input_dim(&self) -> Option<usize> {
        self.input_dim
    }

    pub fn activation(&self) -> Option<ActivationFunction> {
        self.activation
    }

    pub fn num_params(&self) -> usize {
        self.weights.as_ref().map_or(0, |w| w.rows() * w.cols())
    }

    /// Creates the weights for `input_dim` if they do not exist yet. A layer
    /// that already has a different input width is an error.
    pub fn materialize<R: Rng + ?Sized>(&mut self, input_dim: usize, rng: &mut R) -> Result<()> {
        match self.input_dim {
            Some(existing) if existing != input_dim => Err(NnError::InvalidArgument(format!(
                "dense layer expects {existing} inputs, predecessor provides {input_dim}"
            ))),
            Some(_) => Ok(()),
            None => {
                self.weights = Some(init_weights(input_dim, self.units, rng));
                self.input_dim = Some(input_dim);
                Ok(())
            }
        }
    }

    /// `input` is `(n, input_dim + 1)` with the bias column already appended.
    /// Returns the activated output and its local derivative, both `(n, units)`.
    pub fn forward<R: Rng + ?Sized>(
        &mut self,
        input: &Matrix,
        rng: &mut R,
        executor: &Executor,
    ) -> Result<(Matrix, Matrix)> {
        if input.cols() == 0 {
            return Err(NnError::InvalidArgument(
                "dense input must include the bias column".to_owned(),
            ));
        }
        self.materialize(input.cols() - 1, rng)?;
        let weights = self.weights.as_ref().ok_or_else(|| {
            NnError::InvalidArgument("dense layer has no weights".to_owned())
        })?;

        let z = input.matmul_with(weights, executor)?;
        Ok(match self.activation {
            Some(act) => act.forward(&z),
            None => {
                let ones = Matrix::ones(z.rows(), z.cols());
                (z, ones)
            }
        })
    }

    pub fn weights(&self) -> Option<&Matrix> {
        self.weights.as_ref()
    }

    /// Replaces the weights wholesale. An unmaterialized layer adopts
    /// `rows − 1` as its input width.
    pub fn set_weights(&mut self, weights: Matrix) -> Result<()> {
        if weights.cols() != self.units || weights.rows() == 0 {
            return Err(NnError::shape("set_weights", self.expected_shape(), weights.shape()));
        }
        if let Some(input_dim) = self.input_dim {
            if weights.rows() != input_dim + 1 {
                return Err(NnError::shape("set_weights", self.expected_shape(), weights.shape()));
            }
        }
        self.input_dim = Some(weights.rows() - 1);
        self.weights = Some(weights);
        self.velocity = None;
        Ok(())
    }

    /// Plain gradient step: W ← W − lr·gradient.
    pub fn update_weights(&mut self, gradient: &Matrix, learning_rate: f64) -> Result<()> {
        let weights = self.weights.as_mut().ok_or_else(|| {
            NnError::InvalidArgument("cannot update an unmaterialized dense layer".to_owned())
        })?;
        weights.zip_with_inplace(gradient, "update_weights", |w, g| w - learning_rate * g)
    }

    pub(crate) fn velocity_mut(&mut self) -> &mut Option<Matrix> {
        &mut self.velocity
    }

    fn expected_shape(&self) -> (usize, usize) {
        (self.input_dim.map_or(0, |d| d + 1), self.units)
    }
}

/// He-scaled Gaussian weight block with a small Gaussian bias row.
fn init_weights<R: Rng + ?Sized>(input_dim: usize, units: usize, rng: &mut R) -> Matrix {
    let scale = (2.0 / (input_dim + units) as f64).sqrt();
    let mut weights = Matrix::randn_with(input_dim + 1, units, rng);
    for i in 0..=input_dim {
        let factor = if i < input_dim { scale } else { 0.01 };
        for w in weights.row_mut(i) {
            *w *= factor;
        }
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::random::seeded_rng;

    #[test]
    fn lazy_materialization_uses_observed_width() {
        let mut rng = seeded_rng(0);
        let mut layer = Dense::new(4, Some(ActivationFunction::Tanh));
        assert!(layer.weights().is_none());

        let x = Matrix::ones(5, 3).with_bias_column();
        let (out, deriv) = layer.forward(&x, &mut rng, &Executor::Serial).unwrap();

        assert_eq!(layer.input_dim(), Some(3));
        assert_eq!(layer.weights().unwrap().shape(), (4, 4));
        assert_eq!(out.shape(), (5, 4));
        assert_eq!(deriv.shape(), (5, 4));
        assert_eq!(layer.num_params(), 16);
    }

    #[test]
    fn rejects_inputs_of_a_different_width() {
        let mut rng = seeded_rng(0);
        let mut layer = Dense::with_input_dim(2, 3, None, &mut rng);
        let x = Matrix::ones(1, 5).with_bias_column();
        assert!(layer.forward(&x, &mut rng, &Executor::Serial).is_err());
    }

    #[test]
    fn identity_weights_with_zero_bias_pass_input_through() {
        let mut rng = seeded_rng(0);
        let mut layer = Dense::new(3, None);
        let weights = Matrix::identity(3).concat(&Matrix::zeros(1, 3), 0).unwrap();
        layer.set_weights(weights).unwrap();

        let x = Matrix::from_rows(vec![vec![1.5, -2.0, 0.25], vec![0.0, 7.0, -3.0]]).unwrap();
        let (out, deriv) = layer.forward(&x.with_bias_column(), &mut rng, &Executor::Serial).unwrap();

        assert_eq!(out, x);
        assert_eq!(deriv, Matrix::ones(2, 3));
    }

    #[test]
    fn update_is_plain_sgd() {
        let mut layer = Dense::new(1, None);
        layer.set_weights(Matrix::from_rows(vec![vec![1.0], vec![0.5]]).unwrap()).unwrap();
        let grad = Matrix::from_rows(vec![vec![2.0], vec![-1.0]]).unwrap();

        layer.update_weights(&grad, 0.1).unwrap();

        let w = layer.weights().unwrap();
        assert!((w[(0, 0)] - 0.8).abs() < 1e-12);
        assert!((w[(1, 0)] - 0.6).abs() < 1e-12);
        assert!(layer.update_weights(&Matrix::zeros(3, 1), 0.1).is_err());
    }

    #[test]
    fn set_weights_validates_shape() {
        let mut rng = seeded_rng(0);
        let mut layer = Dense::with_input_dim(2, 3, None, &mut rng);
        assert!(layer.set_weights(Matrix::zeros(4, 3)).is_err());
        assert!(layer.set_weights(Matrix::zeros(3, 2)).is_err());
        assert!(layer.set_weights(Matrix::zeros(4, 2)).is_ok());
    }

    #[test]
    fn initial_bias_row_is_small() {
        let mut rng = seeded_rng(9);
        let layer = Dense::with_input_dim(64, 32, None, &mut rng);
        let w = layer.weights().unwrap();
        let bias = w.row(32);
        assert!(bias.iter().all(|b| b.abs() < 0.1));
        assert_eq!(w.shape(), (33, 64));
    }
}
