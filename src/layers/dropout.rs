use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

/// Inverted dropout.
///
/// Like every layer it receives a bias-augmented input; it strips the bias
/// column, so its output has the same width as the previous layer's. In
/// inference mode it is the identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dropout {
    rate: f64,
    units: Option<usize>,
    #[serde(skip, default = "training_default")]
    training: bool,
}

fn training_default() -> bool {
    true
}

impl Dropout {
    /// `rate` is the probability of zeroing a unit; must be in [0, 1).
    pub fn new(rate: f64) -> Result<Dropout> {
        if !(0.0..1.0).contains(&rate) {
            return Err(NnError::InvalidConfig(format!(
                "dropout rate must be in [0, 1), got {rate}"
            )));
        }
        Ok(Dropout { rate, units: None, training: true })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn size(&self) -> Option<usize> {
        self.units
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn materialize(&mut self, input_dim: usize) -> Result<()> {
        match self.units {
            Some(units) if units != input_dim => Err(NnError::InvalidArgument(format!(
                "dropout layer expects {units} inputs, predecessor provides {input_dim}"
            ))),
            _ => {
                self.units = Some(input_dim);
                Ok(())
            }
        }
    }

    /// Returns the masked input and the mask itself as the local derivative.
    pub fn forward<R: Rng + ?Sized>(&mut self, input: &Matrix, rng: &mut R) -> Result<(Matrix, Matrix)> {
        if input.cols() == 0 {
            return Err(NnError::InvalidArgument(
                "dropout input must include the bias column".to_owned(),
            ));
        }
        let mut out = input.without_last_column();
        self.materialize(out.cols())?;

        if !self.training || self.rate == 0.0 {
            let ones = Matrix::ones(out.rows(), out.cols());
            return Ok((out, ones));
        }

        let keep = 1.0 - self.rate;
        let mut mask = Matrix::zeros(out.rows(), out.cols());
        for i in 0..out.rows() {
            for j in 0..out.cols() {
                if rng.gen::<f64>() < keep {
                    mask[(i, j)] = 1.0 / keep;
                }
                out[(i, j)] *= mask[(i, j)];
            }
        }
        Ok((out, mask))
    }
}
