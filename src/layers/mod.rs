pub mod dense;
pub mod dropout;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::executor::Executor;
use crate::math::matrix::Matrix;

pub use dense::Dense;
pub use dropout::Dropout;

/// One entry of a model's layer stack.
///
/// `Dense` is the trainable path; `Dropout` carries no weights and only
/// changes behaviour between training and inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Layer {
    Dense(Dense),
    Dropout(Dropout),
}

impl Layer {
    /// `input` already carries the bias column.
    pub fn forward<R: Rng + ?Sized>(
        &mut self,
        input: &Matrix,
        rng: &mut R,
        executor: &Executor,
    ) -> Result<(Matrix, Matrix)> {
        match self {
            Layer::Dense(dense) => dense.forward(input, rng, executor),
            Layer::Dropout(dropout) => dropout.forward(input, rng),
        }
    }

    pub fn weights(&self) -> Option<&Matrix> {
        match self {
            Layer::Dense(dense) => dense.weights(),
            Layer::Dropout(_) => None,
        }
    }

    /// No-op for weightless layers.
    pub fn set_weights(&mut self, weights: Option<Matrix>) -> Result<()> {
        match (self, weights) {
            (Layer::Dense(dense), Some(w)) => dense.set_weights(w),
            _ => Ok(()),
        }
    }

    pub fn update_weights(&mut self, gradient: &Matrix, learning_rate: f64) -> Result<()> {
        match self {
            Layer::Dense(dense) => dense.update_weights(gradient, learning_rate),
            Layer::Dropout(_) => Ok(()),
        }
    }

    /// Output width, once known.
    pub fn size(&self) -> Option<usize> {
        match self {
            Layer::Dense(dense) => Some(dense.size()),
            Layer::Dropout(dropout) => dropout.size(),
        }
    }

    pub fn num_params(&self) -> usize {
        match self {
            Layer::Dense(dense) => dense.num_params(),
            Layer::Dropout(_) => 0,
        }
    }

    pub fn set_training(&mut self, training: bool) {
        if let Layer::Dropout(dropout) = self {
            dropout.set_training(training);
        }
    }

    pub(crate) fn materialize<R: Rng + ?Sized>(&mut self, input_dim: usize, rng: &mut R) -> Result<()> {
        match self {
            Layer::Dense(dense) => dense.materialize(input_dim, rng),
            Layer::Dropout(dropout) => dropout.materialize(input_dim),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Layer::Dense(_) => "dense",
            Layer::Dropout(_) => "dropout",
        }
    }
}

impl From<Dense> for Layer {
    fn from(layer: Dense) -> Self {
        Layer::Dense(layer)
    }
}

impl From<Dropout> for Layer {
    fn from(layer: Dropout) -> Self {
        Layer::Dropout(layer)
    }
}
