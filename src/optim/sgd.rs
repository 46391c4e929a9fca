use crate::error::Result;
use crate::layers::Layer;
use crate::math::elementwise::Elementwise;
use crate::math::matrix::Matrix;

/// Stochastic gradient descent with optional momentum and L2 weight decay.
///
/// One step on a dense layer with weights `W` and gradient `g`:
///
/// ```text
/// g' = g + weight_decay·W
/// v  = momentum·v + g'        (only when momentum > 0)
/// W ← W − learning_rate·v     (or g' without momentum)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sgd {
    pub learning_rate: f64,
    pub momentum: f64,
    pub weight_decay: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, momentum: 0.0, weight_decay: 0.0 }
    }

    /// Same coefficients, different learning rate. Used by the scheduler.
    pub fn with_learning_rate(&self, learning_rate: f64) -> Sgd {
        Sgd { learning_rate, ..*self }
    }

    /// Applies one update to `layer`. Weightless layers are left alone.
    pub fn step(&self, layer: &mut Layer, gradient: Matrix) -> Result<()> {
        let Layer::Dense(dense) = layer else {
            return Ok(());
        };

        let mut gradient = gradient;
        if self.weight_decay > 0.0 {
            if let Some(weights) = dense.weights() {
                gradient.add_inplace(&weights.scale(self.weight_decay))?;
            }
        }

        if self.momentum > 0.0 {
            let velocity = match dense.velocity_mut().take() {
                Some(mut v) if v.shape() == gradient.shape() => {
                    v.scale_inplace(self.momentum);
                    v.add_inplace(&gradient)?;
                    v
                }
                _ => gradient,
            };
            dense.update_weights(&velocity, self.learning_rate)?;
            *dense.velocity_mut() = Some(velocity);
            return Ok(());
        }

        dense.update_weights(&gradient, self.learning_rate)
    }
}

/// Rescales `gradient` in place so its L2 norm is at most `max_norm`.
/// Returns the norm before clipping. `max_norm <= 0` disables clipping.
pub fn clip_by_norm(gradient: &mut Matrix, max_norm: f64) -> f64 {
    let norm = gradient.l2_norm();
    if max_norm > 0.0 && norm > max_norm {
        gradient.scale_inplace(max_norm / norm);
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Dense, Dropout};
    use approx::assert_abs_diff_eq;

    fn single_weight_layer(w: f64) -> Layer {
        let mut dense = Dense::new(1, None);
        dense.set_weights(Matrix::from_rows(vec![vec![w]]).unwrap()).unwrap();
        Layer::Dense(dense)
    }

    fn weight(layer: &Layer) -> f64 {
        layer.weights().unwrap()[(0, 0)]
    }

    #[test]
    fn plain_step() {
        let mut layer = single_weight_layer(1.0);
        Sgd::new(0.5).step(&mut layer, Matrix::filled(1, 1, 1.0)).unwrap();
        assert_abs_diff_eq!(weight(&layer), 0.5);
    }

    #[test]
    fn momentum_accumulates_velocity() {
        let mut layer = single_weight_layer(0.0);
        let opt = Sgd { learning_rate: 0.1, momentum: 0.9, weight_decay: 0.0 };

        opt.step(&mut layer, Matrix::filled(1, 1, 1.0)).unwrap();
        assert_abs_diff_eq!(weight(&layer), -0.1, epsilon = 1e-12);

        // v = 0.9·1 + 1 = 1.9
        opt.step(&mut layer, Matrix::filled(1, 1, 1.0)).unwrap();
        assert_abs_diff_eq!(weight(&layer), -0.1 - 0.19, epsilon = 1e-12);
    }

    #[test]
    fn weight_decay_pulls_towards_zero() {
        let mut layer = single_weight_layer(2.0);
        let opt = Sgd { learning_rate: 0.1, momentum: 0.0, weight_decay: 0.5 };
        opt.step(&mut layer, Matrix::zeros(1, 1)).unwrap();
        // W ← 2 − 0.1·(0 + 0.5·2)
        assert_abs_diff_eq!(weight(&layer), 1.9, epsilon = 1e-12);
    }

    #[test]
    fn weightless_layers_are_skipped() {
        let mut layer = Layer::Dropout(Dropout::new(0.2).unwrap());
        assert!(Sgd::new(0.1).step(&mut layer, Matrix::zeros(1, 1)).is_ok());
    }

    #[test]
    fn clipping_bounds_the_norm() {
        let mut g = Matrix::from_rows(vec![vec![3.0, 4.0]]).unwrap();
        let before = clip_by_norm(&mut g, 1.0);
        assert_abs_diff_eq!(before, 5.0);
        assert_abs_diff_eq!(g.l2_norm(), 1.0, epsilon = 1e-12);

        let mut small = Matrix::from_rows(vec![vec![0.3, 0.4]]).unwrap();
        clip_by_norm(&mut small, 1.0);
        assert_eq!(small.row(0), &[0.3, 0.4]);

        clip_by_norm(&mut g, 0.0);
        assert_abs_diff_eq!(g.l2_norm(), 1.0, epsilon = 1e-12);
    }
}
