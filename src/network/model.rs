use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::warn;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::layers::Layer;
use crate::loss::{LossFunction, LossType};
use crate::math::elementwise::Elementwise;
use crate::math::executor::Executor;
use crate::math::matrix::Matrix;
use crate::math::random::{fresh_rng, seeded_rng};
use crate::network::spec::{LayerSpec, ModelSpec};
use crate::optim::{clip_by_norm, Sgd};
use crate::train::callbacks::TrainingObserver;
use crate::train::epoch_stats::{TrainReport, TrainingState};
use crate::train::loop_fn::train_loop;
use crate::train::train_config::{TrainConfig, TrainHooks};

const EVAL_BATCH_SIZE: usize = 32;

/// Per-layer weights, `None` for weightless layers.
pub type WeightsSnapshot = Vec<Option<Matrix>>;

/// Everything one forward pass recorded for backprop.
///
/// `activations[i]` is the bias-augmented input of layer `i` and
/// `derivatives[i]` its local derivative. The loss sits at the end of both
/// lists as a virtual final layer: its per-example column (bias-augmented)
/// after the last layer's output, and its gradient after the last local
/// derivative.
#[derive(Debug, Clone)]
pub struct ForwardTrace {
    pub activations: Vec<Matrix>,
    pub derivatives: Vec<Matrix>,
    /// Raw final-layer output, bias stripped.
    pub output: Matrix,
}

impl ForwardTrace {
    pub fn batch_size(&self) -> usize {
        self.output.rows()
    }

    /// Per-example loss column `(n, 1)`.
    pub fn loss(&self) -> Matrix {
        self.activations
            .last()
            .map(Matrix::without_last_column)
            .unwrap_or_default()
    }

    /// Mean per-example loss of the batch.
    pub fn mean_loss(&self) -> f64 {
        let loss = self.loss();
        if loss.rows() == 0 { 0.0 } else { loss.mean_all() }
    }

    pub fn loss_gradient(&self) -> Option<&Matrix> {
        self.derivatives.last()
    }
}

/// A feed-forward stack of layers paired with one loss function.
///
/// Inputs and targets are row-per-example matrices. The model owns its
/// layers, its random generator (weight init, shuffling, dropout masks) and
/// the executor used for matrix products; the last two are not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    input_dim: usize,
    layers: Vec<Layer>,
    loss: LossType,
    /// Truncate mismatched prediction/target columns instead of failing.
    #[serde(default)]
    reconcile_output_shape: bool,
    /// Persisted so a model saved for inference loads in inference mode.
    #[serde(default = "training_default")]
    training: bool,
    #[serde(skip)]
    state: TrainingState,
    #[serde(skip, default = "fresh_rng")]
    rng: StdRng,
    #[serde(skip)]
    executor: Executor,
}

fn training_default() -> bool {
    true
}

impl Model {
    pub fn new(input_dim: usize, loss: LossType) -> Model {
        Model {
            input_dim,
            layers: Vec::new(),
            loss,
            reconcile_output_shape: false,
            training: true,
            state: TrainingState::Idle,
            rng: fresh_rng(),
            executor: Executor::Serial,
        }
    }

    /// Same as [`Model::new`] but with a reproducible generator.
    pub fn with_seed(input_dim: usize, loss: LossType, seed: u64) -> Model {
        Model { rng: seeded_rng(seed), ..Model::new(input_dim, loss) }
    }

    /// Builds and initializes every layer described by `spec`.
    pub fn from_spec(spec: &ModelSpec) -> Result<Model> {
        let mut model = match spec.seed {
            Some(seed) => Model::with_seed(spec.input_dim, spec.loss, seed),
            None => Model::new(spec.input_dim, spec.loss),
        };
        for layer in &spec.layers {
            model.add_layer(layer.build()?)?;
        }
        Ok(model)
    }

    /// Appends a layer, wiring it to its predecessor's width. Dense weights
    /// are created here; a layer that was built for a different width is
    /// rejected.
    pub fn add_layer(&mut self, layer: impl Into<Layer>) -> Result<&mut Self> {
        let mut layer = layer.into();
        let input_dim = self.output_dim();
        layer.materialize(input_dim, &mut self.rng).map_err(|e| {
            NnError::InvalidArgument(format!(
                "cannot add {} layer #{}: {e}",
                layer.kind(),
                self.layers.len()
            ))
        })?;
        layer.set_training(self.training);
        self.layers.push(layer);
        Ok(self)
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Width of the last layer, or the input width for an empty model.
    pub fn output_dim(&self) -> usize {
        self.layers
            .iter()
            .rev()
            .find_map(Layer::size)
            .unwrap_or(self.input_dim)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn loss(&self) -> LossType {
        self.loss
    }

    pub fn num_params(&self) -> usize {
        self.layers.iter().map(Layer::num_params).sum()
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TrainingState) {
        self.state = state;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Switches dropout-like layers between training and inference behaviour.
    pub fn set_training_mode(&mut self, training: bool) {
        self.training = training;
        for layer in &mut self.layers {
            layer.set_training(training);
        }
    }

    pub fn set_executor(&mut self, executor: Executor) {
        self.executor = executor;
    }

    pub fn reconcile_output_shape(&self) -> bool {
        self.reconcile_output_shape
    }

    pub fn set_reconcile_output_shape(&mut self, enabled: bool) {
        self.reconcile_output_shape = enabled;
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = seeded_rng(seed);
    }

    pub(crate) fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Forward pass with loss. `x` is `(n, input_dim)`, `y` is `(n, output_dim)`.
    pub fn compute_layers(&mut self, x: &Matrix, y: &Matrix) -> Result<ForwardTrace> {
        let (mut activations, mut derivatives) = self.forward_layers(x)?;
        let output = activations
            .last()
            .map(Matrix::without_last_column)
            .unwrap_or_default();

        let (loss, gradient) = match self.align_to_target(&output, y)? {
            None => self.loss.forward(&output, y)?,
            Some((prediction, target)) => {
                let (loss, gradient) = self.loss.forward(&prediction, &target)?;
                (loss, gradient.zero_padded(output.rows(), output.cols())?)
            }
        };

        activations.push(loss.with_bias_column());
        derivatives.push(gradient);
        Ok(ForwardTrace { activations, derivatives, output })
    }

    /// Reverse pass over a trace from [`Model::compute_layers`]: applies one
    /// optimizer step per weighted layer. Gradients propagate through the
    /// weights as they were during the forward pass. `clip_norm <= 0`
    /// disables per-layer clipping.
    pub fn backward(&mut self, trace: &ForwardTrace, optimizer: &Sgd, clip_norm: f64) -> Result<()> {
        if trace.derivatives.len() != self.layers.len() + 1
            || trace.activations.len() != self.layers.len() + 2
        {
            return Err(NnError::InvalidArgument(format!(
                "trace has {} derivatives for {} layers",
                trace.derivatives.len(),
                self.layers.len()
            )));
        }

        let scale = 1.0 / trace.batch_size().max(1) as f64;
        let mut running = trace.derivatives[self.layers.len()].clone();

        for i in (0..self.layers.len()).rev() {
            let combined = running.multiply(&trace.derivatives[i])?;

            let Some(weights) = self.layers[i].weights().cloned() else {
                running = combined;
                continue;
            };

            let mut gradient = trace.activations[i]
                .transpose()
                .matmul_with(&combined, &self.executor)?;
            gradient.scale_inplace(scale);
            clip_by_norm(&mut gradient, clip_norm);

            if i > 0 {
                running = combined
                    .matmul_with(&weights.transpose(), &self.executor)?
                    .without_last_column();
            }
            optimizer.step(&mut self.layers[i], gradient)?;
        }
        Ok(())
    }

    /// Inference-space predictions, one row per example.
    pub fn predict(&mut self, x: &Matrix) -> Result<Matrix> {
        let (activations, _) = self.forward_layers(x)?;
        let output = activations
            .last()
            .map(Matrix::without_last_column)
            .unwrap_or_default();
        Ok(self.loss.inference_transform(&output))
    }

    /// Mean loss over the dataset, evaluated in batches with training mode
    /// off. The previous mode is restored afterwards.
    pub fn get_loss(&mut self, x: &Matrix, y: &Matrix) -> Result<f64> {
        let was_training = self.training;
        self.set_training_mode(false);
        let loss = self.evaluate(x, y);
        self.set_training_mode(was_training);
        loss
    }

    /// Runs the epoch loop; see [`train_loop`].
    pub fn train(
        &mut self,
        x: &Matrix,
        y: &Matrix,
        validation: Option<(&Matrix, &Matrix)>,
        config: &TrainConfig,
        hooks: TrainHooks<'_>,
    ) -> Result<TrainReport> {
        train_loop(self, x, y, validation, config, hooks)
    }

    /// Trains without validation data or hooks.
    pub fn fit(&mut self, x: &Matrix, y: &Matrix, config: &TrainConfig) -> Result<TrainReport> {
        self.train(x, y, None, config, TrainHooks::default())
    }

    /// [`Model::train`] with only an observer attached.
    pub fn fit_observed(
        &mut self,
        x: &Matrix,
        y: &Matrix,
        config: &TrainConfig,
        observer: &mut dyn TrainingObserver,
    ) -> Result<TrainReport> {
        self.train(x, y, None, config, TrainHooks::default().with_observer(observer))
    }

    pub fn weights_snapshot(&self) -> WeightsSnapshot {
        self.layers.iter().map(|l| l.weights().cloned()).collect()
    }

    pub fn restore_weights(&mut self, snapshot: WeightsSnapshot) -> Result<()> {
        if snapshot.len() != self.layers.len() {
            return Err(NnError::InvalidArgument(format!(
                "snapshot has {} layers, model has {}",
                snapshot.len(),
                self.layers.len()
            )));
        }
        for (layer, weights) in self.layers.iter_mut().zip(snapshot) {
            layer.set_weights(weights)?;
        }
        Ok(())
    }

    /// The architecture without weights.
    pub fn spec(&self, name: impl Into<String>) -> ModelSpec {
        ModelSpec {
            name: name.into(),
            description: None,
            input_dim: self.input_dim,
            layers: self.layers.iter().map(LayerSpec::from_layer).collect(),
            loss: self.loss,
            seed: None,
        }
    }

    /// Serializes architecture, weights and loss to JSON.
    pub fn save(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuilds a model from [`Model::save`] output.
    pub fn load(blob: &str) -> Result<Model> {
        let model: Model = serde_json::from_str(blob)?;
        model.finish_load()
    }

    /// Writes the model to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Model> {
        let reader = BufReader::new(File::open(path)?);
        let model: Model = serde_json::from_reader(reader)?;
        model.finish_load()
    }

    /// Bias-augmented inputs and local derivatives for every layer, plus the
    /// augmented output of the last one.
    fn forward_layers(&mut self, x: &Matrix) -> Result<(Vec<Matrix>, Vec<Matrix>)> {
        if x.cols() != self.input_dim {
            return Err(NnError::shape("model input", x.shape(), (x.rows(), self.input_dim)));
        }

        let mut activations = Vec::with_capacity(self.layers.len() + 2);
        let mut derivatives = Vec::with_capacity(self.layers.len() + 1);
        let mut layer_in = x.with_bias_column();

        for layer in &mut self.layers {
            let (out, deriv) = layer.forward(&layer_in, &mut self.rng, &self.executor)?;
            activations.push(layer_in);
            derivatives.push(deriv);
            layer_in = out.with_bias_column();
        }
        activations.push(layer_in);
        Ok((activations, derivatives))
    }

    /// `None` when the shapes already agree. With reconciliation on and equal
    /// row counts, both sides are cut to their common columns.
    pub(crate) fn align_to_target(
        &self,
        prediction: &Matrix,
        target: &Matrix,
    ) -> Result<Option<(Matrix, Matrix)>> {
        if prediction.shape() == target.shape() {
            return Ok(None);
        }
        if !self.reconcile_output_shape || prediction.rows() != target.rows() {
            return Err(NnError::shape("loss", prediction.shape(), target.shape()));
        }

        let cols = prediction.cols().min(target.cols());
        warn!(
            "reconciled prediction {:?} and target {:?} to {} column(s)",
            prediction.shape(),
            target.shape(),
            cols
        );
        let rows = prediction.rows();
        Ok(Some((prediction.truncate(rows, cols), target.truncate(rows, cols))))
    }

    fn evaluate(&mut self, x: &Matrix, y: &Matrix) -> Result<f64> {
        if x.rows() != y.rows() {
            return Err(NnError::shape("get_loss", x.shape(), y.shape()));
        }
        let n = x.rows();
        if n == 0 {
            return Ok(0.0);
        }

        let mut total = 0.0;
        for start in (0..n).step_by(EVAL_BATCH_SIZE) {
            let indices: Vec<usize> = (start..(start + EVAL_BATCH_SIZE).min(n)).collect();
            let xb = x.select_rows(&indices)?;
            let yb = y.select_rows(&indices)?;
            let prediction = self.predict(&xb)?;

            let batch_loss = match self.align_to_target(&prediction, &yb)? {
                None => self.loss.batch_loss(&yb, &prediction)?,
                Some((p, t)) => self.loss.batch_loss(&t, &p)?,
            };
            total += batch_loss * indices.len() as f64;
        }
        Ok(total / n as f64)
    }

    fn finish_load(mut self) -> Result<Model> {
        self.check_layer_shapes()?;
        self.set_training_mode(self.training);
        Ok(self)
    }

    /// Every stored weight matrix must match the widths it sits between.
    fn check_layer_shapes(&self) -> Result<()> {
        let mut width = self.input_dim;
        for (i, layer) in self.layers.iter().enumerate() {
            if let Some(weights) = layer.weights() {
                let expected = (width + 1, layer.size().unwrap_or(0));
                if weights.shape() != expected {
                    return Err(NnError::InvalidArgument(format!(
                        "layer #{i} weights are {:?}, expected {:?}",
                        weights.shape(),
                        expected
                    )));
                }
            }
            if let Some(size) = layer.size() {
                width = size;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::layers::{Dense, Dropout};
    use approx::assert_abs_diff_eq;

    fn two_layer(seed: u64) -> Model {
        let mut model = Model::with_seed(3, LossType::Square, seed);
        model
            .add_layer(Dense::new(4, Some(ActivationFunction::Tanh)))
            .unwrap()
            .add_layer(Dense::new(2, None))
            .unwrap();
        model
    }

    #[test]
    fn add_layer_materializes_weights() {
        let model = two_layer(1);
        assert_eq!(model.layers()[0].weights().unwrap().shape(), (4, 4));
        assert_eq!(model.layers()[1].weights().unwrap().shape(), (5, 2));
        assert_eq!(model.output_dim(), 2);
        assert_eq!(model.num_params(), 16 + 10);
    }

    #[test]
    fn add_layer_rejects_wrong_input_width() {
        let mut rng = seeded_rng(0);
        let mut model = Model::new(3, LossType::Square);
        let wrong = Dense::with_input_dim(2, 5, None, &mut rng);
        assert!(matches!(model.add_layer(wrong), Err(NnError::InvalidArgument(_))));
        assert!(model.layers().is_empty());
    }

    #[test]
    fn trace_is_aligned_with_layers() {
        let mut model = two_layer(2);
        model.add_layer(Dropout::new(0.0).unwrap()).unwrap();
        let x = Matrix::rand_with(5, 3, &mut seeded_rng(3));
        let y = Matrix::zeros(5, 2);

        let trace = model.compute_layers(&x, &y).unwrap();
        assert_eq!(trace.activations.len(), 5);
        assert_eq!(trace.derivatives.len(), 4);
        assert_eq!(trace.activations[0], x.with_bias_column());
        assert_eq!(trace.activations[1].shape(), (5, 5));
        assert_eq!(trace.activations[4].shape(), (5, 2));
        assert_eq!(trace.loss().shape(), (5, 1));
        assert_eq!(trace.loss_gradient().unwrap().shape(), (5, 2));
        assert_eq!(trace.output.shape(), (5, 2));
    }

    #[test]
    fn wrong_input_width_is_a_shape_error() {
        let mut model = two_layer(4);
        let err = model.predict(&Matrix::zeros(2, 4)).unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch { .. }));
    }

    #[test]
    fn backward_reduces_batch_loss() {
        let mut model = two_layer(5);
        let x = Matrix::rand_with(8, 3, &mut seeded_rng(6));
        let y = Matrix::filled(8, 2, 0.5);
        let opt = Sgd::new(0.1);

        let first = model.compute_layers(&x, &y).unwrap();
        model.backward(&first, &opt, 0.0).unwrap();
        let second = model.compute_layers(&x, &y).unwrap();
        assert!(second.mean_loss() < first.mean_loss());
    }

    #[test]
    fn backward_matches_hand_computed_step() {
        // One linear unit, square loss 0.5·(p − t)², single example.
        let mut model = Model::with_seed(1, LossType::Square, 0);
        let mut dense = Dense::new(1, None);
        dense.set_weights(Matrix::from_rows(vec![vec![2.0], vec![1.0]]).unwrap()).unwrap();
        model.add_layer(dense).unwrap();

        let x = Matrix::column_from(&[3.0]);
        let y = Matrix::column_from(&[4.0]);
        let trace = model.compute_layers(&x, &y).unwrap();
        // p = 2·3 + 1 = 7, dL/dp = p − t = 3
        assert_abs_diff_eq!(trace.output[(0, 0)], 7.0);

        model.backward(&trace, &Sgd::new(0.1), 0.0).unwrap();
        let w = model.layers()[0].weights().unwrap();
        assert_abs_diff_eq!(w[(0, 0)], 2.0 - 0.1 * 9.0, epsilon = 1e-12);
        assert_abs_diff_eq!(w[(1, 0)], 1.0 - 0.1 * 3.0, epsilon = 1e-12);
    }

    #[test]
    fn get_loss_restores_training_mode() {
        let mut model = two_layer(7);
        model.add_layer(Dropout::new(0.5).unwrap()).unwrap();
        let x = Matrix::rand_with(40, 3, &mut seeded_rng(8));
        let y = Matrix::zeros(40, 2);

        let a = model.get_loss(&x, &y).unwrap();
        let b = model.get_loss(&x, &y).unwrap();
        assert_eq!(a, b);
        assert!(model.is_training());
    }

    #[test]
    fn snapshot_and_restore() {
        let mut model = two_layer(9);
        let snapshot = model.weights_snapshot();
        let x = Matrix::rand_with(4, 3, &mut seeded_rng(10));
        let y = Matrix::ones(4, 2);
        let trace = model.compute_layers(&x, &y).unwrap();
        model.backward(&trace, &Sgd::new(0.5), 0.0).unwrap();
        assert_ne!(model.weights_snapshot(), snapshot);

        model.restore_weights(snapshot.clone()).unwrap();
        assert_eq!(model.weights_snapshot(), snapshot);
        assert!(model.restore_weights(Vec::new()).is_err());
    }

    #[test]
    fn load_rejects_inconsistent_weights() {
        let model = two_layer(11);
        let blob = model.save().unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&blob).unwrap();
        value["input_dim"] = serde_json::json!(7);
        assert!(Model::load(&value.to_string()).is_err());
    }
}
