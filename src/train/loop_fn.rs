use std::collections::BTreeMap;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::error::{NnError, Result};
use crate::loss::LossFunction;
use crate::math::matrix::Matrix;
use crate::math::random::random_permutation;
use crate::network::model::{ForwardTrace, Model, WeightsSnapshot};
use crate::optim::Sgd;
use crate::train::early_stopping::{EarlyStopping, EarlyStoppingDecision};
use crate::train::epoch_stats::{BatchStats, EpochStats, TrainReport, TrainingState};
use crate::train::metrics::Metric;
use crate::train::train_config::{TrainConfig, TrainHooks};

/// Trains `model` on `(x, y)` and reports how the run ended.
///
/// Each epoch applies the learning-rate schedule, shuffles the training rows,
/// and runs forward/backward over `ceil(n / batch_size)` mini-batches. With
/// validation data the loop tracks the best validation loss and, once
/// `early_stopping_patience` epochs pass without improvement, restores the
/// best weights and stops.
///
/// # Early termination
/// The loop also ends early if:
/// - the epoch's training loss reaches `config.target_loss`,
/// - the `progress_tx` receiver has been dropped, **or**
/// - the stop flag is set (checked between epochs).
///
/// # Errors
/// A NaN or infinite batch or validation loss aborts the run with
/// [`NnError::NumericDivergence`]; weights are left as they were after the
/// last successful batch. Empty or mismatched inputs and an invalid config
/// are rejected before the first epoch.
pub fn train_loop(
    model: &mut Model,
    x: &Matrix,
    y: &Matrix,
    validation: Option<(&Matrix, &Matrix)>,
    config: &TrainConfig,
    mut hooks: TrainHooks<'_>,
) -> Result<TrainReport> {
    config.validate()?;
    if x.rows() == 0 {
        return Err(NnError::InvalidConfig("training set is empty".to_owned()));
    }
    if x.rows() != y.rows() {
        return Err(NnError::shape("train", x.shape(), y.shape()));
    }
    if let Some((vx, vy)) = validation {
        if vx.rows() != vy.rows() {
            return Err(NnError::shape("validation", vx.shape(), vy.shape()));
        }
    }
    if let Some(seed) = config.seed {
        model.reseed(seed);
    }

    let was_training = model.is_training();
    model.set_training_mode(true);
    let report = run_epochs(model, x, y, validation, config, &mut hooks);
    model.set_training_mode(was_training);
    model.set_state(TrainingState::Idle);
    report
}

fn run_epochs(
    model: &mut Model,
    x: &Matrix,
    y: &Matrix,
    validation: Option<(&Matrix, &Matrix)>,
    config: &TrainConfig,
    hooks: &mut TrainHooks<'_>,
) -> Result<TrainReport> {
    let optimizer = Sgd {
        learning_rate: config.learning_rate,
        momentum: config.momentum,
        weight_decay: config.weight_decay,
    };
    let mut early_stopping: EarlyStopping<WeightsSnapshot> =
        EarlyStopping::new(config.early_stopping_patience, config.early_stopping_min_delta);

    let mut history = Vec::with_capacity(config.max_epochs);
    let mut outcome = TrainingState::MaxEpochsReached;
    let mut learning_rate = config.learning_rate;
    let mut final_loss = 0.0;

    for epoch in 0..config.max_epochs {
        let number = epoch + 1;
        if hooks.stop_requested() {
            outcome = TrainingState::Stopped { epoch };
            break;
        }

        learning_rate = config.learning_rate_schedule.rate(
            epoch,
            config.learning_rate,
            learning_rate,
            config.learning_rate_decay,
        );
        model.set_state(TrainingState::Training { epoch: number });

        let t_start = Instant::now();
        let (loss, metrics) = run_one_epoch(
            model,
            x,
            y,
            &optimizer.with_learning_rate(learning_rate),
            config,
            number,
            hooks,
        )?;

        let validation_loss = match validation {
            Some((vx, vy)) => {
                let v = model.get_loss(vx, vy)?;
                if !v.is_finite() {
                    return Err(validation_divergence(number, v, vx, vy));
                }
                Some(v)
            }
            None => None,
        };
        let elapsed_ms = t_start.elapsed().as_millis() as u64;
        final_loss = loss;

        let stats = EpochStats {
            epoch: number,
            total_epochs: config.max_epochs,
            loss,
            validation_loss,
            metrics,
            learning_rate,
            elapsed_ms,
        };
        match validation_loss {
            Some(v) => info!(
                "epoch {number}/{}: loss {loss:.6}, validation {v:.6}, lr {learning_rate:.6}",
                config.max_epochs
            ),
            None => info!(
                "epoch {number}/{}: loss {loss:.6}, lr {learning_rate:.6}",
                config.max_epochs
            ),
        }

        if config.checkpoint_frequency > 0 && number % config.checkpoint_frequency == 0 {
            write_checkpoint(model, number, hooks);
        }

        let state = model.state();
        if let Some(observer) = hooks.observer.as_mut() {
            observer.on_epoch_end(&state, &stats);
        }
        let receiver_gone = match &hooks.progress_tx {
            Some(tx) => tx.send(stats.clone()).is_err(),
            None => false,
        };
        history.push(stats);

        if receiver_gone {
            outcome = TrainingState::Stopped { epoch: number };
            break;
        }

        if let Some(v) = validation_loss {
            let decision = early_stopping.observe(v, || model.weights_snapshot());
            if decision == EarlyStoppingDecision::Stop {
                let best_epoch = early_stopping.best_epoch();
                if let Some(best) = early_stopping.take_best_snapshot() {
                    model.restore_weights(best)?;
                }
                match best_epoch {
                    Some(best) => info!(
                        "early stopping at epoch {number}: best validation loss {:.6} from epoch {best}",
                        early_stopping.best_loss()
                    ),
                    None => warn!("early stopping at epoch {number}: validation loss never improved"),
                }
                outcome = TrainingState::EarlyStopped { epoch: number, best_epoch };
                break;
            }
        }

        if config.target_loss.is_some_and(|target| loss <= target) {
            info!("converged at epoch {number}: loss {loss:.6}");
            outcome = TrainingState::Converged { epoch: number };
            break;
        }
    }

    model.set_state(outcome);
    Ok(TrainReport {
        outcome,
        epochs_run: history.len(),
        final_loss,
        best_validation_loss: validation.map(|_| early_stopping.best_loss()),
        history,
    })
}

/// Runs one full epoch of mini-batch SGD over the training data.
/// Returns the mean batch loss and the batch-averaged metrics.
fn run_one_epoch(
    model: &mut Model,
    x: &Matrix,
    y: &Matrix,
    optimizer: &Sgd,
    config: &TrainConfig,
    epoch: usize,
    hooks: &mut TrainHooks<'_>,
) -> Result<(f64, BTreeMap<Metric, f64>)> {
    let order = random_permutation(x.rows(), model.rng_mut());
    let total_batches = order.len().div_ceil(config.batch_size);

    let mut loss_sum = 0.0;
    let mut metric_sums: BTreeMap<Metric, f64> = BTreeMap::new();

    for (batch, indices) in order.chunks(config.batch_size).enumerate() {
        let xb = x.select_rows(indices)?;
        let yb = y.select_rows(indices)?;

        let trace = model.compute_layers(&xb, &yb)?;
        let loss = trace.mean_loss();
        if !loss.is_finite() {
            return Err(divergence(epoch, batch, loss, &xb, &yb, &trace));
        }

        model.backward(&trace, optimizer, config.gradient_clip_norm)?;

        let metrics = batch_metrics(model, &config.metrics, loss, &trace, &yb)?;
        for (metric, value) in &metrics {
            *metric_sums.entry(*metric).or_insert(0.0) += value;
        }
        loss_sum += loss;
        debug!("epoch {epoch} batch {}/{total_batches}: loss {loss:.6}", batch + 1);

        if let Some(observer) = hooks.observer.as_mut() {
            let stats = BatchStats {
                epoch,
                batch,
                total_batches,
                loss,
                metrics,
                learning_rate: optimizer.learning_rate,
            };
            observer.on_batch_end(&model.state(), &stats);
        }
    }

    let n = total_batches.max(1) as f64;
    for value in metric_sums.values_mut() {
        *value /= n;
    }
    Ok((loss_sum / n, metric_sums))
}

/// Requested metrics for one batch, computed on inference-space predictions.
fn batch_metrics(
    model: &Model,
    metrics: &[Metric],
    loss: f64,
    trace: &ForwardTrace,
    target: &Matrix,
) -> Result<BTreeMap<Metric, f64>> {
    let mut values = BTreeMap::new();
    if metrics.is_empty() {
        return Ok(values);
    }

    let prediction = model.loss().inference_transform(&trace.output);
    let aligned = model.align_to_target(&prediction, target)?;
    let (prediction, target) = match &aligned {
        Some((p, t)) => (p, t),
        None => (&prediction, target),
    };

    for &metric in metrics {
        let value = match metric {
            Metric::Loss => loss,
            other => other.compute(prediction, target)?,
        };
        values.insert(metric, value);
    }
    Ok(values)
}

fn write_checkpoint(model: &Model, epoch: usize, hooks: &mut TrainHooks<'_>) {
    let Some(sink) = hooks.checkpoint.as_mut() else {
        return;
    };
    let written = model.save().and_then(|blob| sink.write(epoch, &blob));
    match written {
        Ok(()) => debug!("checkpoint written for epoch {epoch}"),
        Err(e) => warn!("checkpoint for epoch {epoch} failed, continuing: {e}"),
    }
}

fn first_row(m: &Matrix) -> String {
    if m.rows() > 0 {
        format!("{:?}", m.row(0))
    } else {
        "[]".to_owned()
    }
}

/// Logs the failing batch and builds the fatal error.
fn divergence(
    epoch: usize,
    batch: usize,
    loss: f64,
    input: &Matrix,
    target: &Matrix,
    trace: &ForwardTrace,
) -> NnError {
    let context = format!(
        "input {:?} first row {}, output {:?} first row {}, target first row {}",
        input.shape(),
        first_row(input),
        trace.output.shape(),
        first_row(&trace.output),
        first_row(target),
    );
    error!("non-finite loss {loss} at epoch {epoch}, batch {batch}: {context}");
    NnError::NumericDivergence { epoch, batch, loss, context }
}

/// A non-finite validation loss is reported against batch 0 of that epoch.
fn validation_divergence(epoch: usize, loss: f64, input: &Matrix, target: &Matrix) -> NnError {
    let context = format!(
        "validation input {:?} first row {}, target {:?} first row {}",
        input.shape(),
        first_row(input),
        target.shape(),
        first_row(target),
    );
    error!("non-finite validation loss {loss} at epoch {epoch}: {context}");
    NnError::NumericDivergence { epoch, batch: 0, loss, context }
}
