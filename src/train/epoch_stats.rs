use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::train::metrics::Metric;

/// Where a model is in its training lifecycle.
///
/// `train` moves `Idle → Training → {Converged | EarlyStopped |
/// MaxEpochsReached | Stopped}` and leaves the model `Idle` again; the
/// terminal state is returned in [`TrainReport::outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrainingState {
    #[default]
    Idle,
    /// 1-based epoch currently running.
    Training { epoch: usize },
    /// Training loss reached `target_loss`.
    Converged { epoch: usize },
    /// Validation loss stopped improving; weights from `best_epoch` restored.
    /// `None` when no epoch ever improved and nothing was restored.
    EarlyStopped { epoch: usize, best_epoch: Option<usize> },
    MaxEpochsReached,
    /// Interrupted by the stop flag or a dropped progress receiver.
    Stopped { epoch: usize },
}

/// Statistics for one completed mini-batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// 0-based batch index within the epoch.
    pub batch: usize,
    pub total_batches: usize,
    pub loss: f64,
    pub metrics: BTreeMap<Metric, f64>,
    pub learning_rate: f64,
}

/// Per-epoch training statistics.
///
/// When a `progress_tx` channel is configured in `TrainHooks`, the training
/// loop sends one `EpochStats` value at the end of every completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean batch loss over the epoch.
    pub loss: f64,
    /// Mean validation loss, if a validation set was provided.
    pub validation_loss: Option<f64>,
    /// Requested metrics, averaged over batches.
    pub metrics: BTreeMap<Metric, f64>,
    pub learning_rate: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

/// What a finished `train` call produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub outcome: TrainingState,
    pub epochs_run: usize,
    /// Mean training loss of the last completed epoch.
    pub final_loss: f64,
    pub best_validation_loss: Option<f64>,
    pub history: Vec<EpochStats>,
}
