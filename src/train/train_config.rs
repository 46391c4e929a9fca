use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::train::callbacks::TrainingObserver;
use crate::train::checkpoint::CheckpointSink;
use crate::train::epoch_stats::EpochStats;
use crate::train::metrics::Metric;
use crate::train::schedule::LrSchedule;

/// Hyperparameters for a `train` run.
///
/// Every field has a default, so a JSON file only needs the values it
/// changes:
///
/// ```json
/// { "learning_rate": 0.05, "batch_size": 16, "learning_rate_schedule": "decay" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub learning_rate: f64,
    /// Multiplier for `constant`, `k` for `decay`; ignored by `step`.
    pub learning_rate_decay: f64,
    pub batch_size: usize,
    pub max_epochs: usize,
    /// Epochs without validation improvement before stopping. 0 disables.
    pub early_stopping_patience: usize,
    pub early_stopping_min_delta: f64,
    pub learning_rate_schedule: LrSchedule,
    pub metrics: Vec<Metric>,
    /// Write a checkpoint every N epochs. 0 disables.
    pub checkpoint_frequency: usize,
    /// Maximum L2 norm of each layer's weight gradient. 0 disables.
    pub gradient_clip_norm: f64,
    pub momentum: f64,
    pub weight_decay: f64,
    /// Stop as `Converged` once the epoch's training loss is at or below this.
    pub target_loss: Option<f64>,
    /// Reseeds the model's generator before training.
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            learning_rate: 0.01,
            learning_rate_decay: 1.0,
            batch_size: 32,
            max_epochs: 50,
            early_stopping_patience: 0,
            early_stopping_min_delta: 0.0,
            learning_rate_schedule: LrSchedule::Constant,
            metrics: vec![Metric::Loss],
            checkpoint_frequency: 0,
            gradient_clip_norm: 0.0,
            momentum: 0.0,
            weight_decay: 0.0,
            target_loss: None,
            seed: None,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(NnError::InvalidConfig(msg));

        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".to_owned());
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return invalid(format!("momentum must be in [0, 1), got {}", self.momentum));
        }
        for (name, value) in [
            ("learning_rate_decay", self.learning_rate_decay),
            ("early_stopping_min_delta", self.early_stopping_min_delta),
            ("gradient_clip_norm", self.gradient_clip_norm),
            ("weight_decay", self.weight_decay),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        Ok(())
    }

    /// Reads a config from a JSON file and validates it.
    pub fn load_json(path: impl AsRef<Path>) -> Result<TrainConfig> {
        let reader = BufReader::new(File::open(path)?);
        let config: TrainConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

/// Runtime attachments for a training run.
///
/// - `progress_tx` receives one `EpochStats` per completed epoch. If the
///   receiver has been dropped the loop stops cleanly.
/// - `stop_flag` is checked between epochs; set it from another thread to
///   stop after the current epoch.
#[derive(Default)]
pub struct TrainHooks<'a> {
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    pub stop_flag: Option<Arc<AtomicBool>>,
    pub observer: Option<&'a mut dyn TrainingObserver>,
    pub checkpoint: Option<&'a mut dyn CheckpointSink>,
}

impl<'a> TrainHooks<'a> {
    pub fn with_observer(mut self, observer: &'a mut dyn TrainingObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_checkpoint(mut self, sink: &'a mut dyn CheckpointSink) -> Self {
        self.checkpoint = Some(sink);
        self
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<EpochStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_flag.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
