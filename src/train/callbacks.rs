use crate::train::epoch_stats::{BatchStats, EpochStats, TrainingState};

/// Fire-and-forget notifications from the training loop. Nothing an observer
/// does feeds back into training.
pub trait TrainingObserver {
    fn on_batch_end(&mut self, _state: &TrainingState, _stats: &BatchStats) {}

    fn on_epoch_end(&mut self, _state: &TrainingState, _stats: &EpochStats) {}
}

/// Collects everything it is told; handy for tests and post-run plots.
#[derive(Debug, Default)]
pub struct History {
    pub batches: Vec<BatchStats>,
    pub epochs: Vec<EpochStats>,
}

impl TrainingObserver for History {
    fn on_batch_end(&mut self, _state: &TrainingState, stats: &BatchStats) {
        self.batches.push(stats.clone());
    }

    fn on_epoch_end(&mut self, _state: &TrainingState, stats: &EpochStats) {
        self.epochs.push(stats.clone());
    }
}
