/// Outcome of feeding one validation loss to [`EarlyStopping`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyStoppingDecision {
    /// New best; the snapshot was taken.
    Improved,
    /// No improvement; `wait` consecutive epochs without one so far.
    NoImprovement { wait: usize },
    /// Patience exhausted. Restore [`EarlyStopping::best_snapshot`] and stop.
    Stop,
}

/// Tracks the best validation loss and the state snapshotted with it.
///
/// A loss counts as an improvement when it is below `best − min_delta`.
/// `patience == 0` disables stopping; the best snapshot is still tracked.
#[derive(Debug, Clone)]
pub struct EarlyStopping<S> {
    patience: usize,
    min_delta: f64,
    best: f64,
    wait: usize,
    best_epoch: Option<usize>,
    best_snapshot: Option<S>,
    epochs_seen: usize,
}

impl<S> EarlyStopping<S> {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        EarlyStopping {
            patience,
            min_delta,
            best: f64::INFINITY,
            wait: 0,
            best_epoch: None,
            best_snapshot: None,
            epochs_seen: 0,
        }
    }

    /// Records `val_loss` for the next epoch. `snapshot` runs only on improvement.
    pub fn observe<F>(&mut self, val_loss: f64, snapshot: F) -> EarlyStoppingDecision
    where
        F: FnOnce() -> S,
    {
        self.epochs_seen += 1;

        if val_loss < self.best - self.min_delta {
            self.best = val_loss;
            self.wait = 0;
            self.best_epoch = Some(self.epochs_seen);
            self.best_snapshot = Some(snapshot());
            return EarlyStoppingDecision::Improved;
        }

        self.wait += 1;
        if self.patience > 0 && self.wait >= self.patience {
            EarlyStoppingDecision::Stop
        } else {
            EarlyStoppingDecision::NoImprovement { wait: self.wait }
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best
    }

    /// 1-based epoch of the best loss seen.
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn best_snapshot(&self) -> Option<&S> {
        self.best_snapshot.as_ref()
    }

    pub fn take_best_snapshot(&mut self) -> Option<S> {
        self.best_snapshot.take()
    }
}
