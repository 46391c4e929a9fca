use serde::{Deserialize, Serialize};

/// How the learning rate evolves across epochs (0-based).
///
/// - `Constant` — from epoch 1 on, multiplies the current rate by
///   `learning_rate_decay` every epoch. With the default decay of 1.0 the rate
///   really is constant.
/// - `Decay`    — `initial / (1 + learning_rate_decay · epoch)`.
/// - `Step`     — `initial · 0.1^(epoch / 10)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrSchedule {
    #[default]
    Constant,
    Decay,
    Step,
}

const STEP_EVERY: usize = 10;
const STEP_FACTOR: f64 = 0.1;

impl LrSchedule {
    /// Learning rate for `epoch`, given the initial rate and the rate used in
    /// the previous epoch.
    pub fn rate(&self, epoch: usize, initial: f64, previous: f64, decay: f64) -> f64 {
        match self {
            LrSchedule::Constant => {
                if epoch == 0 { initial } else { previous * decay }
            }
            LrSchedule::Decay => initial / (1.0 + decay * epoch as f64),
            LrSchedule::Step => initial * STEP_FACTOR.powi((epoch / STEP_EVERY) as i32),
        }
    }
}
