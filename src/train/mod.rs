pub mod callbacks;
pub mod checkpoint;
pub mod early_stopping;
pub mod epoch_stats;
pub mod loop_fn;
pub mod metrics;
pub mod schedule;
pub mod train_config;

pub use callbacks::{History, TrainingObserver};
pub use checkpoint::{CheckpointSink, DirectoryCheckpoint};
pub use early_stopping::{EarlyStopping, EarlyStoppingDecision};
pub use epoch_stats::{BatchStats, EpochStats, TrainReport, TrainingState};
pub use loop_fn::train_loop;
pub use metrics::Metric;
pub use schedule::LrSchedule;
pub use train_config::{TrainConfig, TrainHooks};
