pub mod activation;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod network;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use activation::ActivationFunction;
pub use error::{NnError, Result};
pub use layers::{Dense, Dropout, Layer};
pub use loss::{LossFunction, LossType};
pub use math::{Executor, Matrix, Vector};
pub use network::{Model, ModelSpec};
pub use optim::Sgd;
pub use train::{TrainConfig, TrainHooks, TrainReport, TrainingState};
