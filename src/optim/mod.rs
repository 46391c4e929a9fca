pub mod sgd;

pub use sgd::{clip_by_norm, Sgd};
