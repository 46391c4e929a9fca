pub mod model;
pub mod spec;

pub use model::{ForwardTrace, Model, WeightsSnapshot};
pub use spec::{LayerSpec, ModelSpec};
