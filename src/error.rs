use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, NnError>;

#[derive(Debug, Error)]
pub enum NnError {
    /// Operand shapes are incompatible for `op`.
    #[error("shape mismatch in {op}: left {left:?}, right {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    /// A container was built from jagged or inconsistent data.
    #[error("invalid construction: {0}")]
    InvalidConstruction(String),

    /// A NaN or infinite loss showed up during training. Always fatal.
    #[error("numeric divergence at epoch {epoch}, batch {batch}: loss = {loss} ({context})")]
    NumericDivergence {
        epoch: usize,
        batch: usize,
        loss: f64,
        context: String,
    },

    /// Inversion hit a (near-)zero pivot.
    #[error("matrix is singular")]
    SingularMatrix,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl NnError {
    pub(crate) fn shape(op: &'static str, left: (usize, usize), right: (usize, usize)) -> Self {
        NnError::ShapeMismatch { op, left, right }
    }
}
