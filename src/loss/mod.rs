pub mod cross_entropy;
pub mod hinge;
pub mod huber;
pub mod loss_function;
pub mod loss_type;
pub mod softmax;
pub mod square;

pub use cross_entropy::CrossEntropyLoss;
pub use hinge::HingeLoss;
pub use huber::HuberLoss;
pub use loss_function::LossFunction;
pub use loss_type::LossType;
pub use softmax::{softmax_rows, SoftmaxLoss};
pub use square::SquareLoss;
