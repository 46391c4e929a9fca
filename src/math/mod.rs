pub mod elementwise;
pub mod executor;
pub mod linalg;
pub mod matrix;
pub mod random;
pub mod vector;

pub use elementwise::Elementwise;
pub use executor::Executor;
pub use matrix::{concat, Matrix};
pub use random::{random_permutation, seeded_rng};
pub use vector::Vector;
