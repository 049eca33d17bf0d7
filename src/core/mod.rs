//! Core traits and their dense/vector implementations.

pub mod traits;
pub mod wrappers;

pub use traits::{InnerProduct, LinearProblem, MatVec};
pub use wrappers::ExplicitLinearProblem;
