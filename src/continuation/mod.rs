//! Linearizations handed to the matrix-free GMRES.
//!
//! Each strategy wraps an NLP, evaluates its residual at finite-difference perturbed points and
//! exposes the resulting linear system through [`crate::core::LinearProblem`] via a
//! `linearize` method. The system borrows the strategy for the duration of one GMRES solve.

pub mod condensing;
pub mod continuation_gmres;
pub mod newton_gmres;

pub use condensing::{CondensedLinearization, ContinuationGmresCondensing};
pub use continuation_gmres::{ContinuationGmres, ContinuationLinearization};
pub use newton_gmres::{NewtonGmres, NewtonLinearization};
