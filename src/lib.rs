//! cgmres: continuation/GMRES (C/GMRES) solvers for nonlinear model predictive control
//!
//! An optimal control problem is described by implementing [`Ocp`]. It is discretized into a
//! nonlinear program (zero-horizon, single-shooting or multiple-shooting) whose optimality
//! conditions are tracked in time by a matrix-free GMRES solve per sampling period.

pub mod bounds;
pub mod config;
pub mod continuation;
pub mod core;
pub mod error;
pub mod nlp;
pub mod ocp;
pub mod problems;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use bounds::ControlInputBounds;
pub use config::{Horizon, SolverSettings};
pub use core::{InnerProduct, LinearProblem, MatVec};
pub use error::CgmresError;
pub use ocp::{Ocp, OcpDims};
pub use solver::{MatrixFreeGmres, MultipleShootingCgmresSolver, SingleShootingCgmresSolver, ZeroHorizonOcpSolver};
pub use utils::{RunLogger, SolveStats, Timer, TimingProfile};
