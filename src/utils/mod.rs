//! Shared utilities: solver statistics, timing, integrators and run logs.

pub mod convergence;
pub mod integrator;
pub mod logger;
pub mod timer;

pub use convergence::SolveStats;
pub use integrator::{forward_euler, rk4};
pub use logger::RunLogger;
pub use timer::{Timer, TimingProfile};
