//! Configuration values threaded through the solver constructors.

pub mod horizon;
pub mod settings;

pub use horizon::Horizon;
pub use settings::SolverSettings;
