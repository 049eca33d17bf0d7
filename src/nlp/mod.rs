//! Nonlinear problems: the first-order necessary conditions (FONC) of an OCP as one residual
//! over a stacked decision vector.
//!
//! - [`ZeroHorizonNlp`]: a single stage, used to initialize the MPC solvers.
//! - [`SingleShootingNlp`]: `N` stages, states and costates eliminated by rollouts.
//! - [`MultipleShootingNlp`]: `N` stages, states and costates kept as separate unknowns and
//!   condensed out of the linear system.

pub mod multiple_shooting;
pub mod single_shooting;
pub mod zero_horizon;

pub use multiple_shooting::MultipleShootingNlp;
pub use single_shooting::SingleShootingNlp;
pub use zero_horizon::ZeroHorizonNlp;

use crate::ocp::Ocp;

/// Residual interface shared by the Newton-GMRES and C/GMRES linearizations.
pub trait Nlp {
    type Problem: Ocp;

    /// Length of the decision vector.
    fn dim(&self) -> usize;
    /// Dimension of the state.
    fn nx(&self) -> usize;
    /// Dimension of the control input.
    fn nu(&self) -> usize;

    fn ocp(&self) -> &Self::Problem;
    fn synchronize_ocp(&mut self);

    /// Writes the stacked FONC residual at `(t, x, solution)`.
    fn eval_fonc_hu(&mut self, t: f64, x: &[f64], solution: &[f64], fonc_hu: &mut [f64]);

    /// Resets the dummy inputs in `solution` from the bound residuals, floored at `min_dummy`.
    /// `fonc_hu` is scratch space of length [`Nlp::dim`].
    fn retrieve_dummy(&self, solution: &mut [f64], fonc_hu: &mut [f64], min_dummy: f64);

    /// Resets the bound multipliers in `solution` from the dummy stationarity condition.
    fn retrieve_mu(&self, solution: &mut [f64], fonc_hu: &mut [f64]);
}
