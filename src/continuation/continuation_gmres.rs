//! Continuation (C/GMRES) linearization of a shooting NLP.
//!
//! Instead of driving the residual to zero at every sampling instant, the continuation method
//! tracks the solution over time by enforcing `dF/dt = -zeta F` along the trajectory. With
//! forward differences in time, state and solution this becomes the linear system
//!
//! ```text
//! (F(t + eps, x + eps f, s + eps v) - F(t + eps, x + eps f, s)) / eps
//!     = -zeta F(t, x, s) - (F(t + eps, x + eps f, s) - F(t, x, s)) / eps
//! ```
//!
//! for the time derivative `v` of the solution.

use crate::core::traits::{InnerProduct, LinearProblem};
use crate::core::wrappers::axpy_into;
use crate::error::CgmresError;
use crate::nlp::Nlp;
use crate::ocp::Ocp;

pub struct ContinuationGmres<N> {
    nlp: N,
    finite_difference_epsilon: f64,
    zeta: f64,
    fonc_hu: Vec<f64>,
    fonc_hu_1: Vec<f64>,
    fonc_hu_2: Vec<f64>,
    x_1: Vec<f64>,
    dx: Vec<f64>,
    solution_1: Vec<f64>,
}

impl<N: Nlp> ContinuationGmres<N> {
    pub fn new(nlp: N, finite_difference_epsilon: f64, zeta: f64) -> Result<Self, CgmresError> {
        if !(finite_difference_epsilon > 0.0) {
            return Err(CgmresError::InvalidArgument(format!(
                "[ContinuationGmres] 'finite_difference_epsilon' must be positive, got {finite_difference_epsilon}"
            )));
        }
        if !(zeta > 0.0) {
            return Err(CgmresError::InvalidArgument(format!(
                "[ContinuationGmres] 'zeta' must be positive, got {zeta}"
            )));
        }
        let dim = nlp.dim();
        let nx = nlp.nx();
        Ok(Self {
            nlp,
            finite_difference_epsilon,
            zeta,
            fonc_hu: vec![0.0; dim],
            fonc_hu_1: vec![0.0; dim],
            fonc_hu_2: vec![0.0; dim],
            x_1: vec![0.0; nx],
            dx: vec![0.0; nx],
            solution_1: vec![0.0; dim],
        })
    }

    pub fn dim(&self) -> usize {
        self.nlp.dim()
    }

    pub fn nlp(&self) -> &N {
        &self.nlp
    }

    pub fn synchronize_ocp(&mut self) {
        self.nlp.synchronize_ocp();
    }

    /// Residual of the last evaluation at the current point.
    pub fn fonc_hu(&self) -> &[f64] {
        &self.fonc_hu
    }

    pub fn eval_fonc(&mut self, t: f64, x: &[f64], solution: &[f64]) {
        self.nlp.eval_fonc_hu(t, x, solution, &mut self.fonc_hu);
    }

    /// Norm of the residual of the last evaluation at the current point.
    pub fn opt_error(&self) -> f64 {
        let ip = ();
        ip.norm(&self.fonc_hu[..])
    }

    pub fn retrieve_dummy(&mut self, solution: &mut [f64], min_dummy: f64) {
        self.nlp.retrieve_dummy(solution, &mut self.fonc_hu_2, min_dummy);
    }

    pub fn retrieve_mu(&mut self, solution: &mut [f64]) {
        self.nlp.retrieve_mu(solution, &mut self.fonc_hu_2);
    }

    /// The continuation system at `(t, x, solution)`.
    pub fn linearize<'a>(
        &'a mut self,
        t: f64,
        x: &'a [f64],
        solution: &'a [f64],
    ) -> ContinuationLinearization<'a, N> {
        ContinuationLinearization { cgmres: self, t, x, solution }
    }

    /// `x_1 = x + eps f(t, x, u_0)`, the state one finite-difference step ahead.
    fn predict_state(&mut self, t: f64, x: &[f64], solution: &[f64]) {
        let nu = self.nlp.nu();
        self.nlp.ocp().eval_f(t, x, &solution[..nu], &mut self.dx);
        axpy_into(&mut self.x_1, x, self.finite_difference_epsilon, &self.dx);
    }

    /// Residual at `(t_1, x_1, solution + eps direction)` into `fonc_hu_2`.
    fn eval_perturbed(&mut self, t_1: f64, solution: &[f64], direction: &[f64]) {
        axpy_into(&mut self.solution_1, solution, self.finite_difference_epsilon, direction);
        self.nlp.eval_fonc_hu(t_1, &self.x_1, &self.solution_1, &mut self.fonc_hu_2);
    }
}

/// Continuation system of [`ContinuationGmres`] frozen at one point.
pub struct ContinuationLinearization<'a, N> {
    cgmres: &'a mut ContinuationGmres<N>,
    t: f64,
    x: &'a [f64],
    solution: &'a [f64],
}

impl<N: Nlp> LinearProblem<f64> for ContinuationLinearization<'_, N> {
    fn dim(&self) -> usize {
        self.cgmres.dim()
    }

    fn eval_b(&mut self, x0: &[f64], b: &mut [f64]) {
        let c = &mut *self.cgmres;
        let eps = c.finite_difference_epsilon;
        let t_1 = self.t + eps;
        c.predict_state(self.t, self.x, self.solution);
        c.nlp.eval_fonc_hu(self.t, self.x, self.solution, &mut c.fonc_hu);
        c.nlp.eval_fonc_hu(t_1, &c.x_1, self.solution, &mut c.fonc_hu_1);
        c.eval_perturbed(t_1, self.solution, x0);
        let coeff = 1.0 / eps - c.zeta;
        for ((bi, &f), &f2) in b.iter_mut().zip(&c.fonc_hu).zip(&c.fonc_hu_2) {
            *bi = coeff * f - f2 / eps;
        }
    }

    fn eval_ax(&mut self, v: &[f64], ax: &mut [f64]) {
        let c = &mut *self.cgmres;
        let eps = c.finite_difference_epsilon;
        c.eval_perturbed(self.t + eps, self.solution, v);
        for ((ai, &f1), &f2) in ax.iter_mut().zip(&c.fonc_hu_1).zip(&c.fonc_hu_2) {
            *ai = (f2 - f1) / eps;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Horizon;
    use crate::nlp::SingleShootingNlp;
    use crate::problems::CartPole;
    use crate::solver::MatrixFreeGmres;

    fn cgmres(n: usize) -> ContinuationGmres<SingleShootingNlp<CartPole>> {
        let nlp = SingleShootingNlp::new(CartPole::default(), Horizon::new(1.0, 0.0).unwrap(), n).unwrap();
        ContinuationGmres::new(nlp, 1e-8, 10.0).unwrap()
    }

    #[test]
    fn zero_direction_residual_is_the_right_hand_side() {
        let mut c = cgmres(4);
        let x = [0.0, 0.4, 0.0, 0.1];
        let solution = vec![0.1; 4];
        let mut b = vec![0.0; 4];
        let mut ax = vec![0.0; 4];
        {
            let mut lin = c.linearize(0.0, &x, &solution);
            lin.eval_b(&[0.0; 4], &mut b);
            lin.eval_ax(&[0.0; 4], &mut ax);
        }
        assert!(b.iter().all(|v| v.is_finite()));
        assert!(ax.iter().all(|v| *v == 0.0));
        assert!(c.opt_error() > 0.0);
    }

    /// Following the continuation direction shrinks the residual at the next time step.
    #[test]
    fn continuation_step_reduces_the_residual_at_the_next_instant() {
        let n = 8;
        let mut c = cgmres(n);
        let mut gmres = MatrixFreeGmres::new(c.dim(), c.dim()).unwrap();
        let x = [0.0, 0.3, 0.0, 0.0];
        let solution = vec![0.0; n];
        let mut update = vec![0.0; n];
        gmres.solve(&mut c.linearize(0.0, &x, &solution), &mut update).unwrap();
        let before = c.opt_error();

        let dt = 1e-3;
        let mut dx = [0.0; 4];
        c.nlp().ocp().eval_f(0.0, &x, &solution[..1], &mut dx);
        let x_next: Vec<f64> = x.iter().zip(&dx).map(|(xi, di)| xi + dt * di).collect();
        let next: Vec<f64> = solution.iter().zip(&update).map(|(s, u)| s + dt * u).collect();
        c.eval_fonc(dt, &x_next, &next);
        let after = c.opt_error();
        // dF/dt = -zeta F predicts F(t + dt) ~ (1 - zeta dt) F(t)
        assert!(after < before, "{after} >= {before}");
    }

    #[test]
    fn invalid_gains_are_rejected() {
        let nlp = SingleShootingNlp::new(CartPole::default(), Horizon::new(1.0, 0.0).unwrap(), 2).unwrap();
        assert!(ContinuationGmres::new(nlp, 1e-8, 0.0).is_err());
    }
}
