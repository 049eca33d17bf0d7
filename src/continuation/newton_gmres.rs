//! Newton step of an NLP with a forward-difference Jacobian.
//!
//! The Newton system `J(s) ds = -F(s)` is never assembled: the product `J(s) v` is replaced by
//! `(F(s + eps v) - F(s)) / eps` and handed to GMRES through [`LinearProblem`].

use crate::core::traits::{InnerProduct, LinearProblem};
use crate::core::wrappers::axpy_into;
use crate::error::CgmresError;
use crate::nlp::Nlp;

pub struct NewtonGmres<N> {
    nlp: N,
    finite_difference_epsilon: f64,
    fonc_hu: Vec<f64>,
    fonc_hu_1: Vec<f64>,
    solution_1: Vec<f64>,
}

impl<N: Nlp> NewtonGmres<N> {
    pub fn new(nlp: N, finite_difference_epsilon: f64) -> Result<Self, CgmresError> {
        if !(finite_difference_epsilon > 0.0) {
            return Err(CgmresError::InvalidArgument(format!(
                "[NewtonGmres] 'finite_difference_epsilon' must be positive, got {finite_difference_epsilon}"
            )));
        }
        let dim = nlp.dim();
        Ok(Self {
            nlp,
            finite_difference_epsilon,
            fonc_hu: vec![0.0; dim],
            fonc_hu_1: vec![0.0; dim],
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

    /// Residual of the last evaluation.
    pub fn fonc_hu(&self) -> &[f64] {
        &self.fonc_hu
    }

    pub fn eval_fonc(&mut self, t: f64, x: &[f64], solution: &[f64]) {
        self.nlp.eval_fonc_hu(t, x, solution, &mut self.fonc_hu);
    }

    /// Norm of the residual of the last evaluation.
    pub fn opt_error(&self) -> f64 {
        let ip = ();
        ip.norm(&self.fonc_hu[..])
    }

    pub fn retrieve_dummy(&mut self, solution: &mut [f64], min_dummy: f64) {
        self.nlp.retrieve_dummy(solution, &mut self.fonc_hu_1, min_dummy);
    }

    pub fn retrieve_mu(&mut self, solution: &mut [f64]) {
        self.nlp.retrieve_mu(solution, &mut self.fonc_hu_1);
    }

    /// The Newton system at `(t, x, solution)`.
    pub fn linearize<'a>(&'a mut self, t: f64, x: &'a [f64], solution: &'a [f64]) -> NewtonLinearization<'a, N> {
        NewtonLinearization { newton: self, t, x, solution }
    }

    fn eval_perturbed(&mut self, t: f64, x: &[f64], solution: &[f64], direction: &[f64]) {
        axpy_into(&mut self.solution_1, solution, self.finite_difference_epsilon, direction);
        self.nlp.eval_fonc_hu(t, x, &self.solution_1, &mut self.fonc_hu_1);
    }
}

/// Newton system of [`NewtonGmres`] frozen at one point.
pub struct NewtonLinearization<'a, N> {
    newton: &'a mut NewtonGmres<N>,
    t: f64,
    x: &'a [f64],
    solution: &'a [f64],
}

impl<N: Nlp> LinearProblem<f64> for NewtonLinearization<'_, N> {
    fn dim(&self) -> usize {
        self.newton.dim()
    }

    fn eval_b(&mut self, x0: &[f64], b: &mut [f64]) {
        let newton = &mut *self.newton;
        newton.eval_fonc(self.t, self.x, self.solution);
        newton.eval_perturbed(self.t, self.x, self.solution, x0);
        let inv_eps = 1.0 / newton.finite_difference_epsilon;
        for ((bi, &f), &f1) in b.iter_mut().zip(&newton.fonc_hu).zip(&newton.fonc_hu_1) {
            *bi = -f - (f1 - f) * inv_eps;
        }
    }

    fn eval_ax(&mut self, v: &[f64], ax: &mut [f64]) {
        let newton = &mut *self.newton;
        newton.eval_perturbed(self.t, self.x, self.solution, v);
        let inv_eps = 1.0 / newton.finite_difference_epsilon;
        for ((ai, &f), &f1) in ax.iter_mut().zip(&newton.fonc_hu).zip(&newton.fonc_hu_1) {
            *ai = (f1 - f) * inv_eps;
        }
    }
}
