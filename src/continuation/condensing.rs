//! Condensed continuation (C/GMRES) linearization of the multiple-shooting NLP.
//!
//! The continuation condition `dF/dt = -zeta F` is imposed on every residual block. The
//! state and costate blocks are eliminated by prescribing their residuals one finite-difference
//! step ahead, `(1 - eps zeta) fonc_f` and `(1 - eps zeta) fonc_hx`, and reconstructing the
//! trajectories that produce them. The dummy and multiplier blocks are eliminated through the
//! closed-form inverse of their 2×2 blocks. Only the control-input block is left to GMRES.
//!
//! After GMRES returns the time derivative of the control inputs, [`ContinuationGmresCondensing::expand`]
//! propagates the eliminated variables consistently.

use crate::bounds::{self, clip_dummy};
use crate::core::traits::LinearProblem;
use crate::core::wrappers::{axpy_into, squared_norm};
use crate::error::CgmresError;
use crate::nlp::MultipleShootingNlp;
use crate::ocp::Ocp;

/// One set of trajectories and bound variables of the multiple-shooting NLP.
#[derive(Debug, Clone)]
struct Point {
    x: Vec<Vec<f64>>,
    lmd: Vec<Vec<f64>>,
    dummy: Vec<f64>,
    mu: Vec<f64>,
}

impl Point {
    fn new(n: usize, nx: usize, nub: usize) -> Self {
        Self {
            x: vec![vec![0.0; nx]; n + 1],
            lmd: vec![vec![0.0; nx]; n + 1],
            dummy: vec![0.0; n * nub],
            mu: vec![0.0; n * nub],
        }
    }
}

pub struct ContinuationGmresCondensing<O> {
    nlp: MultipleShootingNlp<O>,
    finite_difference_epsilon: f64,
    zeta: f64,
    /// Current iterate of the eliminated variables.
    current: Point,
    /// Point one step ahead along the continuation, at the current control inputs.
    point_1: Point,
    /// Point one step ahead, at the perturbed control inputs.
    point_2: Point,
    x0_1: Vec<f64>,
    dx: Vec<f64>,
    solution_1: Vec<f64>,
    fonc_hu: Vec<f64>,
    fonc_hu_1: Vec<f64>,
    fonc_hu_2: Vec<f64>,
    fonc_f: Vec<Vec<f64>>,
    fonc_hx: Vec<Vec<f64>>,
    fonc_f_1: Vec<Vec<f64>>,
    fonc_hx_1: Vec<Vec<f64>>,
    fonc_hdummy: Vec<f64>,
    fonc_hmu: Vec<f64>,
    hdummy_inv: Vec<f64>,
    hmu_inv: Vec<f64>,
    dummy_update: Vec<f64>,
    mu_update: Vec<f64>,
}

impl<O: Ocp> ContinuationGmresCondensing<O> {
    pub fn new(nlp: MultipleShootingNlp<O>, finite_difference_epsilon: f64, zeta: f64) -> Result<Self, CgmresError> {
        if !(finite_difference_epsilon > 0.0) {
            return Err(CgmresError::InvalidArgument(format!(
                "[ContinuationGmresCondensing] 'finite_difference_epsilon' must be positive, got {finite_difference_epsilon}"
            )));
        }
        if !(zeta > 0.0) {
            return Err(CgmresError::InvalidArgument(format!(
                "[ContinuationGmresCondensing] 'zeta' must be positive, got {zeta}"
            )));
        }
        let (n, nx, nub, dim) = (nlp.n(), nlp.nx(), nlp.nub(), nlp.dim());
        let point = Point::new(n, nx, nub);
        let stages = vec![vec![0.0; nx]; n];
        Ok(Self {
            nlp,
            finite_difference_epsilon,
            zeta,
            current: point.clone(),
            point_1: point.clone(),
            point_2: point,
            x0_1: vec![0.0; nx],
            dx: vec![0.0; nx],
            solution_1: vec![0.0; dim],
            fonc_hu: vec![0.0; dim],
            fonc_hu_1: vec![0.0; dim],
            fonc_hu_2: vec![0.0; dim],
            fonc_f: stages.clone(),
            fonc_hx: stages.clone(),
            fonc_f_1: stages.clone(),
            fonc_hx_1: stages,
            fonc_hdummy: vec![0.0; n * nub],
            fonc_hmu: vec![0.0; n * nub],
            hdummy_inv: vec![0.0; n * nub],
            hmu_inv: vec![0.0; n * nub],
            dummy_update: vec![0.0; n * nub],
            mu_update: vec![0.0; n * nub],
        })
    }

    pub fn dim(&self) -> usize {
        self.nlp.dim()
    }

    pub fn nlp(&self) -> &MultipleShootingNlp<O> {
        &self.nlp
    }

    pub fn synchronize_ocp(&mut self) {
        self.nlp.synchronize_ocp();
    }

    /// States `x_0 .. x_N` of the current iterate.
    pub fn x(&self) -> &[Vec<f64>] {
        &self.current.x
    }

    /// Costates `lmd_0 .. lmd_N` of the current iterate.
    pub fn lmd(&self) -> &[Vec<f64>] {
        &self.current.lmd
    }

    pub fn dummy(&self) -> &[f64] {
        &self.current.dummy
    }

    pub fn mu(&self) -> &[f64] {
        &self.current.mu
    }

    pub fn dummy_mut(&mut self) -> &mut [f64] {
        &mut self.current.dummy
    }

    pub fn mu_mut(&mut self) -> &mut [f64] {
        &mut self.current.mu
    }

    /// Rebuilds the states and costates from `solution` with zero shooting residuals.
    pub fn init_x_lmd(&mut self, t: f64, x0: &[f64], solution: &[f64]) {
        for r in self.fonc_f_1.iter_mut().chain(self.fonc_hx_1.iter_mut()) {
            r.fill(0.0);
        }
        self.nlp.retrieve_x(t, x0, solution, &mut self.current.x, &self.fonc_f_1);
        self.nlp.retrieve_lmd(t, solution, &self.current.x, &mut self.current.lmd, &self.fonc_hx_1);
    }

    /// Rebuilds the dummies and multipliers from `solution`.
    pub fn init_dummy_mu(&mut self, solution: &[f64], min_dummy: f64) {
        let current = &mut self.current;
        self.nlp.retrieve_dummy(solution, &mut current.dummy, &current.mu, min_dummy);
        self.nlp.retrieve_mu(solution, &current.dummy, &mut current.mu);
    }

    pub fn clip_dummy(&mut self, min_dummy: f64) {
        clip_dummy(&mut self.current.dummy, min_dummy);
    }

    /// Evaluates every residual block at the current iterate.
    pub fn eval_fonc(&mut self, t: f64, x0: &[f64], solution: &[f64]) {
        let nlp = &mut self.nlp;
        let p = &self.current;
        nlp.eval_fonc_hu(t, x0, solution, &p.x, &p.lmd, &p.dummy, &p.mu, &mut self.fonc_hu);
        nlp.eval_fonc_f(t, x0, solution, &p.x, &mut self.fonc_f);
        nlp.eval_fonc_hx(t, solution, &p.x, &p.lmd, &mut self.fonc_hx);
        nlp.eval_fonc_hdummy(solution, &p.dummy, &p.mu, &mut self.fonc_hdummy);
        nlp.eval_fonc_hmu(solution, &p.dummy, &p.mu, &mut self.fonc_hmu);
    }

    /// Norm of all residual blocks of the last evaluation.
    pub fn opt_error(&self) -> f64 {
        let stages: f64 = self.fonc_f.iter().chain(&self.fonc_hx).map(|r| squared_norm(r)).sum();
        (squared_norm(&self.fonc_hu) + stages + squared_norm(&self.fonc_hdummy) + squared_norm(&self.fonc_hmu))
            .sqrt()
    }

    /// Per-stage norm of all residual blocks of the last evaluation.
    pub fn stage_opt_errors(&self) -> Vec<f64> {
        let (nuc, nub) = (self.nlp.nuc(), self.nlp.nub());
        (0..self.nlp.n())
            .map(|i| {
                (squared_norm(&self.fonc_hu[i * nuc..(i + 1) * nuc])
                    + squared_norm(&self.fonc_f[i])
                    + squared_norm(&self.fonc_hx[i])
                    + squared_norm(&self.fonc_hdummy[i * nub..(i + 1) * nub])
                    + squared_norm(&self.fonc_hmu[i * nub..(i + 1) * nub]))
                .sqrt()
            })
            .collect()
    }

    /// The condensed continuation system at `(t, x0, solution)`.
    pub fn linearize<'a>(
        &'a mut self,
        t: f64,
        x0: &'a [f64],
        solution: &'a [f64],
    ) -> CondensedLinearization<'a, O> {
        CondensedLinearization { condensing: self, t, x0, solution }
    }

    /// Propagates the eliminated variables over `sampling_time` along the control-input
    /// derivative `solution_update` returned by GMRES. Must follow a solve of [`Self::linearize`]
    /// at the same point.
    pub fn expand(&mut self, t: f64, solution: &[f64], solution_update: &[f64], sampling_time: f64, min_dummy: f64) {
        let eps = self.finite_difference_epsilon;
        self.eval_point_2(t + eps, solution, solution_update);
        let ratio = sampling_time / eps;
        let p2 = &self.point_2;
        for (cur, next) in self.current.x.iter_mut().zip(&p2.x).chain(self.current.lmd.iter_mut().zip(&p2.lmd)) {
            for (c, &n) in cur.iter_mut().zip(next) {
                *c += ratio * (n - *c);
            }
        }

        let p = &mut self.current;
        self.nlp.retrieve_dummy_update(solution, &p.dummy, &p.mu, solution_update, &mut self.dummy_update);
        self.nlp.retrieve_mu_update(solution, &p.dummy, &p.mu, solution_update, &mut self.mu_update);
        for ((d, &inv), &du) in p.dummy.iter_mut().zip(&self.hdummy_inv).zip(&self.dummy_update) {
            *d += sampling_time * (-self.zeta * inv - du);
        }
        for ((m, &inv), &mu_u) in p.mu.iter_mut().zip(&self.hmu_inv).zip(&self.mu_update) {
            *m += sampling_time * (-self.zeta * inv - mu_u);
        }
        clip_dummy(&mut p.dummy, min_dummy);
    }

    /// Point 1: `t + eps`, `x0 + eps f`, the contracted shooting residuals and the contracted
    /// bound variables, at the current control inputs.
    fn eval_point_1(&mut self, t: f64, x0: &[f64], solution: &[f64]) {
        let eps = self.finite_difference_epsilon;
        let t_1 = t + eps;
        let nu = self.nlp.nu();
        self.nlp.ocp().eval_f(t, x0, &solution[..nu], &mut self.dx);
        axpy_into(&mut self.x0_1, x0, eps, &self.dx);

        let contraction = 1.0 - eps * self.zeta;
        for (target, r) in self.fonc_f_1.iter_mut().zip(&self.fonc_f).chain(self.fonc_hx_1.iter_mut().zip(&self.fonc_hx)) {
            for (ti, &ri) in target.iter_mut().zip(r) {
                *ti = contraction * ri;
            }
        }

        let p = &self.current;
        bounds::multiply_hdummy_inv(&p.dummy, &p.mu, &self.fonc_hdummy, &self.fonc_hmu, &mut self.hdummy_inv);
        bounds::multiply_hmu_inv(&p.dummy, &p.mu, &self.fonc_hdummy, &self.fonc_hmu, &self.hdummy_inv, &mut self.hmu_inv);
        let step = eps * self.zeta;
        let p1 = &mut self.point_1;
        axpy_into(&mut p1.dummy, &p.dummy, -step, &self.hdummy_inv);
        axpy_into(&mut p1.mu, &p.mu, -step, &self.hmu_inv);

        self.nlp.retrieve_x(t_1, &self.x0_1, solution, &mut p1.x, &self.fonc_f_1);
        self.nlp.retrieve_lmd(t_1, solution, &p1.x, &mut p1.lmd, &self.fonc_hx_1);
        self.nlp.eval_fonc_hu(t_1, &self.x0_1, solution, &p1.x, &p1.lmd, &p1.dummy, &p1.mu, &mut self.fonc_hu_1);
    }

    /// Point 2: point 1 moved along `direction` in the control inputs, with the bound variables
    /// following the linearized coupling. Requires [`Self::eval_point_1`] at the same point.
    fn eval_point_2(&mut self, t_1: f64, solution: &[f64], direction: &[f64]) {
        let eps = self.finite_difference_epsilon;
        axpy_into(&mut self.solution_1, solution, eps, direction);

        let p = &self.current;
        self.nlp.retrieve_dummy_update(solution, &p.dummy, &p.mu, direction, &mut self.dummy_update);
        self.nlp.retrieve_mu_update(solution, &p.dummy, &p.mu, direction, &mut self.mu_update);
        let (p1, p2) = (&self.point_1, &mut self.point_2);
        axpy_into(&mut p2.dummy, &p1.dummy, -eps, &self.dummy_update);
        axpy_into(&mut p2.mu, &p1.mu, -eps, &self.mu_update);

        self.nlp.retrieve_x(t_1, &self.x0_1, &self.solution_1, &mut p2.x, &self.fonc_f_1);
        self.nlp.retrieve_lmd(t_1, &self.solution_1, &p2.x, &mut p2.lmd, &self.fonc_hx_1);
        self.nlp.eval_fonc_hu(t_1, &self.x0_1, &self.solution_1, &p2.x, &p2.lmd, &p2.dummy, &p2.mu, &mut self.fonc_hu_2);
    }
}

/// Condensed continuation system of [`ContinuationGmresCondensing`] frozen at one point.
pub struct CondensedLinearization<'a, O> {
    condensing: &'a mut ContinuationGmresCondensing<O>,
    t: f64,
    x0: &'a [f64],
    solution: &'a [f64],
}

impl<O: Ocp> LinearProblem<f64> for CondensedLinearization<'_, O> {
    fn dim(&self) -> usize {
        self.condensing.dim()
    }

    fn eval_b(&mut self, x0: &[f64], b: &mut [f64]) {
        let c = &mut *self.condensing;
        let eps = c.finite_difference_epsilon;
        c.eval_fonc(self.t, self.x0, self.solution);
        c.eval_point_1(self.t, self.x0, self.solution);
        c.eval_point_2(self.t + eps, self.solution, x0);
        let coeff = 1.0 / eps - c.zeta;
        for ((bi, &f), &f2) in b.iter_mut().zip(&c.fonc_hu).zip(&c.fonc_hu_2) {
            *bi = coeff * f - f2 / eps;
        }
    }

    fn eval_ax(&mut self, v: &[f64], ax: &mut [f64]) {
        let c = &mut *self.condensing;
        let eps = c.finite_difference_epsilon;
        c.eval_point_2(self.t + eps, self.solution, v);
        for ((ai, &f1), &f2) in ax.iter_mut().zip(&c.fonc_hu_1).zip(&c.fonc_hu_2) {
            *ai = (f2 - f1) / eps;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Horizon;
    use crate::problems::CartPole;
    use crate::solver::MatrixFreeGmres;
    use approx::assert_abs_diff_eq;

    fn condensing(ocp: CartPole, n: usize) -> ContinuationGmresCondensing<CartPole> {
        let nlp = MultipleShootingNlp::new(ocp, Horizon::new(1.0, 0.0).unwrap(), n).unwrap();
        ContinuationGmresCondensing::new(nlp, 1e-8, 10.0).unwrap()
    }

    #[test]
    fn initialized_trajectories_have_zero_shooting_residuals() {
        let n = 5;
        let mut c = condensing(CartPole::default(), n);
        let x0 = [0.1, 0.6, 0.0, -0.1];
        let solution = vec![0.2; n];
        c.init_x_lmd(0.0, &x0, &solution);
        c.eval_fonc(0.0, &x0, &solution);
        for r in c.fonc_f.iter().chain(&c.fonc_hx) {
            assert!(squared_norm(r).sqrt() < 1e-12);
        }
        assert_abs_diff_eq!(c.opt_error(), squared_norm(&c.fonc_hu).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn expansion_keeps_trajectories_consistent() {
        let n = 6;
        let ocp = CartPole::default().with_force_bound(-5.0, 5.0, 0.1).unwrap();
        let mut c = condensing(ocp, n);
        let mut gmres = MatrixFreeGmres::new(c.dim(), c.dim()).unwrap();
        let x0 = [0.0, 0.3, 0.0, 0.0];
        let solution = vec![0.5; n];
        c.init_x_lmd(0.0, &x0, &solution);
        c.init_dummy_mu(&solution, 1e-3);

        let mut update = vec![0.0; n];
        gmres.solve(&mut c.linearize(0.0, &x0, &solution), &mut update).unwrap();
        let before = c.opt_error();
        let dt = 1e-3;
        c.expand(0.0, &solution, &update, dt, 1e-3);
        let next: Vec<f64> = solution.iter().zip(&update).map(|(s, u)| s + dt * u).collect();

        let mut dx = [0.0; 4];
        c.nlp().ocp().eval_f(0.0, &x0, &solution[..1], &mut dx);
        let x_next: Vec<f64> = x0.iter().zip(&dx).map(|(xi, di)| xi + dt * di).collect();
        c.eval_fonc(dt, &x_next, &next);
        let after = c.opt_error();
        assert!(after.is_finite());
        assert!(after < before, "{after} >= {before}");
        assert!(c.dummy().iter().all(|&d| d >= 1e-3));
    }
}
