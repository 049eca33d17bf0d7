//! Multiple-shooting NLP over a horizon discretized into `N` forward-Euler stages.
//!
//! States, costates, dummies and multipliers are separate unknowns next to the control inputs.
//! Their residuals are
//!
//! - `fonc_f[i]  = x_{i+1} - x_i - dt f(t_i, x_i, u_i)` for `i = 0 .. N-1` (with `x_0` the
//!   measured state)
//! - `fonc_hx[i] = lmd_{i+1} - lmd_{i+2} - dt hx(t_{i+1}, x_{i+1}, uc_{i+1}, lmd_{i+2})` for
//!   `i = 0 .. N-2`, and `fonc_hx[N-1] = lmd_N - phix(t + T, x_N)`
//!
//! and the `retrieve_*` routines invert these relations: given prescribed residuals they
//! reconstruct the trajectories that produce them. This is what lets the condensing
//! linearization eliminate everything but the control inputs.
//!
//! Trajectories are indexed `0 ..= N`; entry 0 of the state is always the measured state and
//! entry 0 of the costate is never used.

use crate::bounds::{clip_dummy, shooting};
use crate::config::Horizon;
use crate::error::CgmresError;
use crate::ocp::{self, Ocp, OcpDims};

pub struct MultipleShootingNlp<O> {
    ocp: O,
    dims: OcpDims,
    nub: usize,
    horizon: Horizon,
    n: usize,
    work: Vec<f64>,
    bound_work: Vec<f64>,
}

impl<O: Ocp> MultipleShootingNlp<O> {
    pub fn new(ocp: O, horizon: Horizon, n: usize) -> Result<Self, CgmresError> {
        let dims = ocp::validate(&ocp)?;
        if n == 0 {
            return Err(CgmresError::InvalidArgument(
                "[MultipleShootingNlp] the number of stages must be positive".into(),
            ));
        }
        let nub = ocp.ubounds().nub();
        Ok(Self {
            work: vec![0.0; dims.nx],
            bound_work: vec![0.0; n * nub],
            ocp,
            dims,
            nub,
            horizon,
            n,
        })
    }

    /// Length of the condensed decision vector, `N nuc`.
    pub fn dim(&self) -> usize {
        self.n * self.dims.nuc()
    }

    pub fn nx(&self) -> usize {
        self.dims.nx
    }

    pub fn nu(&self) -> usize {
        self.dims.nu
    }

    pub fn nuc(&self) -> usize {
        self.dims.nuc()
    }

    pub fn nub(&self) -> usize {
        self.nub
    }

    /// Number of discretization stages.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    pub fn ocp(&self) -> &O {
        &self.ocp
    }

    pub fn synchronize_ocp(&mut self) {
        self.ocp.synchronize();
    }

    fn stage_dt(&self, t: f64) -> f64 {
        self.horizon.length(t) / self.n as f64
    }

    fn stage<'a>(&self, solution: &'a [f64], i: usize) -> &'a [f64] {
        let nuc = self.nuc();
        &solution[i * nuc..(i + 1) * nuc]
    }

    /// Stage-wise `hu(t_i, x_i, uc_i, lmd_{i+1})` plus the bound terms.
    #[allow(clippy::too_many_arguments)]
    pub fn eval_fonc_hu(
        &self,
        t: f64,
        x0: &[f64],
        solution: &[f64],
        x: &[Vec<f64>],
        lmd: &[Vec<f64>],
        dummy: &[f64],
        mu: &[f64],
        fonc_hu: &mut [f64],
    ) {
        let dt = self.stage_dt(t);
        let nuc = self.nuc();
        for (i, hu_i) in fonc_hu.chunks_exact_mut(nuc).enumerate() {
            let xi: &[f64] = if i == 0 { x0 } else { &x[i] };
            self.ocp.eval_hu(t + i as f64 * dt, xi, self.stage(solution, i), &lmd[i + 1], hu_i);
        }
        shooting::eval_fonc_hu(self.ocp.ubounds(), nuc, solution, dummy, mu, fonc_hu);
    }

    /// State-equation residuals `fonc_f[0 .. N]`.
    pub fn eval_fonc_f(
        &mut self,
        t: f64,
        x0: &[f64],
        solution: &[f64],
        x: &[Vec<f64>],
        fonc_f: &mut [Vec<f64>],
    ) {
        let dt = self.stage_dt(t);
        let nu = self.nu();
        for (i, res) in fonc_f.iter_mut().enumerate() {
            let xi: &[f64] = if i == 0 { x0 } else { &x[i] };
            let uc_i = self.stage(solution, i);
            self.ocp.eval_f(t + i as f64 * dt, xi, &uc_i[..nu], &mut self.work);
            for (((r, &next), &cur), &dx) in res.iter_mut().zip(&x[i + 1]).zip(xi).zip(&self.work) {
                *r = next - cur - dt * dx;
            }
        }
    }

    /// Costate-equation residuals `fonc_hx[0 .. N]`.
    pub fn eval_fonc_hx(
        &mut self,
        t: f64,
        solution: &[f64],
        x: &[Vec<f64>],
        lmd: &[Vec<f64>],
        fonc_hx: &mut [Vec<f64>],
    ) {
        let dt = self.stage_dt(t);
        let n = self.n;
        self.ocp.eval_phix(t + self.horizon.length(t), &x[n], &mut self.work);
        for ((r, &l), &phix) in fonc_hx[n - 1].iter_mut().zip(&lmd[n]).zip(&self.work) {
            *r = l - phix;
        }
        for i in 0..n - 1 {
            let uc_i1 = self.stage(solution, i + 1);
            self.ocp.eval_hx(t + (i + 1) as f64 * dt, &x[i + 1], uc_i1, &lmd[i + 2], &mut self.work);
            for (((r, &cur), &next), &hx) in
                fonc_hx[i].iter_mut().zip(&lmd[i + 1]).zip(&lmd[i + 2]).zip(&self.work)
            {
                *r = cur - next - dt * hx;
            }
        }
    }

    pub fn eval_fonc_hdummy(&self, solution: &[f64], dummy: &[f64], mu: &[f64], fonc_hdummy: &mut [f64]) {
        shooting::eval_fonc_hdummy(self.ocp.ubounds(), self.nuc(), solution, dummy, mu, fonc_hdummy);
    }

    pub fn eval_fonc_hmu(&self, solution: &[f64], dummy: &[f64], mu: &[f64], fonc_hmu: &mut [f64]) {
        shooting::eval_fonc_hmu(self.ocp.ubounds(), self.nuc(), solution, dummy, mu, fonc_hmu);
    }

    /// Reconstructs the states that produce the state-equation residuals `fonc_f`.
    pub fn retrieve_x(
        &mut self,
        t: f64,
        x0: &[f64],
        solution: &[f64],
        x: &mut [Vec<f64>],
        fonc_f: &[Vec<f64>],
    ) {
        let dt = self.stage_dt(t);
        let nu = self.nu();
        x[0].copy_from_slice(x0);
        for i in 0..self.n {
            let uc_i = self.stage(solution, i);
            self.ocp.eval_f(t + i as f64 * dt, &x[i], &uc_i[..nu], &mut self.work);
            let (head, tail) = x.split_at_mut(i + 1);
            for (((next, &cur), &dx), &r) in tail[0].iter_mut().zip(&head[i]).zip(&self.work).zip(&fonc_f[i]) {
                *next = cur + dt * dx + r;
            }
        }
    }

    /// Reconstructs the costates that produce the costate-equation residuals `fonc_hx`.
    pub fn retrieve_lmd(
        &mut self,
        t: f64,
        solution: &[f64],
        x: &[Vec<f64>],
        lmd: &mut [Vec<f64>],
        fonc_hx: &[Vec<f64>],
    ) {
        let dt = self.stage_dt(t);
        let n = self.n;
        self.ocp.eval_phix(t + self.horizon.length(t), &x[n], &mut lmd[n]);
        for (l, &r) in lmd[n].iter_mut().zip(&fonc_hx[n - 1]) {
            *l += r;
        }
        for i in (1..n).rev() {
            let uc_i = self.stage(solution, i);
            let (head, tail) = lmd.split_at_mut(i + 1);
            self.ocp.eval_hx(t + i as f64 * dt, &x[i], uc_i, &tail[0], &mut self.work);
            for (((cur, &next), &hx), &r) in
                head[i].iter_mut().zip(&tail[0]).zip(&self.work).zip(&fonc_hx[i - 1])
            {
                *cur = next + dt * hx + r;
            }
        }
    }

    /// Dummies that satisfy the bound equalities at `solution`, floored at `min_dummy`.
    pub fn retrieve_dummy(&mut self, solution: &[f64], dummy: &mut [f64], mu: &[f64], min_dummy: f64) {
        if self.nub == 0 {
            return;
        }
        dummy.fill(0.0);
        shooting::eval_fonc_hmu(self.ocp.ubounds(), self.nuc(), solution, dummy, mu, &mut self.bound_work);
        for (d, r) in dummy.iter_mut().zip(&self.bound_work) {
            *d = r.abs().sqrt();
        }
        clip_dummy(dummy, min_dummy);
    }

    /// Multipliers that satisfy the dummy stationarity at `(solution, dummy)`.
    pub fn retrieve_mu(&mut self, solution: &[f64], dummy: &[f64], mu: &mut [f64]) {
        if self.nub == 0 {
            return;
        }
        mu.fill(0.0);
        shooting::eval_fonc_hdummy(self.ocp.ubounds(), self.nuc(), solution, dummy, mu, &mut self.bound_work);
        for ((m, &d), &r) in mu.iter_mut().zip(dummy).zip(&self.bound_work) {
            *m = -r / (2.0 * d);
        }
    }

    pub fn retrieve_dummy_update(
        &self,
        solution: &[f64],
        dummy: &[f64],
        mu: &[f64],
        solution_update: &[f64],
        dummy_update: &mut [f64],
    ) {
        shooting::retrieve_dummy_update(self.ocp.ubounds(), self.nuc(), solution, dummy, mu, solution_update, dummy_update);
    }

    pub fn retrieve_mu_update(
        &self,
        solution: &[f64],
        dummy: &[f64],
        mu: &[f64],
        solution_update: &[f64],
        mu_update: &mut [f64],
    ) {
        shooting::retrieve_mu_update(self.ocp.ubounds(), self.nuc(), solution, dummy, mu, solution_update, mu_update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::CartPole;
    use approx::assert_abs_diff_eq;

    fn setup(n: usize) -> (MultipleShootingNlp<CartPole>, Vec<f64>) {
        let nlp = MultipleShootingNlp::new(CartPole::default(), Horizon::new(1.2, 0.0).unwrap(), n).unwrap();
        let solution = (0..n).map(|i| 0.3 * (i as f64).sin()).collect();
        (nlp, solution)
    }

    #[test]
    fn retrieved_trajectories_reproduce_prescribed_residuals() {
        let n = 6;
        let (mut nlp, solution) = setup(n);
        let x0 = [0.2, 0.1, -0.3, 0.5];
        let t = 0.4;
        let fonc_f_target: Vec<Vec<f64>> = (0..n).map(|i| vec![1e-3 * i as f64; 4]).collect();
        let fonc_hx_target: Vec<Vec<f64>> = (0..n).map(|i| vec![-2e-3 * i as f64; 4]).collect();

        let mut x = vec![vec![0.0; 4]; n + 1];
        let mut lmd = vec![vec![0.0; 4]; n + 1];
        nlp.retrieve_x(t, &x0, &solution, &mut x, &fonc_f_target);
        nlp.retrieve_lmd(t, &solution, &x, &mut lmd, &fonc_hx_target);

        let mut fonc_f = vec![vec![0.0; 4]; n];
        let mut fonc_hx = vec![vec![0.0; 4]; n];
        nlp.eval_fonc_f(t, &x0, &solution, &x, &mut fonc_f);
        nlp.eval_fonc_hx(t, &solution, &x, &lmd, &mut fonc_hx);
        for i in 0..n {
            for j in 0..4 {
                assert_abs_diff_eq!(fonc_f[i][j], fonc_f_target[i][j], epsilon = 1e-12);
                assert_abs_diff_eq!(fonc_hx[i][j], fonc_hx_target[i][j], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn zero_residual_retrieval_matches_single_shooting() {
        use crate::nlp::{Nlp, SingleShootingNlp};
        let n = 5;
        let (mut nlp, solution) = setup(n);
        let mut single =
            SingleShootingNlp::new(CartPole::default(), Horizon::new(1.2, 0.0).unwrap(), n).unwrap();
        let x0 = [0.0, 0.8, 0.1, 0.0];
        let zeros = vec![vec![0.0; 4]; n];
        let mut x = vec![vec![0.0; 4]; n + 1];
        let mut lmd = vec![vec![0.0; 4]; n + 1];
        nlp.retrieve_x(0.0, &x0, &solution, &mut x, &zeros);
        nlp.retrieve_lmd(0.0, &solution, &x, &mut lmd, &zeros);
        let mut hu = vec![0.0; n];
        nlp.eval_fonc_hu(0.0, &x0, &solution, &x, &lmd, &[], &[], &mut hu);

        let mut hu_single = vec![0.0; n];
        single.eval_fonc_hu(0.0, &x0, &solution, &mut hu_single);
        for i in 0..n {
            assert_abs_diff_eq!(hu[i], hu_single[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn retrieved_dummy_and_mu_zero_the_bound_residuals() {
        let n = 3;
        let ocp = CartPole::default().with_force_bound(-1.0, 1.0, 0.2).unwrap();
        let mut nlp = MultipleShootingNlp::new(ocp, Horizon::new(1.0, 0.0).unwrap(), n).unwrap();
        let solution = [0.5, -0.2, 0.9];
        let mut dummy = [0.0; 3];
        let mut mu = [0.0; 3];
        nlp.retrieve_dummy(&solution, &mut dummy, &mu, 1e-3);
        nlp.retrieve_mu(&solution, &dummy, &mut mu);
        let mut hdummy = [1.0; 3];
        let mut hmu = [1.0; 3];
        nlp.eval_fonc_hdummy(&solution, &dummy, &mu, &mut hdummy);
        nlp.eval_fonc_hmu(&solution, &dummy, &mu, &mut hmu);
        for i in 0..n {
            assert_abs_diff_eq!(hdummy[i], 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(hmu[i], 0.0, epsilon = 1e-12);
        }
    }
}
