//! Single-shooting NLP over a horizon discretized into `N` forward-Euler stages.
//!
//! The decision vector is `[uc_0 .. uc_{N-1}, dummy (N nub), mu (N nub)]`. States are rolled out
//! forward from the measured state and costates backward from the terminal-cost gradient, so
//! only the stage-wise stationarity conditions remain as unknowns.

use crate::bounds::{clip_dummy, shooting};
use crate::config::Horizon;
use crate::error::CgmresError;
use crate::nlp::Nlp;
use crate::ocp::{self, Ocp, OcpDims};

pub struct SingleShootingNlp<O> {
    ocp: O,
    dims: OcpDims,
    nub: usize,
    horizon: Horizon,
    n: usize,
    x: Vec<Vec<f64>>,
    lmd: Vec<Vec<f64>>,
    dx: Vec<f64>,
}

impl<O: Ocp> SingleShootingNlp<O> {
    pub fn new(ocp: O, horizon: Horizon, n: usize) -> Result<Self, CgmresError> {
        let dims = ocp::validate(&ocp)?;
        if n == 0 {
            return Err(CgmresError::InvalidArgument(
                "[SingleShootingNlp] the number of stages must be positive".into(),
            ));
        }
        let nub = ocp.ubounds().nub();
        Ok(Self {
            x: vec![vec![0.0; dims.nx]; n + 1],
            lmd: vec![vec![0.0; dims.nx]; n + 1],
            dx: vec![0.0; dims.nx],
            ocp,
            dims,
            nub,
            horizon,
            n,
        })
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

    /// States `x_0 .. x_N` of the last rollout.
    pub fn x(&self) -> &[Vec<f64>] {
        &self.x
    }

    /// Costates `lmd_0 .. lmd_N` of the last rollout. `lmd_0` is never computed.
    pub fn lmd(&self) -> &[Vec<f64>] {
        &self.lmd
    }

    fn stage_dt(&self, t: f64) -> f64 {
        self.horizon.length(t) / self.n as f64
    }

    /// Splits the decision vector into `(uc, dummy, mu)`, each stacked over the stages.
    pub fn split<'a>(&self, solution: &'a [f64]) -> (&'a [f64], &'a [f64], &'a [f64]) {
        let (uc, rest) = solution.split_at(self.n * self.nuc());
        let (dummy, mu) = rest.split_at(self.n * self.nub);
        (uc, dummy, mu)
    }

    fn split_mut<'a>(&self, v: &'a mut [f64]) -> (&'a mut [f64], &'a mut [f64], &'a mut [f64]) {
        let (uc, rest) = v.split_at_mut(self.n * self.nuc());
        let (dummy, mu) = rest.split_at_mut(self.n * self.nub);
        (uc, dummy, mu)
    }

    /// `x_{i+1} = x_i + dt f(t_i, x_i, u_i)` starting from `x_0 = x0`.
    pub fn forward_rollout(&mut self, t: f64, x0: &[f64], uc: &[f64]) {
        let dt = self.stage_dt(t);
        let nuc = self.nuc();
        let nu = self.dims.nu;
        self.x[0].copy_from_slice(x0);
        for (i, uc_i) in uc.chunks_exact(nuc).enumerate() {
            self.ocp.eval_f(t + i as f64 * dt, &self.x[i], &uc_i[..nu], &mut self.dx);
            let (head, tail) = self.x.split_at_mut(i + 1);
            for ((next, &xi), &dxi) in tail[0].iter_mut().zip(&head[i]).zip(&self.dx) {
                *next = xi + dt * dxi;
            }
        }
    }

    /// `lmd_N = phix(t + T, x_N)` and `lmd_i = lmd_{i+1} + dt hx(t_i, x_i, uc_i, lmd_{i+1})`.
    pub fn backward_rollout(&mut self, t: f64, uc: &[f64]) {
        let dt = self.stage_dt(t);
        let nuc = self.nuc();
        let n = self.n;
        self.ocp.eval_phix(t + self.horizon.length(t), &self.x[n], &mut self.lmd[n]);
        for i in (1..n).rev() {
            let uc_i = &uc[i * nuc..(i + 1) * nuc];
            let (head, tail) = self.lmd.split_at_mut(i + 1);
            self.ocp.eval_hx(t + i as f64 * dt, &self.x[i], uc_i, &tail[0], &mut self.dx);
            for ((cur, &next), &hx) in head[i].iter_mut().zip(&tail[0]).zip(&self.dx) {
                *cur = next + dt * hx;
            }
        }
    }

    /// Stage-wise `hu` on the rolled-out trajectory, then the bound conditions.
    fn assemble_fonc(&self, t: f64, solution: &[f64], fonc_hu: &mut [f64]) {
        let dt = self.stage_dt(t);
        let nuc = self.nuc();
        let (uc, dummy, mu) = self.split(solution);
        let (hu, hdummy, hmu) = self.split_mut(fonc_hu);
        for (i, (uc_i, hu_i)) in uc.chunks_exact(nuc).zip(hu.chunks_exact_mut(nuc)).enumerate() {
            self.ocp.eval_hu(t + i as f64 * dt, &self.x[i], uc_i, &self.lmd[i + 1], hu_i);
        }
        let bounds = self.ocp.ubounds();
        shooting::eval_fonc_hu(bounds, nuc, uc, dummy, mu, hu);
        shooting::eval_fonc_hdummy(bounds, nuc, uc, dummy, mu, hdummy);
        shooting::eval_fonc_hmu(bounds, nuc, uc, dummy, mu, hmu);
    }
}

impl<O: Ocp> Nlp for SingleShootingNlp<O> {
    type Problem = O;

    fn dim(&self) -> usize {
        self.n * (self.dims.nuc() + 2 * self.nub)
    }

    fn nx(&self) -> usize {
        self.dims.nx
    }

    fn nu(&self) -> usize {
        self.dims.nu
    }

    fn ocp(&self) -> &O {
        &self.ocp
    }

    fn synchronize_ocp(&mut self) {
        self.ocp.synchronize();
    }

    fn eval_fonc_hu(&mut self, t: f64, x: &[f64], solution: &[f64], fonc_hu: &mut [f64]) {
        let uc = &solution[..self.n * self.nuc()];
        self.forward_rollout(t, x, uc);
        self.backward_rollout(t, uc);
        self.assemble_fonc(t, solution, fonc_hu);
    }

    fn retrieve_dummy(&self, solution: &mut [f64], fonc_hu: &mut [f64], min_dummy: f64) {
        if self.nub == 0 {
            return;
        }
        let (uc, dummy, mu) = self.split_mut(solution);
        let (_, _, hmu) = self.split_mut(fonc_hu);
        dummy.fill(0.0);
        shooting::eval_fonc_hmu(self.ocp.ubounds(), self.nuc(), uc, dummy, mu, hmu);
        for (d, r) in dummy.iter_mut().zip(hmu.iter()) {
            *d = r.abs().sqrt();
        }
        clip_dummy(dummy, min_dummy);
    }

    fn retrieve_mu(&self, solution: &mut [f64], fonc_hu: &mut [f64]) {
        if self.nub == 0 {
            return;
        }
        let (uc, dummy, mu) = self.split_mut(solution);
        let (_, hdummy, _) = self.split_mut(fonc_hu);
        mu.fill(0.0);
        shooting::eval_fonc_hdummy(self.ocp.ubounds(), self.nuc(), uc, dummy, mu, hdummy);
        for ((m, d), r) in mu.iter_mut().zip(dummy.iter()).zip(hdummy.iter()) {
            *m = -r / (2.0 * d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::CartPole;
    use approx::assert_abs_diff_eq;

    fn nlp(n: usize) -> SingleShootingNlp<CartPole> {
        SingleShootingNlp::new(CartPole::default(), Horizon::new(1.0, 0.0).unwrap(), n).unwrap()
    }

    #[test]
    fn rollout_follows_forward_euler() {
        let mut nlp = nlp(4);
        let x0 = [0.1, 0.5, 0.0, -0.2];
        let uc = [0.3, -0.1, 0.2, 0.0];
        nlp.forward_rollout(0.0, &x0, &uc);

        let mut x = x0.to_vec();
        let mut dx = [0.0; 4];
        for (i, u) in uc.iter().enumerate() {
            nlp.ocp().eval_f(0.25 * i as f64, &x, &[*u], &mut dx);
            for j in 0..4 {
                x[j] += 0.25 * dx[j];
            }
            for j in 0..4 {
                assert_abs_diff_eq!(nlp.x()[i + 1][j], x[j], epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn costate_ends_at_terminal_gradient() {
        let mut nlp = nlp(5);
        let solution = vec![0.2; 5];
        let mut fonc = vec![0.0; 5];
        nlp.eval_fonc_hu(0.0, &[0.0, 0.3, 0.0, 0.0], &solution, &mut fonc);
        let mut phix = [0.0; 4];
        nlp.ocp().eval_phix(1.0, &nlp.x()[5], &mut phix);
        assert_eq!(nlp.lmd()[5].as_slice(), &phix);
        assert!(fonc.iter().all(|v| v.is_finite()));
    }

    /// The FONC residual is the gradient of the discretized cost along the rollout.
    #[test]
    fn residual_matches_gradient_of_discrete_cost() {
        let mut nlp = nlp(3);
        let ocp = nlp.ocp().clone();
        let x0 = [0.1, 0.4, -0.3, 0.2];
        let dt = 1.0 / 3.0;
        let cost = |uc: &[f64]| {
            let mut x = x0.to_vec();
            let mut dx = [0.0; 4];
            let mut j = 0.0;
            for (i, &u) in uc.iter().enumerate() {
                let stage: f64 = (0..4).map(|k| 0.5 * ocp.q[k] * (x[k] - ocp.x_ref[k]).powi(2)).sum::<f64>()
                    + 0.5 * ocp.r[0] * u * u;
                j += dt * stage;
                ocp.eval_f(i as f64 * dt, &x, &[u], &mut dx);
                for k in 0..4 {
                    x[k] += dt * dx[k];
                }
            }
            j + (0..4).map(|k| 0.5 * ocp.q_terminal[k] * (x[k] - ocp.x_ref[k]).powi(2)).sum::<f64>()
        };

        let uc = [0.5, -0.4, 0.1];
        let mut fonc = [0.0; 3];
        nlp.eval_fonc_hu(0.0, &x0, &uc, &mut fonc);
        let h = 1e-6;
        for i in 0..3 {
            let mut up = uc;
            let mut um = uc;
            up[i] += h;
            um[i] -= h;
            let grad = (cost(&up[..]) - cost(&um[..])) / (2.0 * h);
            // the stage-wise residual is the gradient divided by dt
            assert_abs_diff_eq!(fonc[i] * dt, grad, epsilon = 1e-6);
        }
    }

    #[test]
    fn zero_stages_are_rejected() {
        let err = SingleShootingNlp::new(CartPole::default(), Horizon::new(1.0, 0.0).unwrap(), 0);
        assert!(matches!(err, Err(CgmresError::InvalidArgument(_))));
    }
}
