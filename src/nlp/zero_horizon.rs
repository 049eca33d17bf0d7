//! Zero-horizon NLP: the stationarity conditions of the OCP with a horizon of length zero.
//!
//! With no horizon the costate is the terminal-cost gradient, `lmd = phix(t, x)`, and the
//! residual is `hu(t, x, uc, lmd)` together with the bound conditions. Layout of the decision
//! vector: `[uc (nuc), dummy (nub), mu (nub)]`.

use crate::bounds::clip_dummy;
use crate::error::CgmresError;
use crate::nlp::Nlp;
use crate::ocp::{self, Ocp, OcpDims};

pub struct ZeroHorizonNlp<O> {
    ocp: O,
    dims: OcpDims,
    nub: usize,
    lmd: Vec<f64>,
}

impl<O: Ocp> ZeroHorizonNlp<O> {
    pub fn new(ocp: O) -> Result<Self, CgmresError> {
        let dims = ocp::validate(&ocp)?;
        let nub = ocp.ubounds().nub();
        Ok(Self { lmd: vec![0.0; dims.nx], ocp, dims, nub })
    }

    pub fn nuc(&self) -> usize {
        self.dims.nuc()
    }

    pub fn nub(&self) -> usize {
        self.nub
    }

    /// Costate of the last residual evaluation.
    pub fn lmd(&self) -> &[f64] {
        &self.lmd
    }

    /// Splits the decision vector into `(uc, dummy, mu)`.
    pub fn split<'a>(&self, solution: &'a [f64]) -> (&'a [f64], &'a [f64], &'a [f64]) {
        let (uc, rest) = solution.split_at(self.nuc());
        let (dummy, mu) = rest.split_at(self.nub);
        (uc, dummy, mu)
    }

    fn split_mut<'a>(&self, v: &'a mut [f64]) -> (&'a mut [f64], &'a mut [f64], &'a mut [f64]) {
        let (uc, rest) = v.split_at_mut(self.nuc());
        let (dummy, mu) = rest.split_at_mut(self.nub);
        (uc, dummy, mu)
    }
}

impl<O: Ocp> Nlp for ZeroHorizonNlp<O> {
    type Problem = O;

    fn dim(&self) -> usize {
        self.dims.nuc() + 2 * self.nub
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
        self.ocp.eval_phix(t, x, &mut self.lmd);
        let (uc, dummy, mu) = self.split(solution);
        let (hu, hdummy, hmu) = self.split_mut(fonc_hu);
        self.ocp.eval_hu(t, x, uc, &self.lmd, hu);
        if self.nub > 0 {
            let bounds = self.ocp.ubounds();
            bounds.eval_hu(uc, dummy, mu, hu);
            bounds.eval_hdummy(uc, dummy, mu, hdummy);
            bounds.eval_hmu(uc, dummy, mu, hmu);
        }
    }

    fn retrieve_dummy(&self, solution: &mut [f64], fonc_hu: &mut [f64], min_dummy: f64) {
        if self.nub == 0 {
            return;
        }
        let (uc, dummy, mu) = self.split_mut(solution);
        let (_, _, hmu) = self.split_mut(fonc_hu);
        dummy.fill(0.0);
        self.ocp.ubounds().eval_hmu(uc, dummy, mu, hmu);
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
        self.ocp.ubounds().eval_hdummy(uc, dummy, mu, hdummy);
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

    #[test]
    fn residual_uses_terminal_gradient_as_costate() {
        let ocp = CartPole::default();
        let mut nlp = ZeroHorizonNlp::new(ocp.clone()).unwrap();
        let x = [0.1, 0.2, 0.3, 0.4];
        let solution = [0.7];
        let mut fonc = [0.0];
        nlp.eval_fonc_hu(0.0, &x, &solution, &mut fonc);

        let mut lmd = [0.0; 4];
        ocp.eval_phix(0.0, &x, &mut lmd);
        let mut hu = [0.0];
        ocp.eval_hu(0.0, &x, &solution, &lmd, &mut hu);
        assert_abs_diff_eq!(fonc[0], hu[0]);
        assert_eq!(nlp.lmd(), &lmd);
        assert_eq!(nlp.dim(), 1);
    }

    #[test]
    fn retrieved_dummy_and_mu_satisfy_bound_conditions() {
        let ocp = CartPole::default().with_force_bound(-2.0, 3.0, 0.1).unwrap();
        let mut nlp = ZeroHorizonNlp::new(ocp).unwrap();
        assert_eq!(nlp.dim(), 3);
        let mut solution = [0.5, 0.0, 0.0];
        let mut scratch = [0.0; 3];
        nlp.retrieve_dummy(&mut solution, &mut scratch, 1e-3);
        nlp.retrieve_mu(&mut solution, &mut scratch);
        // dummy^2 = (u - umin)(umax - u), 2 mu dummy = w
        assert_abs_diff_eq!(solution[1] * solution[1], 2.5 * 2.5, epsilon = 1e-12);
        assert_abs_diff_eq!(2.0 * solution[2] * solution[1], 0.1, epsilon = 1e-12);

        let mut fonc = [0.0; 3];
        nlp.eval_fonc_hu(0.0, &[0.0; 4], &solution, &mut fonc);
        assert_abs_diff_eq!(fonc[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fonc[2], 0.0, epsilon = 1e-12);
    }
}
