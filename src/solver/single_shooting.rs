//! C/GMRES MPC solver on the single-shooting NLP.
//!
//! The decision vector stacks the control inputs of all stages, then the dummies, then the
//! multipliers. Every call to [`SingleShootingCgmresSolver::update`] performs exactly one
//! continuation step and advances the solution by one sampling period.

use std::fmt;

use crate::bounds::clip_dummy;
use crate::config::{Horizon, SolverSettings};
use crate::continuation::ContinuationGmres;
use crate::error::CgmresError;
use crate::nlp::{Nlp, SingleShootingNlp};
use crate::ocp::Ocp;
use crate::solver::{MatrixFreeGmres, blocks, broadcast, stage_norms};
use crate::utils::timer::{Timer, TimingProfile};

pub struct SingleShootingCgmresSolver<O> {
    cgmres: ContinuationGmres<SingleShootingNlp<O>>,
    gmres: MatrixFreeGmres<f64>,
    settings: SolverSettings,
    timer: Timer,
    solution: Vec<f64>,
    solution_update: Vec<f64>,
    gmres_iter: usize,
}

impl<O: Ocp> SingleShootingCgmresSolver<O> {
    pub fn new(
        ocp: O,
        horizon: Horizon,
        settings: SolverSettings,
        n: usize,
        kmax: usize,
    ) -> Result<Self, CgmresError> {
        settings.validate()?;
        let nlp = SingleShootingNlp::new(ocp, horizon, n)?;
        let cgmres = ContinuationGmres::new(nlp, settings.finite_difference_epsilon, settings.zeta)?;
        let dim = cgmres.dim();
        Ok(Self {
            gmres: MatrixFreeGmres::new(dim, kmax)?,
            cgmres,
            settings,
            timer: Timer::new(),
            solution: vec![0.0; dim],
            solution_update: vec![0.0; dim],
            gmres_iter: 0,
        })
    }

    fn nlp(&self) -> &SingleShootingNlp<O> {
        self.cgmres.nlp()
    }

    /// `(n, nu, nuc, nub)`.
    fn sizes(&self) -> (usize, usize, usize, usize) {
        let nlp = self.nlp();
        (nlp.n(), nlp.nu(), nlp.nuc(), nlp.nub())
    }

    pub fn dim(&self) -> usize {
        self.solution.len()
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Sets the control input of every stage to `u`.
    pub fn set_u(&mut self, u: &[f64]) -> Result<(), CgmresError> {
        let (n, nu, nuc, _) = self.sizes();
        CgmresError::check_dim("SingleShootingCgmresSolver::set_u", nu, u.len())?;
        broadcast(&mut self.solution[..n * nuc], nuc, 0, u);
        Ok(())
    }

    /// Sets the control input and equality multipliers of every stage to `uc`.
    pub fn set_uc(&mut self, uc: &[f64]) -> Result<(), CgmresError> {
        let (n, _, nuc, _) = self.sizes();
        CgmresError::check_dim("SingleShootingCgmresSolver::set_uc", nuc, uc.len())?;
        broadcast(&mut self.solution[..n * nuc], nuc, 0, uc);
        Ok(())
    }

    pub fn set_dummy(&mut self, dummy: &[f64]) -> Result<(), CgmresError> {
        let (n, _, nuc, nub) = self.sizes();
        CgmresError::check_dim("SingleShootingCgmresSolver::set_dummy", nub, dummy.len())?;
        let start = n * nuc;
        broadcast(&mut self.solution[start..start + n * nub], nub, 0, dummy);
        Ok(())
    }

    pub fn set_mu(&mut self, mu: &[f64]) -> Result<(), CgmresError> {
        let (n, _, nuc, nub) = self.sizes();
        CgmresError::check_dim("SingleShootingCgmresSolver::set_mu", nub, mu.len())?;
        let start = n * (nuc + nub);
        broadcast(&mut self.solution[start..], nub, 0, mu);
        Ok(())
    }

    /// Sets the dummies and multipliers consistent with the current control inputs.
    pub fn init_dummy_mu(&mut self) {
        self.cgmres.retrieve_dummy(&mut self.solution, self.settings.min_dummy);
        self.cgmres.retrieve_mu(&mut self.solution);
    }

    pub fn uopt(&self) -> Vec<&[f64]> {
        let (_, nu, _, _) = self.sizes();
        self.ucopt().into_iter().map(|uc| &uc[..nu]).collect()
    }

    pub fn ucopt(&self) -> Vec<&[f64]> {
        let (n, _, nuc, _) = self.sizes();
        blocks(&self.solution, nuc, n)
    }

    pub fn dummyopt(&self) -> Vec<&[f64]> {
        let (n, _, nuc, nub) = self.sizes();
        blocks(&self.solution[n * nuc..], nub, n)
    }

    pub fn muopt(&self) -> Vec<&[f64]> {
        let (n, _, nuc, nub) = self.sizes();
        blocks(&self.solution[n * (nuc + nub)..], nub, n)
    }

    /// Costates `lmd_1 .. lmd_N` of the last residual evaluation.
    pub fn lmdopt(&self) -> &[Vec<f64>] {
        &self.nlp().lmd()[1..]
    }

    /// Number of GMRES iterations of the last update.
    pub fn gmres_iter(&self) -> usize {
        self.gmres_iter
    }

    /// Optimality error of the last residual evaluation.
    pub fn opt_error(&self) -> f64 {
        self.cgmres.opt_error()
    }

    /// Optimality error of the current solution at `(t, x)`.
    pub fn opt_error_at(&mut self, t: f64, x: &[f64]) -> Result<f64, CgmresError> {
        CgmresError::check_dim("SingleShootingCgmresSolver::opt_error_at", self.nlp().nx(), x.len())?;
        self.cgmres.synchronize_ocp();
        self.cgmres.eval_fonc(t, x, &self.solution);
        Ok(self.cgmres.opt_error())
    }

    /// Per-stage optimality errors of the last residual evaluation.
    pub fn opt_error_array(&self) -> Vec<f64> {
        let (n, _, nuc, nub) = self.sizes();
        let fonc = self.cgmres.fonc_hu();
        let (hu, rest) = fonc.split_at(n * nuc);
        let (hdummy, hmu) = rest.split_at(n * nub);
        stage_norms(n, &[(hu, nuc), (hdummy, nub), (hmu, nub)])
    }

    pub fn profile(&self) -> TimingProfile {
        self.timer.profile()
    }

    /// One continuation step at `(t, x)`: `solution += sampling_time * update`.
    pub fn update(&mut self, t: f64, x: &[f64]) -> Result<(), CgmresError> {
        CgmresError::check_dim("SingleShootingCgmresSolver::update", self.nlp().nx(), x.len())?;
        if self.settings.verbose_level >= 1 {
            log::info!("update solution at t = {t}");
        }
        self.cgmres.synchronize_ocp();
        let (n, _, nuc, nub) = self.sizes();
        if self.settings.profile_solver {
            self.timer.tick();
        }
        let stats = self
            .gmres
            .solve(&mut self.cgmres.linearize(t, x, &self.solution), &mut self.solution_update)?;
        self.gmres_iter = stats.iterations;
        let opt_error = self.cgmres.opt_error();
        let dt = self.settings.sampling_time;
        for (s, &ds) in self.solution.iter_mut().zip(&self.solution_update) {
            *s += dt * ds;
        }
        let start = n * nuc;
        clip_dummy(&mut self.solution[start..start + n * nub], self.settings.min_dummy);
        if self.settings.profile_solver {
            self.timer.tock();
        }

        if self.settings.verbose_level >= 1 {
            log::info!("opt error: {opt_error:e}");
        }
        if self.settings.verbose_level >= 2 {
            log::debug!("  number of GMRES iter: {} (kmax: {})", stats.iterations, self.gmres.kmax());
        }
        Ok(())
    }
}

impl<O: Ocp + fmt::Display> fmt::Display for SingleShootingCgmresSolver<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Single shooting CGMRES solver:")?;
        writeln!(f, "  N:    {}", self.nlp().n())?;
        writeln!(f, "  kmax: {}", self.gmres.kmax())?;
        writeln!(f, "{}", self.nlp().ocp())?;
        writeln!(f, "{}", self.nlp().horizon())?;
        writeln!(f, "{}", self.settings)?;
        write!(f, "{}", self.timer.profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::CartPole;

    fn solver(n: usize) -> SingleShootingCgmresSolver<CartPole> {
        let ocp = CartPole::default().with_force_bound(-15.0, 15.0, 0.1).unwrap();
        let horizon = Horizon::new(1.0, 0.0).unwrap();
        SingleShootingCgmresSolver::new(ocp, horizon, SolverSettings::default(), n, 5).unwrap()
    }

    #[test]
    fn setters_broadcast_to_every_stage() {
        let mut s = solver(4);
        assert_eq!(s.dim(), 4 * 3);
        s.set_uc(&[0.7]).unwrap();
        s.set_dummy(&[2.0]).unwrap();
        s.set_mu(&[0.1]).unwrap();
        assert!(s.ucopt().iter().all(|uc| uc == &[0.7]));
        assert!(s.uopt().iter().all(|u| u == &[0.7]));
        assert!(s.dummyopt().iter().all(|d| d == &[2.0]));
        assert!(s.muopt().iter().all(|m| m == &[0.1]));
        assert_eq!(s.ucopt().len(), 4);
    }

    #[test]
    fn wrong_lengths_are_rejected_without_side_effects() {
        let mut s = solver(3);
        s.set_u(&[1.0]).unwrap();
        assert!(matches!(
            s.set_u(&[1.0, 2.0]),
            Err(CgmresError::DimensionMismatch { expected: 1, actual: 2, .. })
        ));
        assert!(s.set_mu(&[]).is_err());
        assert!(s.uopt().iter().all(|u| u == &[1.0]));
        assert!(s.update(0.0, &[0.0; 5]).is_err());
    }

    #[test]
    fn opt_error_array_splits_the_norm_by_stage() {
        let mut s = solver(5);
        s.set_uc(&[0.3]).unwrap();
        s.init_dummy_mu();
        let total = s.opt_error_at(0.0, &[0.0, 0.5, 0.0, 0.0]).unwrap();
        let per_stage = s.opt_error_array();
        assert_eq!(per_stage.len(), 5);
        let combined = per_stage.iter().map(|e| e * e).sum::<f64>().sqrt();
        assert!((combined - total).abs() < 1e-10 * total.max(1.0));
        assert_eq!(s.lmdopt().len(), 5);
    }
}
