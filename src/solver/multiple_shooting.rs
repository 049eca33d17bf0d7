//! C/GMRES MPC solver on the condensed multiple-shooting NLP.
//!
//! Only the control inputs go through GMRES; the state, costate, dummy and multiplier
//! trajectories are carried by the condensing step and advanced by its expansion.

use std::fmt;

use crate::config::{Horizon, SolverSettings};
use crate::continuation::ContinuationGmresCondensing;
use crate::error::CgmresError;
use crate::nlp::MultipleShootingNlp;
use crate::ocp::Ocp;
use crate::solver::{MatrixFreeGmres, blocks, broadcast};
use crate::utils::timer::{Timer, TimingProfile};

pub struct MultipleShootingCgmresSolver<O> {
    condensing: ContinuationGmresCondensing<O>,
    gmres: MatrixFreeGmres<f64>,
    settings: SolverSettings,
    timer: Timer,
    solution: Vec<f64>,
    solution_update: Vec<f64>,
    gmres_iter: usize,
}

impl<O: Ocp> MultipleShootingCgmresSolver<O> {
    pub fn new(
        ocp: O,
        horizon: Horizon,
        settings: SolverSettings,
        n: usize,
        kmax: usize,
    ) -> Result<Self, CgmresError> {
        settings.validate()?;
        let nlp = MultipleShootingNlp::new(ocp, horizon, n)?;
        let condensing =
            ContinuationGmresCondensing::new(nlp, settings.finite_difference_epsilon, settings.zeta)?;
        let dim = condensing.dim();
        Ok(Self {
            gmres: MatrixFreeGmres::new(dim, kmax)?,
            condensing,
            settings,
            timer: Timer::new(),
            solution: vec![0.0; dim],
            solution_update: vec![0.0; dim],
            gmres_iter: 0,
        })
    }

    fn nlp(&self) -> &MultipleShootingNlp<O> {
        self.condensing.nlp()
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

    pub fn set_u(&mut self, u: &[f64]) -> Result<(), CgmresError> {
        let (_, nu, nuc, _) = self.sizes();
        CgmresError::check_dim("MultipleShootingCgmresSolver::set_u", nu, u.len())?;
        broadcast(&mut self.solution, nuc, 0, u);
        Ok(())
    }

    pub fn set_uc(&mut self, uc: &[f64]) -> Result<(), CgmresError> {
        let (_, _, nuc, _) = self.sizes();
        CgmresError::check_dim("MultipleShootingCgmresSolver::set_uc", nuc, uc.len())?;
        broadcast(&mut self.solution, nuc, 0, uc);
        Ok(())
    }

    pub fn set_dummy(&mut self, dummy: &[f64]) -> Result<(), CgmresError> {
        let (_, _, _, nub) = self.sizes();
        CgmresError::check_dim("MultipleShootingCgmresSolver::set_dummy", nub, dummy.len())?;
        broadcast(self.condensing.dummy_mut(), nub, 0, dummy);
        Ok(())
    }

    pub fn set_mu(&mut self, mu: &[f64]) -> Result<(), CgmresError> {
        let (_, _, _, nub) = self.sizes();
        CgmresError::check_dim("MultipleShootingCgmresSolver::set_mu", nub, mu.len())?;
        broadcast(self.condensing.mu_mut(), nub, 0, mu);
        Ok(())
    }

    /// Rebuilds the states and costates from the current control inputs, starting at `x`.
    pub fn init_x_lmd(&mut self, t: f64, x: &[f64]) -> Result<(), CgmresError> {
        CgmresError::check_dim("MultipleShootingCgmresSolver::init_x_lmd", self.nlp().nx(), x.len())?;
        self.condensing.synchronize_ocp();
        self.condensing.init_x_lmd(t, x, &self.solution);
        Ok(())
    }

    /// Sets the dummies and multipliers consistent with the current control inputs.
    pub fn init_dummy_mu(&mut self) {
        self.condensing.init_dummy_mu(&self.solution, self.settings.min_dummy);
    }

    pub fn uopt(&self) -> Vec<&[f64]> {
        let (_, nu, _, _) = self.sizes();
        self.ucopt().into_iter().map(|uc| &uc[..nu]).collect()
    }

    pub fn ucopt(&self) -> Vec<&[f64]> {
        let (n, _, nuc, _) = self.sizes();
        blocks(&self.solution, nuc, n)
    }

    /// States `x_1 .. x_N`.
    pub fn xopt(&self) -> &[Vec<f64>] {
        &self.condensing.x()[1..]
    }

    /// Costates `lmd_1 .. lmd_N`.
    pub fn lmdopt(&self) -> &[Vec<f64>] {
        &self.condensing.lmd()[1..]
    }

    pub fn dummyopt(&self) -> Vec<&[f64]> {
        let (n, _, _, nub) = self.sizes();
        blocks(self.condensing.dummy(), nub, n)
    }

    pub fn muopt(&self) -> Vec<&[f64]> {
        let (n, _, _, nub) = self.sizes();
        blocks(self.condensing.mu(), nub, n)
    }

    /// Number of GMRES iterations of the last update.
    pub fn gmres_iter(&self) -> usize {
        self.gmres_iter
    }

    /// Optimality error of the last residual evaluation.
    pub fn opt_error(&self) -> f64 {
        self.condensing.opt_error()
    }

    /// Optimality error of the current iterate at `(t, x)`.
    pub fn opt_error_at(&mut self, t: f64, x: &[f64]) -> Result<f64, CgmresError> {
        CgmresError::check_dim("MultipleShootingCgmresSolver::opt_error_at", self.nlp().nx(), x.len())?;
        self.condensing.synchronize_ocp();
        self.condensing.eval_fonc(t, x, &self.solution);
        Ok(self.condensing.opt_error())
    }

    /// Per-stage optimality errors of the last residual evaluation.
    pub fn opt_error_array(&self) -> Vec<f64> {
        self.condensing.stage_opt_errors()
    }

    pub fn profile(&self) -> TimingProfile {
        self.timer.profile()
    }

    /// One continuation step at `(t, x)`: solves for the control-input derivative, expands it
    /// to the eliminated variables and advances everything by one sampling period.
    pub fn update(&mut self, t: f64, x: &[f64]) -> Result<(), CgmresError> {
        CgmresError::check_dim("MultipleShootingCgmresSolver::update", self.nlp().nx(), x.len())?;
        if self.settings.verbose_level >= 1 {
            log::info!("update solution at t = {t}");
        }
        self.condensing.synchronize_ocp();
        if self.settings.profile_solver {
            self.timer.tick();
        }
        let stats = self
            .gmres
            .solve(&mut self.condensing.linearize(t, x, &self.solution), &mut self.solution_update)?;
        self.gmres_iter = stats.iterations;
        let opt_error = self.condensing.opt_error();
        let dt = self.settings.sampling_time;
        self.condensing
            .expand(t, &self.solution, &self.solution_update, dt, self.settings.min_dummy);
        for (s, &ds) in self.solution.iter_mut().zip(&self.solution_update) {
            *s += dt * ds;
        }
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

impl<O: Ocp + fmt::Display> fmt::Display for MultipleShootingCgmresSolver<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Multiple shooting CGMRES solver:")?;
        writeln!(f, "  N:    {}", self.nlp().n())?;
        writeln!(f, "  kmax: {}", self.gmres.kmax())?;
        writeln!(f, "{}", self.nlp().ocp())?;
        writeln!(f, "{}", self.nlp().horizon())?;
        writeln!(f, "{}", self.settings)?;
        write!(f, "{}", self.timer.profile())
    }
}
