//! Solver of the zero-horizon OCP by Newton-GMRES iterations.
//!
//! The zero-horizon problem is cheap and well conditioned; its solution is the standard initial
//! guess of the MPC solvers, copied over with `set_uc` followed by `init_dummy_mu`.

use std::fmt;

use crate::bounds::clip_dummy;
use crate::config::SolverSettings;
use crate::continuation::NewtonGmres;
use crate::error::CgmresError;
use crate::nlp::{Nlp, ZeroHorizonNlp};
use crate::ocp::Ocp;
use crate::solver::MatrixFreeGmres;
use crate::utils::timer::{Timer, TimingProfile};

pub struct ZeroHorizonOcpSolver<O> {
    newton: NewtonGmres<ZeroHorizonNlp<O>>,
    gmres: MatrixFreeGmres<f64>,
    settings: SolverSettings,
    timer: Timer,
    solution: Vec<f64>,
    solution_update: Vec<f64>,
    gmres_iter: usize,
}

impl<O: Ocp> ZeroHorizonOcpSolver<O> {
    pub fn new(ocp: O, settings: SolverSettings, kmax: usize) -> Result<Self, CgmresError> {
        settings.validate()?;
        let nlp = ZeroHorizonNlp::new(ocp)?;
        let newton = NewtonGmres::new(nlp, settings.finite_difference_epsilon)?;
        let dim = newton.dim();
        Ok(Self {
            gmres: MatrixFreeGmres::new(dim, kmax)?,
            newton,
            settings,
            timer: Timer::new(),
            solution: vec![0.0; dim],
            solution_update: vec![0.0; dim],
            gmres_iter: 0,
        })
    }

    fn nlp(&self) -> &ZeroHorizonNlp<O> {
        self.newton.nlp()
    }

    fn ranges(&self) -> (usize, usize, usize) {
        let nlp = self.nlp();
        (nlp.nu(), nlp.nuc(), nlp.nub())
    }

    pub fn dim(&self) -> usize {
        self.solution.len()
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn set_u(&mut self, u: &[f64]) -> Result<(), CgmresError> {
        let (nu, _, _) = self.ranges();
        CgmresError::check_dim("ZeroHorizonOcpSolver::set_u", nu, u.len())?;
        self.solution[..nu].copy_from_slice(u);
        Ok(())
    }

    pub fn set_uc(&mut self, uc: &[f64]) -> Result<(), CgmresError> {
        let (_, nuc, _) = self.ranges();
        CgmresError::check_dim("ZeroHorizonOcpSolver::set_uc", nuc, uc.len())?;
        self.solution[..nuc].copy_from_slice(uc);
        Ok(())
    }

    pub fn set_dummy(&mut self, dummy: &[f64]) -> Result<(), CgmresError> {
        let (_, nuc, nub) = self.ranges();
        CgmresError::check_dim("ZeroHorizonOcpSolver::set_dummy", nub, dummy.len())?;
        self.solution[nuc..nuc + nub].copy_from_slice(dummy);
        Ok(())
    }

    pub fn set_mu(&mut self, mu: &[f64]) -> Result<(), CgmresError> {
        let (_, nuc, nub) = self.ranges();
        CgmresError::check_dim("ZeroHorizonOcpSolver::set_mu", nub, mu.len())?;
        self.solution[nuc + nub..].copy_from_slice(mu);
        Ok(())
    }

    /// Sets the dummies and multipliers consistent with the current control input.
    pub fn init_dummy_mu(&mut self) {
        self.newton.retrieve_dummy(&mut self.solution, self.settings.min_dummy);
        self.newton.retrieve_mu(&mut self.solution);
    }

    pub fn uopt(&self) -> &[f64] {
        &self.solution[..self.nlp().nu()]
    }

    pub fn ucopt(&self) -> &[f64] {
        &self.solution[..self.nlp().nuc()]
    }

    pub fn dummyopt(&self) -> &[f64] {
        let (_, nuc, nub) = self.ranges();
        &self.solution[nuc..nuc + nub]
    }

    pub fn muopt(&self) -> &[f64] {
        let (_, nuc, nub) = self.ranges();
        &self.solution[nuc + nub..]
    }

    /// Costate of the last residual evaluation.
    pub fn lmdopt(&self) -> &[f64] {
        self.nlp().lmd()
    }

    /// Number of GMRES iterations of the last Newton step.
    pub fn gmres_iter(&self) -> usize {
        self.gmres_iter
    }

    /// Optimality error of the last residual evaluation.
    pub fn opt_error(&self) -> f64 {
        self.newton.opt_error()
    }

    /// Optimality error of the current solution at `(t, x)`.
    pub fn opt_error_at(&mut self, t: f64, x: &[f64]) -> Result<f64, CgmresError> {
        CgmresError::check_dim("ZeroHorizonOcpSolver::opt_error_at", self.nlp().nx(), x.len())?;
        self.newton.synchronize_ocp();
        self.newton.eval_fonc(t, x, &self.solution);
        Ok(self.newton.opt_error())
    }

    /// The optimality error as a one-stage array.
    pub fn opt_error_array(&self) -> Vec<f64> {
        vec![self.opt_error()]
    }

    pub fn profile(&self) -> TimingProfile {
        self.timer.profile()
    }

    /// Runs Newton-GMRES iterations until the optimality error falls below `opterr_tol` or
    /// `max_iter` iterations have been spent. Running out of iterations is not an error.
    pub fn solve(&mut self, t: f64, x: &[f64]) -> Result<(), CgmresError> {
        CgmresError::check_dim("ZeroHorizonOcpSolver::solve", self.nlp().nx(), x.len())?;
        if self.settings.verbose_level >= 1 {
            log::info!("solve zero horizon OCP at t = {t}");
        }
        self.newton.synchronize_ocp();
        let (_, nuc, nub) = self.ranges();
        for iter in 0..self.settings.max_iter {
            if self.settings.profile_solver {
                self.timer.tick();
            }
            let stats = self
                .gmres
                .solve(&mut self.newton.linearize(t, x, &self.solution), &mut self.solution_update)?;
            self.gmres_iter = stats.iterations;
            let opt_error = self.newton.opt_error();
            for (s, &ds) in self.solution.iter_mut().zip(&self.solution_update) {
                *s += ds;
            }
            clip_dummy(&mut self.solution[nuc..nuc + nub], self.settings.min_dummy);
            if self.settings.profile_solver {
                self.timer.tock();
            }

            if self.settings.verbose_level >= 1 {
                log::info!("iter {iter}: opt error: {opt_error:e} (opt tol: {:e})", self.settings.opterr_tol);
            }
            if self.settings.verbose_level >= 2 {
                log::debug!("  number of GMRES iter: {} (kmax: {})", stats.iterations, self.gmres.kmax());
            }
            if opt_error < self.settings.opterr_tol {
                if self.settings.verbose_level >= 1 {
                    log::info!("converged!");
                }
                break;
            }
        }
        Ok(())
    }
}

impl<O: Ocp + fmt::Display> fmt::Display for ZeroHorizonOcpSolver<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Zero horizon OCP solver:")?;
        writeln!(f, "  kmax: {}", self.gmres.kmax())?;
        writeln!(f, "{}", self.nlp().ocp())?;
        writeln!(f, "{}", self.settings)?;
        write!(f, "{}", self.timer.profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::CartPole;
    use approx::assert_abs_diff_eq;

    #[test]
    fn uc_round_trips_and_bad_sizes_leave_state_unchanged() {
        let ocp = CartPole::default().with_force_bound(-10.0, 10.0, 0.1).unwrap();
        let mut solver = ZeroHorizonOcpSolver::new(ocp, SolverSettings::default(), 3).unwrap();
        assert_eq!(solver.dim(), 3);
        solver.set_uc(&[1.5]).unwrap();
        solver.set_dummy(&[2.0]).unwrap();
        solver.set_mu(&[0.3]).unwrap();
        assert_eq!(solver.ucopt(), &[1.5]);
        assert_eq!(solver.dummyopt(), &[2.0]);
        assert_eq!(solver.muopt(), &[0.3]);

        let err = solver.set_u(&[1.0, 2.0]);
        assert!(matches!(err, Err(CgmresError::DimensionMismatch { expected: 1, actual: 2, .. })));
        assert_eq!(solver.uopt(), &[1.5]);
        assert!(solver.set_dummy(&[]).is_err());
        assert_eq!(solver.dummyopt(), &[2.0]);
    }

    #[test]
    fn solve_reaches_the_tolerance_with_bounds() {
        let ocp = CartPole::default().with_force_bound(-15.0, 15.0, 0.1).unwrap();
        let settings = SolverSettings { max_iter: 50, opterr_tol: 1e-6, ..SolverSettings::default() };
        let mut solver = ZeroHorizonOcpSolver::new(ocp, settings, 3).unwrap();
        solver.set_uc(&[0.0]).unwrap();
        solver.init_dummy_mu();
        let x = [0.0, std::f64::consts::PI, 0.0, 0.0];
        solver.solve(0.0, &x).unwrap();
        assert!(solver.opt_error() < 1e-6, "opt error = {}", solver.opt_error());
        assert!(solver.uopt()[0] > -15.0 && solver.uopt()[0] < 15.0);
        assert!(solver.dummyopt()[0] >= solver.settings().min_dummy);
        assert_eq!(solver.lmdopt().len(), 4);
    }

    #[test]
    fn unbounded_problem_converges_in_one_step() {
        let mut solver = ZeroHorizonOcpSolver::new(CartPole::default(), SolverSettings::default(), 1).unwrap();
        let x = [0.2, 0.5, 0.0, -0.1];
        solver.solve(0.0, &x).unwrap();
        assert_abs_diff_eq!(solver.opt_error_at(0.0, &x).unwrap(), 0.0, epsilon = 1e-6);
        assert!(solver.opt_error_at(0.0, &[0.0; 3]).is_err());
    }
}
