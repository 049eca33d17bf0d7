//! Solver settings shared by the zero-horizon and C/GMRES solvers.
//!
//! `SolverSettings` is a plain value threaded through the solver constructors. It is validated
//! once at construction and then only read.

use std::fmt;

use crate::error::CgmresError;

/// Settings of the Newton-GMRES and C/GMRES solvers.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    /// Maximum number of Newton iterations of the zero-horizon solver.
    pub max_iter: usize,
    /// Termination tolerance on the optimality error of the zero-horizon solver.
    pub opterr_tol: f64,
    /// Step of the forward finite differences.
    pub finite_difference_epsilon: f64,
    /// Sampling period of the MPC.
    pub sampling_time: f64,
    /// Continuation stabilization gain ζ.
    pub zeta: f64,
    /// Lower floor of the dummy inputs of the control-input bounds.
    pub min_dummy: f64,
    /// 0: silent, 1: optimality errors, 2: also GMRES iteration counts.
    pub verbose_level: usize,
    /// Time the linear-solve region of every update.
    pub profile_solver: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iter: 100,
            opterr_tol: 1.0e-06,
            finite_difference_epsilon: 1.0e-08,
            sampling_time: 0.001,
            zeta: 1000.0,
            min_dummy: 1.0e-03,
            verbose_level: 0,
            profile_solver: false,
        }
    }
}

impl SolverSettings {
    /// Checks the positivity constraints of every numeric field.
    pub fn validate(&self) -> Result<(), CgmresError> {
        fn positive(name: &str, value: f64) -> Result<(), CgmresError> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(CgmresError::InvalidArgument(format!(
                    "[SolverSettings] '{name}' must be positive, got {value}"
                )))
            }
        }
        positive("opterr_tol", self.opterr_tol)?;
        positive("finite_difference_epsilon", self.finite_difference_epsilon)?;
        positive("sampling_time", self.sampling_time)?;
        positive("zeta", self.zeta)?;
        if !(self.min_dummy >= 0.0) {
            return Err(CgmresError::InvalidArgument(format!(
                "[SolverSettings] 'min_dummy' must be non-negative, got {}",
                self.min_dummy
            )));
        }
        Ok(())
    }
}

impl fmt::Display for SolverSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solver settings:")?;
        writeln!(f, "  max iter:                  {}", self.max_iter)?;
        writeln!(f, "  opterr tol:                {}", self.opterr_tol)?;
        writeln!(f, "  finite difference epsilon: {}", self.finite_difference_epsilon)?;
        writeln!(f, "  sampling time:             {}", self.sampling_time)?;
        writeln!(f, "  zeta:                      {}", self.zeta)?;
        writeln!(f, "  min dummy:                 {}", self.min_dummy)?;
        writeln!(f, "  verbose level:             {}", self.verbose_level)?;
        write!(f, "  profile solver:            {}", self.profile_solver)
    }
}
