//! Length of the prediction horizon.

use std::fmt;

use crate::error::CgmresError;

/// Fixed or time-varying prediction horizon.
///
/// With `alpha > 0` the length grows smoothly as `tf * (1 - exp(-alpha * (t - t0)))`, which
/// lets the C/GMRES method start from a trivially solvable zero-length problem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizon {
    tf: f64,
    alpha: f64,
    t0: f64,
}

impl Horizon {
    pub fn new(tf: f64, alpha: f64) -> Result<Self, CgmresError> {
        Self::with_initial_time(tf, alpha, 0.0)
    }

    pub fn with_initial_time(tf: f64, alpha: f64, t0: f64) -> Result<Self, CgmresError> {
        if !(tf > 0.0) {
            return Err(CgmresError::InvalidArgument(format!(
                "[Horizon] 'tf' must be positive, got {tf}"
            )));
        }
        if !(alpha >= 0.0) {
            return Err(CgmresError::InvalidArgument(format!(
                "[Horizon] 'alpha' must be non-negative, got {alpha}"
            )));
        }
        Ok(Self { tf, alpha, t0 })
    }

    /// Horizon length at time `t`.
    pub fn length(&self, t: f64) -> f64 {
        if self.alpha > 0.0 {
            self.tf * (1.0 - (-self.alpha * (t - self.t0)).exp())
        } else {
            self.tf
        }
    }

    /// Restarts the growth of a time-varying horizon at `t0`.
    pub fn reset(&mut self, t0: f64) {
        self.t0 = t0;
    }

    pub fn is_time_varying(&self) -> bool {
        self.alpha > 0.0
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_time_varying() {
            write!(f, "Horizon: time-varying, Tf = {}, alpha = {}, t0 = {}", self.tf, self.alpha, self.t0)
        } else {
            write!(f, "Horizon: fixed, Tf = {}", self.tf)
        }
    }
}
