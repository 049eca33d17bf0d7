//! Optimal control problem (OCP) callback contract.
//!
//! An OCP supplies the state equation and the partial derivatives of the Hamiltonian
//! `H = L(t, x, u) + lmd^T f(t, x, u) + nu^T C(t, x, u)` and of the terminal cost. The
//! derivatives are usually generated symbolically; the solvers treat them as a black box.
//!
//! The evaluators are called in the innermost loops of the solvers and do not check the sizes of
//! their arguments. Sizes are checked once, at the solver boundary, against [`Ocp::dims`].

use std::fmt;

use crate::bounds::ControlInputBounds;
use crate::error::CgmresError;

/// Static dimensions of an OCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcpDims {
    /// State.
    pub nx: usize,
    /// Control input.
    pub nu: usize,
    /// Equality constraints.
    pub nc: usize,
    /// Fischer-Burmeister functions (already counted in `nc`).
    pub nh: usize,
}

impl OcpDims {
    pub fn new(nx: usize, nu: usize, nc: usize, nh: usize) -> Result<Self, CgmresError> {
        if nx == 0 || nu == 0 {
            return Err(CgmresError::InvalidArgument(format!(
                "[OcpDims] nx and nu must be positive, got nx = {nx}, nu = {nu}"
            )));
        }
        if nh > nc {
            return Err(CgmresError::InvalidArgument(format!(
                "[OcpDims] nh = {nh} must not exceed nc = {nc}"
            )));
        }
        Ok(Self { nx, nu, nc, nh })
    }

    /// Control input stacked with the equality-constraint multipliers.
    pub fn nuc(&self) -> usize {
        self.nu + self.nc
    }
}

impl fmt::Display for OcpDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nx: {}, nu: {}, nc: {}, nh: {}, nuc: {}", self.nx, self.nu, self.nc, self.nh, self.nuc())
    }
}

/// Definition of an optimal control problem.
pub trait Ocp {
    fn dims(&self) -> OcpDims;

    /// Box constraints on the control input.
    fn ubounds(&self) -> &ControlInputBounds {
        ControlInputBounds::none()
    }

    /// Synchronizes internal parameters with external references; called once per solver
    /// update before any evaluation.
    fn synchronize(&mut self) {}

    /// State equation `dx = f(t, x, u)`.
    fn eval_f(&self, t: f64, x: &[f64], u: &[f64], dx: &mut [f64]);

    /// Gradient of the terminal cost, `phix = dphi/dx(t, x)`.
    fn eval_phix(&self, t: f64, x: &[f64], phix: &mut [f64]);

    /// `hx = dH/dx(t, x, uc, lmd)`.
    fn eval_hx(&self, t: f64, x: &[f64], uc: &[f64], lmd: &[f64], hx: &mut [f64]);

    /// `hu = dH/du(t, x, uc, lmd)` stacked with the equality constraints; length `nuc`.
    fn eval_hu(&self, t: f64, x: &[f64], uc: &[f64], lmd: &[f64], hu: &mut [f64]);
}

/// Checks the dimensions and the bound indices of an OCP before a solver is built around it.
pub(crate) fn validate<O: Ocp>(ocp: &O) -> Result<OcpDims, CgmresError> {
    let dims = ocp.dims();
    let dims = OcpDims::new(dims.nx, dims.nu, dims.nc, dims.nh)?;
    ocp.ubounds().check_indices(dims.nu)?;
    Ok(dims)
}
