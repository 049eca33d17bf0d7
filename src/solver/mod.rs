//! Krylov solver and the OCP solver facades built on it.
//!
//! - [`MatrixFreeGmres`]: the linear solver.
//! - [`ZeroHorizonOcpSolver`]: Newton-GMRES on the zero-horizon problem, used to find an initial
//!   solution for the MPC solvers.
//! - [`SingleShootingCgmresSolver`], [`MultipleShootingCgmresSolver`]: one continuation step
//!   per sampling period.

pub mod gmres;
pub mod multiple_shooting;
pub mod single_shooting;
pub mod zero_horizon;

pub use gmres::MatrixFreeGmres;
pub use multiple_shooting::MultipleShootingCgmresSolver;
pub use single_shooting::SingleShootingCgmresSolver;
pub use zero_horizon::ZeroHorizonOcpSolver;

use crate::core::wrappers::squared_norm;

/// Splits `v` into `n` consecutive blocks of `width` entries; `width` may be zero.
pub(crate) fn blocks(v: &[f64], width: usize, n: usize) -> Vec<&[f64]> {
    (0..n).map(|i| &v[i * width..(i + 1) * width]).collect()
}

/// Writes `value` into every `width`-wide block of `v`, starting at `offset` within each block.
pub(crate) fn broadcast(v: &mut [f64], width: usize, offset: usize, value: &[f64]) {
    if width == 0 {
        return;
    }
    for block in v.chunks_exact_mut(width) {
        block[offset..offset + value.len()].copy_from_slice(value);
    }
}

/// Per-stage norm of several stacked residual blocks with the given per-stage widths.
pub(crate) fn stage_norms(n: usize, parts: &[(&[f64], usize)]) -> Vec<f64> {
    (0..n)
        .map(|i| {
            parts
                .iter()
                .map(|&(v, width)| squared_norm(&v[i * width..(i + 1) * width]))
                .sum::<f64>()
                .sqrt()
        })
        .collect()
}
