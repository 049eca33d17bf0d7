//! Statistics reported by the Krylov solver.

/// Outcome of one GMRES solve.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveStats<T> {
    /// Number of Arnoldi steps actually taken.
    pub iterations: usize,
    /// Least-squares residual `|g_k|` of the reduced problem.
    pub final_residual: T,
    /// The Krylov subspace became invariant before `kmax` steps.
    pub happy_breakdown: bool,
}

impl<T: num_traits::Float> SolveStats<T> {
    /// Stats of a solve that did no work because the initial residual vanished.
    pub fn trivial() -> Self {
        Self {
            iterations: 0,
            final_residual: T::zero(),
            happy_breakdown: false,
        }
    }
}
