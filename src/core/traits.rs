//! Core linear-algebra traits for cgmres.

/// Matrix–vector product: y ← A x.
pub trait MatVec<V> {
    /// Compute y = A · x.
    fn matvec(&self, x: &V, y: &mut V);
}

/// Inner products & norms.
pub trait InnerProduct<V: ?Sized> {
    /// Associated scalar type.
    type Scalar: Copy + PartialOrd;
    /// Compute dot(x, y).
    fn dot(&self, x: &V, y: &V) -> Self::Scalar;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &V) -> Self::Scalar;
}

/// A linear system `A·Δ = b` that is only available through directional
/// evaluations, never as an assembled matrix.
///
/// This is the single seam between the GMRES solver and the linearization
/// strategies: GMRES depends on nothing else.
pub trait LinearProblem<T> {
    /// Dimension of the unknown.
    fn dim(&self) -> usize;
    /// Writes the initial residual `b - A·x0` for the initial guess `x0`.
    fn eval_b(&mut self, x0: &[T], b: &mut [T]);
    /// Writes `A·v`.
    fn eval_ax(&mut self, v: &[T], ax: &mut [T]);
}
