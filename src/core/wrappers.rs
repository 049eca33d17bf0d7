//! Wrappers for faer dense matrix types and vector operations.
//!
//! This module provides implementations of the core linear algebra traits for `faer::Mat` and
//! slices, and an adaptor that exposes an explicit matrix and right-hand side as a
//! [`LinearProblem`]. The adaptor is what lets the matrix-free GMRES be checked against plain
//! dense systems.
//!
//! # References
//! - [faer crate documentation](https://docs.rs/faer)
//! - [num-traits crate documentation](https://docs.rs/num-traits)

use crate::core::traits::{InnerProduct, LinearProblem, MatVec};
use faer::Mat;
use num_traits::Float;

/// Implements matrix-vector multiplication for `faer::Mat`.
///
/// Computes `y = A * x` where `A` is a dense matrix, `x` and `y` are vectors.
impl<T: Float> MatVec<Vec<T>> for Mat<T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        assert_eq!(self.nrows(), y.len(), "Output vector y has incorrect length");
        assert_eq!(self.ncols(), x.len(), "Input vector x has incorrect length");
        for i in 0..self.nrows() {
            y[i] = T::zero();
            for j in 0..self.ncols() {
                y[i] = y[i] + self[(i, j)] * x[j];
            }
        }
    }
}

/// Implements inner product and norm for slices.
impl<T: Float> InnerProduct<[T]> for () {
    type Scalar = T;
    /// Computes the dot product of two vectors: `x^T y`.
    fn dot(&self, x: &[T], y: &[T]) -> T {
        debug_assert_eq!(x.len(), y.len(), "Vectors must have the same length");
        x.iter()
            .zip(y.iter())
            .fold(T::zero(), |acc, (&xi, &yi)| acc + xi * yi)
    }
    /// Computes the Euclidean norm of a vector: `||x||_2`.
    fn norm(&self, x: &[T]) -> T {
        x.iter().fold(T::zero(), |acc, &xi| acc + xi * xi).sqrt()
    }
}

/// An explicit matrix `A` and right-hand side `b` seen as a [`LinearProblem`].
pub struct ExplicitLinearProblem<'a, M, T> {
    pub a: &'a M,
    pub b: &'a [T],
    work_in: Vec<T>,
    work_out: Vec<T>,
}

impl<'a, M, T> ExplicitLinearProblem<'a, M, T>
where
    M: MatVec<Vec<T>>,
    T: Float,
{
    pub fn new(a: &'a M, b: &'a [T]) -> Self {
        let n = b.len();
        Self {
            a,
            b,
            work_in: vec![T::zero(); n],
            work_out: vec![T::zero(); n],
        }
    }

    fn apply(&mut self, v: &[T]) {
        self.work_in.copy_from_slice(v);
        self.a.matvec(&self.work_in, &mut self.work_out);
    }
}

impl<M, T> LinearProblem<T> for ExplicitLinearProblem<'_, M, T>
where
    M: MatVec<Vec<T>>,
    T: Float,
{
    fn dim(&self) -> usize {
        self.b.len()
    }

    fn eval_b(&mut self, x0: &[T], b: &mut [T]) {
        self.apply(x0);
        for ((bi, &rhs), &ax) in b.iter_mut().zip(self.b).zip(&self.work_out) {
            *bi = rhs - ax;
        }
    }

    fn eval_ax(&mut self, v: &[T], ax: &mut [T]) {
        self.apply(v);
        ax.copy_from_slice(&self.work_out);
    }
}

/// Writes `y = x + alpha * d`.
pub(crate) fn axpy_into(y: &mut [f64], x: &[f64], alpha: f64, d: &[f64]) {
    for ((yi, &xi), &di) in y.iter_mut().zip(x).zip(d) {
        *yi = xi + alpha * di;
    }
}

/// Squared Euclidean norm of a slice.
pub(crate) fn squared_norm(x: &[f64]) -> f64 {
    x.iter().map(|xi| xi * xi).sum()
}
