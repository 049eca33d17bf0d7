//! Matrix-free GMRES with a fixed number of Arnoldi steps and no restart (Saad §6.5)
//!
//! The linear operator is only available through [`LinearProblem::eval_ax`]; the right-hand side
//! enters through [`LinearProblem::eval_b`], which already subtracts the product with the initial
//! guess. The solver performs at most `kmax` iterations and never checks a tolerance: in the
//! continuation method the warm-started initial guess is good enough that a handful of steps
//! suffice, and a fixed cost per update is what matters.
//!
//! # Features
//! - Modified Gram-Schmidt Arnoldi process
//! - Givens rotations for the least-squares update
//! - Happy breakdown detection; the last column still enters the update unless its rotated
//!   diagonal vanishes
//! - All workspace is allocated once in [`MatrixFreeGmres::new`]
//!
//! # References
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd Edition. SIAM. §6.5
//! - Kelley, C. T. (1995). Iterative Methods for Linear and Nonlinear Equations. SIAM. §3.5

use crate::core::traits::{InnerProduct, LinearProblem};
use crate::error::CgmresError;
use crate::utils::convergence::SolveStats;
use faer::Mat;
use num_traits::Float;

/// GMRES workspace sized for one problem dimension.
///
/// # Type Parameters
/// * `T` - Scalar type (e.g., f32, f64)
pub struct MatrixFreeGmres<T> {
    dim: usize,
    kmax: usize,
    /// Upper Hessenberg matrix, `(kmax + 1) x (kmax + 1)`; the last column is never used
    hessenberg: Mat<T>,
    /// Orthonormal Krylov basis `v_0 .. v_kmax`
    basis: Vec<Vec<T>>,
    b: Vec<T>,
    givens_c: Vec<T>,
    givens_s: Vec<T>,
    g: Vec<T>,
    y: Vec<T>,
}

impl<T: Float> MatrixFreeGmres<T> {
    /// Creates a solver for problems of dimension `dim`. `kmax` is clamped to `dim`.
    pub fn new(dim: usize, kmax: usize) -> Result<Self, CgmresError> {
        if dim == 0 {
            return Err(CgmresError::InvalidArgument(
                "[MatrixFreeGmres] 'dim' must be positive".into(),
            ));
        }
        if kmax == 0 {
            return Err(CgmresError::InvalidArgument(
                "[MatrixFreeGmres] 'kmax' must be positive".into(),
            ));
        }
        let kmax = kmax.min(dim);
        Ok(Self {
            dim,
            kmax,
            hessenberg: Mat::from_fn(kmax + 1, kmax + 1, |_, _| T::zero()),
            basis: vec![vec![T::zero(); dim]; kmax + 1],
            b: vec![T::zero(); dim],
            givens_c: vec![T::zero(); kmax],
            givens_s: vec![T::zero(); kmax],
            g: vec![T::zero(); kmax + 1],
            y: vec![T::zero(); kmax],
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Effective number of Arnoldi steps per solve.
    pub fn kmax(&self) -> usize {
        self.kmax
    }

    /// Improves `x` toward the solution of `A x = b`.
    ///
    /// # Arguments
    /// * `problem` - Linear problem, evaluated only through directional products
    /// * `x` - On input: initial guess; on output: the GMRES iterate
    ///
    /// # Returns
    /// * `Ok(SolveStats)` after `kmax` steps, a happy breakdown, or a vanishing initial residual
    /// * `Err(CgmresError::LostOrthogonality)` if a Givens rotation cannot be formed
    pub fn solve<P>(&mut self, problem: &mut P, x: &mut [T]) -> Result<SolveStats<T>, CgmresError>
    where
        P: LinearProblem<T>,
    {
        CgmresError::check_dim("MatrixFreeGmres::problem", self.dim, problem.dim())?;
        CgmresError::check_dim("MatrixFreeGmres::x", self.dim, x.len())?;
        let ip = ();

        problem.eval_b(x, &mut self.b);
        let beta = ip.norm(&self.b[..]);
        if beta == T::zero() {
            return Ok(SolveStats::trivial());
        }

        for j in 0..=self.kmax {
            for i in 0..=self.kmax {
                self.hessenberg[(i, j)] = T::zero();
            }
        }
        self.g.fill(T::zero());
        self.g[0] = beta;
        for (vi, &bi) in self.basis[0].iter_mut().zip(&self.b) {
            *vi = bi / beta;
        }

        let mut k = 0;
        let mut happy_breakdown = false;
        while k < self.kmax {
            let (head, tail) = self.basis.split_at_mut(k + 1);
            let w = &mut tail[0];
            problem.eval_ax(&head[k], w);

            // Modified Gram-Schmidt
            for (j, vj) in head.iter().enumerate() {
                let hjk = ip.dot(&w[..], &vj[..]);
                self.hessenberg[(j, k)] = hjk;
                for (wi, &vji) in w.iter_mut().zip(vj) {
                    *wi = *wi - hjk * vji;
                }
            }
            let h_next = ip.norm(&w[..]);
            self.hessenberg[(k + 1, k)] = h_next;
            let breakdown = !(h_next >= T::epsilon());
            if !breakdown {
                for wi in w.iter_mut() {
                    *wi = *wi / h_next;
                }
            }

            self.apply_previous_rotations(k);
            if breakdown {
                happy_breakdown = true;
                // A vanishing diagonal means column k adds nothing to the least-squares problem.
                if self.hessenberg[(k, k)] != T::zero() {
                    self.form_rotation(k)?;
                    k += 1;
                }
                log::debug!("GMRES: happy breakdown after {k} of {} iterations", self.kmax);
                break;
            }
            self.form_rotation(k)?;
            k += 1;
        }

        self.back_substitution(k);
        for (j, &yj) in self.y[..k].iter().enumerate() {
            for (xi, &vji) in x.iter_mut().zip(&self.basis[j]) {
                *xi = *xi + yj * vji;
            }
        }

        Ok(SolveStats {
            iterations: k,
            final_residual: self.g[k].abs(),
            happy_breakdown,
        })
    }

    /// Applies rotations `0..k` to column `k`.
    fn apply_previous_rotations(&mut self, k: usize) {
        let h = &mut self.hessenberg;
        for i in 0..k {
            let (c, s) = (self.givens_c[i], self.givens_s[i]);
            let temp = c * h[(i, k)] + s * h[(i + 1, k)];
            h[(i + 1, k)] = -s * h[(i, k)] + c * h[(i + 1, k)];
            h[(i, k)] = temp;
        }
    }

    /// Forms rotation `k` from the trailing entries of column `k` and applies it to `g`.
    fn form_rotation(&mut self, k: usize) -> Result<(), CgmresError> {
        let h = &mut self.hessenberg;
        let h_kk = h[(k, k)];
        let h_k1k = h[(k + 1, k)];
        let nu = (h_kk * h_kk + h_k1k * h_k1k).sqrt();
        if !(nu > T::zero()) {
            return Err(CgmresError::LostOrthogonality(k));
        }
        let (c, s) = (h_kk / nu, h_k1k / nu);
        self.givens_c[k] = c;
        self.givens_s[k] = s;
        h[(k, k)] = nu;
        h[(k + 1, k)] = T::zero();

        let gk = self.g[k];
        self.g[k + 1] = -s * gk;
        self.g[k] = c * gk;
        Ok(())
    }

    /// Solves the leading `m x m` upper-triangular system `H y = g`.
    fn back_substitution(&mut self, m: usize) {
        for i in (0..m).rev() {
            let mut yi = self.g[i];
            for j in (i + 1)..m {
                yi = yi - self.hessenberg[(i, j)] * self.y[j];
            }
            self.y[i] = yi / self.hessenberg[(i, i)];
        }
    }
}
