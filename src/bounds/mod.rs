//! Box constraints on a subset of the control inputs.
//!
//! A bound `umin_i <= u[idx_i] <= umax_i` is replaced by the equality
//! `(u - umin)(u - umax) + dummy^2 = 0` with a dummy input and a multiplier `mu`. The dummy
//! enters the cost as `-w * dummy`, which keeps it away from zero. This gives three extra
//! stationarity terms per bounded input:
//!
//! - `hu[idx_i]  += mu_i (2 u - umin_i - umax_i)`
//! - `hdummy_i    = 2 mu_i dummy_i - w_i`
//! - `hmu_i       = u (u - umin_i - umax_i) + umin_i umax_i + dummy_i^2`
//!
//! The Jacobian of `(hdummy, hmu)` with respect to `(dummy, mu)` is the 2×2 block
//! `[[2 mu, 2 dummy], [2 dummy, 0]]` per bound, inverted here in closed form.
//!
//! Every routine divides by the dummy values and assumes they were clipped by [`clip_dummy`].

pub mod shooting;

use crate::error::CgmresError;

/// Indices and limits of the bounded control inputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlInputBounds {
    indices: Vec<usize>,
    umin: Vec<f64>,
    umax: Vec<f64>,
    dummy_weight: Vec<f64>,
}

static UNBOUNDED: ControlInputBounds = ControlInputBounds::unbounded();

impl ControlInputBounds {
    /// No bounded inputs.
    pub const fn unbounded() -> Self {
        Self {
            indices: Vec::new(),
            umin: Vec::new(),
            umax: Vec::new(),
            dummy_weight: Vec::new(),
        }
    }

    /// Shared empty instance, handy as a default for problems without bounds.
    pub fn none() -> &'static Self {
        &UNBOUNDED
    }

    pub fn new(
        indices: Vec<usize>,
        umin: Vec<f64>,
        umax: Vec<f64>,
        dummy_weight: Vec<f64>,
    ) -> Result<Self, CgmresError> {
        let nub = indices.len();
        CgmresError::check_dim("ControlInputBounds::umin", nub, umin.len())?;
        CgmresError::check_dim("ControlInputBounds::umax", nub, umax.len())?;
        CgmresError::check_dim("ControlInputBounds::dummy_weight", nub, dummy_weight.len())?;
        for i in 0..nub {
            if !(umin[i] < umax[i]) {
                return Err(CgmresError::InvalidArgument(format!(
                    "[ControlInputBounds] umin[{i}] = {} must be smaller than umax[{i}] = {}",
                    umin[i], umax[i]
                )));
            }
            if !(dummy_weight[i] >= 0.0) {
                return Err(CgmresError::InvalidArgument(format!(
                    "[ControlInputBounds] dummy_weight[{i}] must be non-negative, got {}",
                    dummy_weight[i]
                )));
            }
            if indices[..i].contains(&indices[i]) {
                return Err(CgmresError::InvalidArgument(format!(
                    "[ControlInputBounds] control input {} is bounded twice",
                    indices[i]
                )));
            }
        }
        Ok(Self { indices, umin, umax, dummy_weight })
    }

    /// Number of bounded control inputs.
    pub fn nub(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn umin(&self) -> &[f64] {
        &self.umin
    }

    pub fn umax(&self) -> &[f64] {
        &self.umax
    }

    pub fn dummy_weight(&self) -> &[f64] {
        &self.dummy_weight
    }

    /// Checks that every bounded index addresses one of `nu` control inputs.
    pub fn check_indices(&self, nu: usize) -> Result<(), CgmresError> {
        match self.indices.iter().find(|&&idx| idx >= nu) {
            Some(idx) => Err(CgmresError::InvalidArgument(format!(
                "[ControlInputBounds] bounded index {idx} is out of range for nu = {nu}"
            ))),
            None => Ok(()),
        }
    }

    fn bound_terms(&self) -> impl Iterator<Item = (usize, usize, f64, f64)> + '_ {
        self.indices
            .iter()
            .zip(self.umin.iter().zip(&self.umax))
            .enumerate()
            .map(|(i, (&idx, (&lo, &hi)))| (i, idx, lo, hi))
    }

    /// Adds the multiplier terms of the bounds to the Hamiltonian gradient `hu`.
    pub fn eval_hu(&self, u: &[f64], _dummy: &[f64], mu: &[f64], hu: &mut [f64]) {
        for (i, idx, lo, hi) in self.bound_terms() {
            hu[idx] += mu[i] * (2.0 * u[idx] - lo - hi);
        }
    }

    /// Stationarity with respect to the dummy inputs.
    pub fn eval_hdummy(&self, _u: &[f64], dummy: &[f64], mu: &[f64], hdummy: &mut [f64]) {
        for (i, w) in self.dummy_weight.iter().enumerate() {
            hdummy[i] = 2.0 * mu[i] * dummy[i] - w;
        }
    }

    /// Residual of the bound equalities `(u - umin)(u - umax) + dummy^2`.
    pub fn eval_hmu(&self, u: &[f64], dummy: &[f64], _mu: &[f64], hmu: &mut [f64]) {
        for (i, idx, lo, hi) in self.bound_terms() {
            let ui = u[idx];
            hmu[i] = ui * (ui - lo - hi) + lo * hi + dummy[i] * dummy[i];
        }
    }

    /// Dummy update implied by the control-input update `u_update` (coupling part only).
    pub fn retrieve_dummy_update(
        &self,
        u: &[f64],
        dummy: &[f64],
        _mu: &[f64],
        u_update: &[f64],
        dummy_update: &mut [f64],
    ) {
        for (i, idx, lo, hi) in self.bound_terms() {
            dummy_update[i] = (2.0 * u[idx] - lo - hi) * u_update[idx] / (2.0 * dummy[i]);
        }
    }

    /// Multiplier update implied by the control-input update `u_update` (coupling part only).
    pub fn retrieve_mu_update(
        &self,
        u: &[f64],
        dummy: &[f64],
        mu: &[f64],
        u_update: &[f64],
        mu_update: &mut [f64],
    ) {
        for (i, idx, lo, hi) in self.bound_terms() {
            mu_update[i] =
                -mu[i] * (2.0 * u[idx] - lo - hi) * u_update[idx] / (2.0 * dummy[i] * dummy[i]);
        }
    }
}

/// Dummy rows of the inverted `(dummy, mu)` block applied to `(hdummy, hmu)`.
pub fn multiply_hdummy_inv(
    dummy: &[f64],
    _mu: &[f64],
    _hdummy: &[f64],
    hmu: &[f64],
    hdummy_multiplied: &mut [f64],
) {
    for ((out, &d), &r) in hdummy_multiplied.iter_mut().zip(dummy).zip(hmu) {
        *out = r / (2.0 * d);
    }
}

/// Multiplier rows of the inverted `(dummy, mu)` block applied to `(hdummy, hmu)`.
///
/// `hdummy_multiplied` must be the output of [`multiply_hdummy_inv`] for the same arguments.
pub fn multiply_hmu_inv(
    dummy: &[f64],
    mu: &[f64],
    hdummy: &[f64],
    _hmu: &[f64],
    hdummy_multiplied: &[f64],
    hmu_multiplied: &mut [f64],
) {
    for (i, out) in hmu_multiplied.iter_mut().enumerate() {
        *out = hdummy[i] / (2.0 * dummy[i]) - mu[i] * hdummy_multiplied[i] / dummy[i];
    }
}

/// Floors every dummy value at `min`.
pub fn clip_dummy(dummy: &mut [f64], min: f64) {
    debug_assert!(min >= 0.0);
    for d in dummy.iter_mut() {
        *d = d.max(min);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn two_input_bounds() -> ControlInputBounds {
        ControlInputBounds::new(vec![1, 0], vec![-1.0, 0.5], vec![2.0, 3.0], vec![0.1, 0.2]).unwrap()
    }

    #[test]
    fn hmu_vanishes_at_feasible_points() {
        let bounds = two_input_bounds();
        let mu = [0.3, 0.7];
        let mut hmu = [f64::NAN; 2];
        for &(u1, u0) in &[(-1.0, 0.5), (2.0, 3.0), (0.25, 1.0), (1.9, 2.9)] {
            let u = [u0, u1];
            let dummy = [
                (-(u1 - -1.0) * (u1 - 2.0_f64)).sqrt(),
                (-(u0 - 0.5) * (u0 - 3.0_f64)).sqrt(),
            ];
            bounds.eval_hmu(&u, &dummy, &mu, &mut hmu);
            assert_abs_diff_eq!(hmu[0], 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(hmu[1], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn hu_terms_land_on_bounded_indices() {
        let bounds = two_input_bounds();
        let u = [1.0, 0.0, 5.0];
        let mu = [2.0, 4.0];
        let mut hu = [1.0, 1.0, 1.0];
        bounds.eval_hu(&u, &[1.0, 1.0], &mu, &mut hu);
        // index 1: 2 * (0 + 1 - 2), index 0: 4 * (2 - 0.5 - 3)
        assert_abs_diff_eq!(hu[1], 1.0 - 2.0);
        assert_abs_diff_eq!(hu[0], 1.0 - 6.0);
        assert_abs_diff_eq!(hu[2], 1.0);
    }

    #[test]
    fn block_inverse_matches_explicit_inverse() {
        let bounds = two_input_bounds();
        let u = [1.2, 0.4];
        let dummy = [0.8, 1.3];
        let mu = [0.05, 0.3];
        let mut hdummy = [0.0; 2];
        let mut hmu = [0.0; 2];
        bounds.eval_hdummy(&u, &dummy, &mu, &mut hdummy);
        bounds.eval_hmu(&u, &dummy, &mu, &mut hmu);

        let mut dd = [0.0; 2];
        let mut dmu = [0.0; 2];
        multiply_hdummy_inv(&dummy, &mu, &hdummy, &hmu, &mut dd);
        multiply_hmu_inv(&dummy, &mu, &hdummy, &hmu, &dd, &mut dmu);
        // [[2 mu, 2 d], [2 d, 0]] * (dd, dmu) must give back (hdummy, hmu)
        for i in 0..2 {
            assert_abs_diff_eq!(2.0 * mu[i] * dd[i] + 2.0 * dummy[i] * dmu[i], hdummy[i], epsilon = 1e-12);
            assert_abs_diff_eq!(2.0 * dummy[i] * dd[i], hmu[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn retrieved_updates_cancel_the_coupling() {
        let bounds = two_input_bounds();
        let u = [1.2, 0.4];
        let dummy = [0.8, 1.3];
        let mu = [0.05, 0.3];
        let du = [0.3, -0.2];
        let mut dd = [0.0; 2];
        let mut dmu = [0.0; 2];
        bounds.retrieve_dummy_update(&u, &dummy, &mu, &du, &mut dd);
        bounds.retrieve_mu_update(&u, &dummy, &mu, &du, &mut dmu);
        for (i, &idx) in bounds.indices().iter().enumerate() {
            let coupling = 2.0 * u[idx] - bounds.umin()[i] - bounds.umax()[i];
            // hmu row: coupling * du = 2 d dd
            assert_abs_diff_eq!(coupling * du[idx], 2.0 * dummy[i] * dd[i], epsilon = 1e-12);
            // hdummy row: 2 mu dd + 2 d dmu = 0
            assert_abs_diff_eq!(2.0 * mu[i] * dd[i] + 2.0 * dummy[i] * dmu[i], 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn clip_dummy_floors_and_keeps_large_values() {
        let mut dummy = [-1.0, 0.0, 1e-5, 0.5, 3.0];
        clip_dummy(&mut dummy, 1e-3);
        assert_eq!(dummy, [1e-3, 1e-3, 1e-3, 0.5, 3.0]);
    }

    #[test]
    fn malformed_bounds_are_rejected() {
        assert!(ControlInputBounds::new(vec![0], vec![1.0], vec![0.0], vec![0.1]).is_err());
        assert!(ControlInputBounds::new(vec![0, 0], vec![0.0; 2], vec![1.0; 2], vec![0.1; 2]).is_err());
        assert!(matches!(
            ControlInputBounds::new(vec![0], vec![0.0, 1.0], vec![1.0], vec![0.1]),
            Err(CgmresError::DimensionMismatch { .. })
        ));
        assert!(two_input_bounds().check_indices(1).is_err());
        assert!(two_input_bounds().check_indices(2).is_ok());
        assert_eq!(ControlInputBounds::none().nub(), 0);
    }
}
