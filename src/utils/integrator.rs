//! One-step state integrators used to simulate the plant in closed loop.

use crate::ocp::Ocp;

/// `x + dt f(t, x, u)`.
pub fn forward_euler<O: Ocp>(ocp: &O, t: f64, dt: f64, x: &[f64], u: &[f64]) -> Vec<f64> {
    let mut dx = vec![0.0; x.len()];
    ocp.eval_f(t, x, u, &mut dx);
    x.iter().zip(&dx).map(|(xi, di)| xi + dt * di).collect()
}

/// Fourth-order Runge-Kutta step with Gill's coefficients.
pub fn rk4<O: Ocp>(ocp: &O, t: f64, dt: f64, x: &[f64], u: &[f64]) -> Vec<f64> {
    let n = x.len();
    let sqrt2 = std::f64::consts::SQRT_2;
    let (mut k1, mut k2, mut k3, mut k4) = (vec![0.0; n], vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    let mut x1 = vec![0.0; n];

    ocp.eval_f(t, x, u, &mut k1);
    for i in 0..n {
        x1[i] = x[i] + 0.5 * dt * k1[i];
    }
    ocp.eval_f(t + 0.5 * dt, &x1, u, &mut k2);
    for i in 0..n {
        x1[i] = x[i] + dt * 0.5 * (sqrt2 - 1.0) * k1[i] + dt * (1.0 - 1.0 / sqrt2) * k2[i];
    }
    ocp.eval_f(t + 0.5 * dt, &x1, u, &mut k3);
    for i in 0..n {
        x1[i] = x[i] - dt * 0.5 * sqrt2 * k2[i] + dt * (1.0 + 1.0 / sqrt2) * k3[i];
    }
    ocp.eval_f(t + dt, &x1, u, &mut k4);
    (0..n)
        .map(|i| x[i] + dt / 6.0 * (k1[i] + (2.0 - sqrt2) * k2[i] + (2.0 + sqrt2) * k3[i] + k4[i]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::ControlInputBounds;
    use crate::ocp::OcpDims;
    use approx::assert_abs_diff_eq;

    /// `dx = -x + u`, solved in closed form.
    struct FirstOrder;

    impl Ocp for FirstOrder {
        fn dims(&self) -> OcpDims {
            OcpDims { nx: 1, nu: 1, nc: 0, nh: 0 }
        }
        fn ubounds(&self) -> &ControlInputBounds {
            ControlInputBounds::none()
        }
        fn eval_f(&self, _t: f64, x: &[f64], u: &[f64], dx: &mut [f64]) {
            dx[0] = -x[0] + u[0];
        }
        fn eval_phix(&self, _t: f64, _x: &[f64], phix: &mut [f64]) {
            phix[0] = 0.0;
        }
        fn eval_hx(&self, _t: f64, _x: &[f64], _uc: &[f64], lmd: &[f64], hx: &mut [f64]) {
            hx[0] = -lmd[0];
        }
        fn eval_hu(&self, _t: f64, _x: &[f64], _uc: &[f64], lmd: &[f64], hu: &mut [f64]) {
            hu[0] = lmd[0];
        }
    }

    #[test]
    fn rk4_is_fourth_order_accurate() {
        let (x0, u, dt): (f64, f64, f64) = (2.0, 0.5, 0.1);
        let exact = u + (x0 - u) * (-dt).exp();
        let next = rk4(&FirstOrder, 0.0, dt, &[x0], &[u]);
        assert_abs_diff_eq!(next[0], exact, epsilon = 1e-6);
        let euler = forward_euler(&FirstOrder, 0.0, dt, &[x0], &[u]);
        assert_abs_diff_eq!(euler[0], x0 + dt * (u - x0));
        assert!((next[0] - exact).abs() < (euler[0] - exact).abs());
    }
}
