//! Cart-pole: a pendulum on a cart pushed by a horizontal force.
//!
//! State `x = [y, theta, dy, dtheta]` (cart position, pole angle measured from the hanging
//! position, and their rates), input `u = [force]`. Quadratic stage and terminal costs
//! around `x_ref`.

use std::fmt;

use crate::bounds::ControlInputBounds;
use crate::error::CgmresError;
use crate::ocp::{Ocp, OcpDims};

#[derive(Debug, Clone)]
pub struct CartPole {
    pub m_c: f64,
    pub m_p: f64,
    pub l: f64,
    pub g: f64,
    pub q: [f64; 4],
    pub q_terminal: [f64; 4],
    pub x_ref: [f64; 4],
    pub r: [f64; 1],
    ubounds: ControlInputBounds,
}

impl Default for CartPole {
    fn default() -> Self {
        Self {
            m_c: 2.0,
            m_p: 0.2,
            l: 0.5,
            g: 9.80665,
            q: [2.5, 10.0, 0.01, 0.01],
            q_terminal: [2.5, 10.0, 0.01, 0.01],
            x_ref: [0.0, 0.0, 1.0, 0.0],
            r: [1.0],
            ubounds: ControlInputBounds::unbounded(),
        }
    }
}

impl CartPole {
    /// Bounds the force to `[umin, umax]`.
    pub fn with_force_bound(mut self, umin: f64, umax: f64, dummy_weight: f64) -> Result<Self, CgmresError> {
        self.ubounds = ControlInputBounds::new(vec![0], vec![umin], vec![umax], vec![dummy_weight])?;
        Ok(self)
    }

    fn denominator(&self, theta: f64) -> f64 {
        let s = theta.sin();
        self.m_c + self.m_p * s * s
    }
}

impl Ocp for CartPole {
    fn dims(&self) -> OcpDims {
        OcpDims { nx: 4, nu: 1, nc: 0, nh: 0 }
    }

    fn ubounds(&self) -> &ControlInputBounds {
        &self.ubounds
    }

    fn eval_f(&self, _t: f64, x: &[f64], u: &[f64], dx: &mut [f64]) {
        let (s, c) = x[1].sin_cos();
        let w2 = x[3] * x[3];
        let d = self.denominator(x[1]);
        dx[0] = x[2];
        dx[1] = x[3];
        dx[2] = (u[0] + self.m_p * s * (self.l * w2 + self.g * c)) / d;
        dx[3] = (-u[0] * c - self.m_p * self.l * w2 * c * s - (self.m_c + self.m_p) * self.g * s)
            / (self.l * d);
    }

    fn eval_phix(&self, _t: f64, x: &[f64], phix: &mut [f64]) {
        for i in 0..4 {
            phix[i] = self.q_terminal[i] * (x[i] - self.x_ref[i]);
        }
    }

    fn eval_hx(&self, _t: f64, x: &[f64], uc: &[f64], lmd: &[f64], hx: &mut [f64]) {
        let (s, c) = x[1].sin_cos();
        let w = x[3];
        let w2 = w * w;
        let (m_c, m_p, l, g) = (self.m_c, self.m_p, self.l, self.g);
        let d = self.denominator(x[1]);
        let dd = 2.0 * m_p * s * c;

        let n2 = uc[0] + m_p * s * (l * w2 + g * c);
        let dn2 = m_p * (c * (l * w2 + g * c) - g * s * s);
        let df2_dtheta = (dn2 * d - n2 * dd) / (d * d);

        let n3 = -uc[0] * c - m_p * l * w2 * c * s - (m_c + m_p) * g * s;
        let dn3 = uc[0] * s - m_p * l * w2 * (c * c - s * s) - (m_c + m_p) * g * c;
        let df3_dtheta = (dn3 * d - n3 * dd) / (l * d * d);

        let df2_dw = 2.0 * m_p * l * w * s / d;
        let df3_dw = -2.0 * m_p * w * c * s / d;

        hx[0] = self.q[0] * (x[0] - self.x_ref[0]);
        hx[1] = self.q[1] * (x[1] - self.x_ref[1]) + lmd[2] * df2_dtheta + lmd[3] * df3_dtheta;
        hx[2] = self.q[2] * (x[2] - self.x_ref[2]) + lmd[0];
        hx[3] = self.q[3] * (x[3] - self.x_ref[3]) + lmd[1] + lmd[2] * df2_dw + lmd[3] * df3_dw;
    }

    fn eval_hu(&self, _t: f64, x: &[f64], uc: &[f64], lmd: &[f64], hu: &mut [f64]) {
        let d = self.denominator(x[1]);
        hu[0] = self.r[0] * uc[0] + lmd[2] / d - lmd[3] * x[1].cos() / (self.l * d);
    }
}

impl fmt::Display for CartPole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CartPole:")?;
        writeln!(f, "  {}", self.dims())?;
        writeln!(f, "  nub: {}", self.ubounds.nub())?;
        writeln!(f, "  m_c: {}, m_p: {}, l: {}, g: {}", self.m_c, self.m_p, self.l, self.g)?;
        writeln!(f, "  q: {:?}", self.q)?;
        writeln!(f, "  q_terminal: {:?}", self.q_terminal)?;
        writeln!(f, "  x_ref: {:?}", self.x_ref)?;
        write!(f, "  r: {:?}", self.r)
    }
}
