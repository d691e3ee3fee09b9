//! Flow and valve helpers shared by hydraulic Q-components.

/// Turbulent orifice flow solved directly in wave variables.
///
/// With `q = Ks sqrt(p1 - p2)`, `p1 = c1 - Zc1 q` and `p2 = c2 + Zc2 q` the
/// flow from port 1 to port 2 has a closed form, so no iteration is needed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TurbulentFlowFunction {
    ks: f64,
}

impl TurbulentFlowFunction {
    pub fn new(ks: f64) -> Self {
        Self { ks }
    }

    /// Flow coefficient from discharge coefficient, area and density:
    /// `Ks = Cq A sqrt(2 / rho)`.
    pub fn from_orifice(cq: f64, area: f64, rho: f64) -> Self {
        Self {
            ks: cq * area * (2.0 / rho).sqrt(),
        }
    }

    pub fn set_flow_coefficient(&mut self, ks: f64) {
        self.ks = ks;
    }

    pub fn flow_coefficient(&self) -> f64 {
        self.ks
    }

    /// Flow from port 1 to port 2.
    pub fn flow(&self, c1: f64, c2: f64, zc1: f64, zc2: f64) -> f64 {
        let ks = self.ks;
        let zk = (zc1 + zc2) * ks;
        if c1 > c2 {
            ks * ((c1 - c2 + zk * zk / 4.0).sqrt() - zk / 2.0)
        } else {
            ks * (zk / 2.0 - (c2 - c1 + zk * zk / 4.0).sqrt())
        }
    }
}

/// Dead band between a commanded and an actual position.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValveHysteresis;

impl ValveHysteresis {
    /// `xs` commanded position, `xh` hysteresis width, `xd` previous output.
    pub fn value(xs: f64, xh: f64, xd: f64) -> f64 {
        if xs > xd + xh / 2.0 {
            xs - xh / 2.0
        } else if xs < xd - xh / 2.0 {
            xs + xh / 2.0
        } else {
            xd
        }
    }
}
