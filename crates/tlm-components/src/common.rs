//! Typed views onto bound nodes, resolved once in `initialize`.

use std::sync::Arc;

use tlm_graph::Node;
use tlm_graph::node_types::{electric, hydraulic, mechanic, signal};

use crate::base::ComponentBase;
use crate::error::{ComponentError, ComponentResult};

/// Hydraulic node seen from one port. Flow is positive into the C-side
/// component.
#[derive(Debug, Clone)]
pub struct HydraulicNodeData {
    node: Arc<Node>,
}

impl HydraulicNodeData {
    pub fn bind(base: &ComponentBase, port: &str) -> ComponentResult<Self> {
        Ok(Self {
            node: base.node(port)?,
        })
    }

    pub fn from_node(node: Arc<Node>) -> Self {
        Self { node }
    }

    pub fn q(&self) -> f64 {
        self.node.data_value(hydraulic::FLOW)
    }
    pub fn p(&self) -> f64 {
        self.node.data_value(hydraulic::PRESSURE)
    }
    pub fn c(&self) -> f64 {
        self.node.data_value(hydraulic::WAVE_VARIABLE)
    }
    pub fn zc(&self) -> f64 {
        self.node.data_value(hydraulic::CHAR_IMPEDANCE)
    }

    pub fn set_q(&self, v: f64) {
        self.node.set_data_value(hydraulic::FLOW, v);
    }
    pub fn set_p(&self, v: f64) {
        self.node.set_data_value(hydraulic::PRESSURE, v);
    }
    pub fn set_c(&self, v: f64) {
        self.node.set_data_value(hydraulic::WAVE_VARIABLE, v);
    }
    pub fn set_zc(&self, v: f64) {
        self.node.set_data_value(hydraulic::CHAR_IMPEDANCE, v);
    }
}

#[derive(Debug, Clone)]
pub struct MechanicNodeData {
    node: Arc<Node>,
}

impl MechanicNodeData {
    pub fn bind(base: &ComponentBase, port: &str) -> ComponentResult<Self> {
        Ok(Self {
            node: base.node(port)?,
        })
    }

    pub fn v(&self) -> f64 {
        self.node.data_value(mechanic::VELOCITY)
    }
    pub fn f(&self) -> f64 {
        self.node.data_value(mechanic::FORCE)
    }
    pub fn x(&self) -> f64 {
        self.node.data_value(mechanic::POSITION)
    }
    pub fn c(&self) -> f64 {
        self.node.data_value(mechanic::WAVE_VARIABLE)
    }
    pub fn zc(&self) -> f64 {
        self.node.data_value(mechanic::CHAR_IMPEDANCE)
    }

    pub fn set_v(&self, v: f64) {
        self.node.set_data_value(mechanic::VELOCITY, v);
    }
    pub fn set_f(&self, v: f64) {
        self.node.set_data_value(mechanic::FORCE, v);
    }
    pub fn set_x(&self, v: f64) {
        self.node.set_data_value(mechanic::POSITION, v);
    }
    pub fn set_c(&self, v: f64) {
        self.node.set_data_value(mechanic::WAVE_VARIABLE, v);
    }
    pub fn set_zc(&self, v: f64) {
        self.node.set_data_value(mechanic::CHAR_IMPEDANCE, v);
    }
    pub fn set_eq_mass(&self, v: f64) {
        self.node.set_data_value(mechanic::EQ_MASS, v);
    }
}

#[derive(Debug, Clone)]
pub struct ElectricNodeData {
    node: Arc<Node>,
}

impl ElectricNodeData {
    pub fn bind(base: &ComponentBase, port: &str) -> ComponentResult<Self> {
        Ok(Self {
            node: base.node(port)?,
        })
    }

    pub fn u(&self) -> f64 {
        self.node.data_value(electric::VOLTAGE)
    }
    pub fn i(&self) -> f64 {
        self.node.data_value(electric::CURRENT)
    }
    pub fn c(&self) -> f64 {
        self.node.data_value(electric::WAVE_VARIABLE)
    }
    pub fn zc(&self) -> f64 {
        self.node.data_value(electric::CHAR_IMPEDANCE)
    }

    pub fn set_u(&self, v: f64) {
        self.node.set_data_value(electric::VOLTAGE, v);
    }
    pub fn set_i(&self, v: f64) {
        self.node.set_data_value(electric::CURRENT, v);
    }
    pub fn set_c(&self, v: f64) {
        self.node.set_data_value(electric::WAVE_VARIABLE, v);
    }
    pub fn set_zc(&self, v: f64) {
        self.node.set_data_value(electric::CHAR_IMPEDANCE, v);
    }
}

#[derive(Debug, Clone)]
pub struct SignalNodeData {
    node: Arc<Node>,
}

impl SignalNodeData {
    pub fn bind(base: &ComponentBase, port: &str) -> ComponentResult<Self> {
        Ok(Self {
            node: base.node(port)?,
        })
    }

    pub fn value(&self) -> f64 {
        self.node.data_value(signal::VALUE)
    }

    pub fn set_value(&self, v: f64) {
        self.node.set_data_value(signal::VALUE, v);
    }
}

/// The node views resolved by `initialize`, or `NotInitialized`.
pub fn bound<'a, T>(slot: &'a Option<T>, what: &'static str) -> ComponentResult<&'a T> {
    slot.as_ref()
        .ok_or(ComponentError::NotInitialized { what })
}

/// Two-port restriction solution in wave variables: flow from port 1 to
/// port 2 and both port pressures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestrictionState {
    pub q1: f64,
    pub q2: f64,
    pub p1: f64,
    pub p2: f64,
}

impl RestrictionState {
    /// Pressures from the port wave variables for a given through-flow.
    pub fn from_flow(q2: f64, c1: f64, zc1: f64, c2: f64, zc2: f64) -> Self {
        let q1 = -q2;
        Self {
            q1,
            q2,
            p1: c1 + zc1 * q1,
            p2: c2 + zc2 * q2,
        }
    }

    pub fn write(&self, p1: &HydraulicNodeData, p2: &HydraulicNodeData) {
        p1.set_p(self.p1);
        p1.set_q(self.q1);
        p2.set_p(self.p2);
        p2.set_q(self.q2);
    }
}

/// Solve a restriction with a cavitation guard.
///
/// `flow(c1, zc1, c2, zc2)` returns the through-flow. When a resulting
/// pressure is negative that side is treated as vapour (`c = 0`, `Zc = 0`),
/// the flow is solved again and pressures are clamped at zero.
pub fn solve_with_cavitation<F>(c1: f64, zc1: f64, c2: f64, zc2: f64, flow: F) -> RestrictionState
where
    F: Fn(f64, f64, f64, f64) -> f64,
{
    let state = RestrictionState::from_flow(flow(c1, zc1, c2, zc2), c1, zc1, c2, zc2);
    if state.p1 >= 0.0 && state.p2 >= 0.0 {
        return state;
    }
    let (c1, zc1) = if state.p1 < 0.0 { (0.0, 0.0) } else { (c1, zc1) };
    let (c2, zc2) = if state.p2 < 0.0 { (0.0, 0.0) } else { (c2, zc2) };
    let mut state = RestrictionState::from_flow(flow(c1, zc1, c2, zc2), c1, zc1, c2, zc2);
    state.p1 = state.p1.max(0.0);
    state.p2 = state.p2.max(0.0);
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laminar(kc: f64) -> impl Fn(f64, f64, f64, f64) -> f64 {
        move |c1, zc1, c2, zc2| kc * (c1 - c2) / (1.0 + kc * (zc1 + zc2))
    }

    #[test]
    fn restriction_flow_is_antisymmetric() {
        let s = solve_with_cavitation(2e6, 1e9, 1e6, 1e9, laminar(1e-11));
        assert_eq!(s.q1, -s.q2);
        assert!(s.q2 > 0.0, "flow goes from high to low wave variable");
    }

    #[test]
    fn cavitation_clamps_pressure() {
        // A negative incoming wave on port 2 pulls its pressure below zero
        let s = solve_with_cavitation(1e5, 1e9, -5e6, 1e9, laminar(1e-11));
        assert_eq!(s.p2, 0.0);
        assert!(s.p1 > 0.0);
        assert_eq!(s.q1, -s.q2);
        assert!(s.q2 > 0.0);
    }

    #[test]
    fn bound_reports_uninitialized() {
        let slot: Option<u8> = None;
        assert!(matches!(
            bound(&slot, "orifice"),
            Err(ComponentError::NotInitialized { what: "orifice" })
        ));
    }
}
