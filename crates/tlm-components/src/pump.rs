//! Fixed displacement pump.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};
use tlm_graph::Port;
use tlm_graph::node_types::HYDRAULIC;
use tlm_numerics::EquationSystemSolver;

use crate::base::ComponentBase;
use crate::common::{HydraulicNodeData, bound};
use crate::error::ComponentResult;
use crate::traits::{Component, ComponentKind};

const NEWTON_ITERATIONS: usize = 2;

/// Pump from `P1` to `P2` with internal leakage.
///
/// ## Model
///
/// Unknowns `x = [q2, p1, p2]`, ideal flow `qi = Dp/(2π) · n`:
///
/// ```text
/// f1 = q2 − qi + Cl (p2 − p1)
/// f2 = p1 − c1 + Zc1 q2
/// f3 = p2 − c2 − Zc2 q2
/// ```
///
/// solved with a fixed number of Newton iterations from the previous step's
/// solution. Port pressures are held at or above zero.
#[derive(Debug)]
pub struct HydraulicFixedDisplacementPump {
    base: ComponentBase,
    qi: f64,
    cl: f64,
    solver: EquationSystemSolver,
    state: Vector3<f64>,
    ports: Option<(HydraulicNodeData, HydraulicNodeData)>,
}

impl HydraulicFixedDisplacementPump {
    pub const TYPE_NAME: &'static str = "HydraulicFixedDisplacementPump";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        base.add_port_at(Port::new("P1", HYDRAULIC), 0)?;
        base.add_port_at(Port::new("P2", HYDRAULIC), 1)?;
        base.add_parameter("n", "Angular velocity", "rad/s", 250.0)?;
        base.add_parameter("Dp", "Displacement", "m^3/rev", 5e-5)?;
        base.add_parameter("Cl", "Leakage coefficient", "m^3/sPa", 0.0)?;
        Ok(Self {
            base,
            qi: 0.0,
            cl: 0.0,
            solver: EquationSystemSolver::new(3),
            state: Vector3::zeros(),
            ports: None,
        })
    }

    /// Ideal (leak free) delivery.
    pub fn ideal_flow(&self) -> f64 {
        self.qi
    }
}

impl Component for HydraulicFixedDisplacementPump {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Q
    }

    fn initialize(&mut self) -> ComponentResult<()> {
        let n = self.base.param("n")?;
        let dp = self.base.param("Dp")?;
        self.cl = self.base.param("Cl")?.max(0.0);
        self.qi = dp / (2.0 * PI) * n;

        let p1 = HydraulicNodeData::bind(&self.base, "P1")?;
        let p2 = HydraulicNodeData::bind(&self.base, "P2")?;
        self.state = Vector3::new(0.0, p1.c(), p2.c());
        self.ports = Some((p1, p2));
        self.simulate_one_timestep()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let (p1, p2) = bound(&self.ports, "pump ports")?;
        let (c1, zc1, c2, zc2) = (p1.c(), p1.zc(), p2.c(), p2.zc());
        let cl = self.cl;

        #[rustfmt::skip]
        let jacobian = Matrix3::new(
            1.0,  -cl, cl,
            zc1,  1.0, 0.0,
            -zc2, 0.0, 1.0,
        );
        for iteration in 1..=NEWTON_ITERATIONS {
            let (q2, pr1, pr2) = (self.state[0], self.state[1], self.state[2]);
            let residual = Vector3::new(
                q2 - self.qi + cl * (pr2 - pr1),
                pr1 - c1 + zc1 * q2,
                pr2 - c2 - zc2 * q2,
            );
            self.solver
                .solve_3x3(&jacobian, &residual, &mut self.state, iteration)?;
        }

        let q2 = self.state[0];
        p1.set_q(-q2);
        p1.set_p(self.state[1].max(0.0));
        p2.set_q(q2);
        p2.set_p(self.state[2].max(0.0));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tlm_graph::NodeFactory;

    fn bound_pump(cl: f64) -> (HydraulicFixedDisplacementPump, HydraulicNodeData, HydraulicNodeData) {
        let f = NodeFactory::with_builtin();
        let a = Arc::new(f.create(HYDRAULIC).unwrap());
        let b = Arc::new(f.create(HYDRAULIC).unwrap());
        let (h1, h2) = (
            HydraulicNodeData::from_node(Arc::clone(&a)),
            HydraulicNodeData::from_node(Arc::clone(&b)),
        );
        h1.set_c(1e5);
        h1.set_zc(1e9);
        h2.set_c(1e7);
        h2.set_zc(1e9);
        let mut pump = HydraulicFixedDisplacementPump::new("pump").unwrap();
        pump.set_parameter_value("Cl", cl).unwrap();
        pump.port_mut("P1").unwrap().set_node(&a).unwrap();
        pump.port_mut("P2").unwrap().set_node(&b).unwrap();
        (pump, h1, h2)
    }

    #[test]
    fn leak_free_pump_delivers_ideal_flow() {
        let (mut pump, h1, h2) = bound_pump(0.0);
        pump.initialize().unwrap();
        let qi = pump.ideal_flow();
        assert!((qi - 5e-5 / (2.0 * PI) * 250.0).abs() < 1e-15);
        assert!((h2.q() - qi).abs() < 1e-12);
        assert_eq!(h1.q(), -h2.q());
        assert!((h2.p() - (1e7 + 1e9 * qi)).abs() < 1e-3);
    }

    #[test]
    fn leakage_matches_closed_form() {
        let cl = 1e-11;
        let (mut pump, _h1, h2) = bound_pump(cl);
        pump.initialize().unwrap();
        let qi = pump.ideal_flow();
        let expected = (qi - cl * (1e7 - 1e5)) / (1.0 + cl * 2e9);
        assert!((h2.q() - expected).abs() < 1e-12, "q2={}, expected={expected}", h2.q());
    }

    #[test]
    fn suction_pressure_is_clamped() {
        let (mut pump, h1, _h2) = bound_pump(0.0);
        pump.set_parameter_value("n", 2000.0).unwrap();
        pump.initialize().unwrap();
        // c1 - Zc1 q2 is far below zero at this speed
        assert_eq!(h1.p(), 0.0);
    }
}
