//! Orifices: algebraic Q components between two hydraulic ports.

use tlm_graph::Port;
use tlm_graph::node_types::HYDRAULIC;
use tlm_numerics::TurbulentFlowFunction;

use crate::base::ComponentBase;
use crate::common::{HydraulicNodeData, bound, solve_with_cavitation};
use crate::error::ComponentResult;
use crate::traits::{Component, ComponentKind};

fn two_port_base(name: &str) -> ComponentResult<ComponentBase> {
    let mut base = ComponentBase::new(name);
    base.add_port_at(Port::new("P1", HYDRAULIC), 0)?;
    base.add_port_at(Port::new("P2", HYDRAULIC), 1)?;
    Ok(base)
}

/// Laminar orifice, `q = Kc (p1 − p2)`.
///
/// Solved directly in wave variables:
///
/// ```text
/// q2 = Kc (c1 − c2) / (1 + Kc (Zc1 + Zc2)),  q1 = −q2
/// p  = c + Zc q
/// ```
#[derive(Debug)]
pub struct HydraulicLaminarOrifice {
    base: ComponentBase,
    kc: f64,
    ports: Option<(HydraulicNodeData, HydraulicNodeData)>,
}

impl HydraulicLaminarOrifice {
    pub const TYPE_NAME: &'static str = "HydraulicLaminarOrifice";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = two_port_base(name)?;
        base.add_parameter("Kc", "Pressure-flow coefficient", "m^5/Ns", 1e-11)?;
        Ok(Self {
            base,
            kc: 0.0,
            ports: None,
        })
    }

    /// Orifice with the given flow coefficient in m^5/Ns.
    pub fn with_kc(name: &str, kc: f64) -> ComponentResult<Self> {
        let mut o = Self::new(name)?;
        o.base.parameters_mut().set("Kc", kc)?;
        Ok(o)
    }
}

impl Component for HydraulicLaminarOrifice {
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
        self.kc = self.base.param("Kc")?.abs();
        self.ports = Some((
            HydraulicNodeData::bind(&self.base, "P1")?,
            HydraulicNodeData::bind(&self.base, "P2")?,
        ));
        self.simulate_one_timestep()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let (p1, p2) = bound(&self.ports, "laminar orifice ports")?;
        let kc = self.kc;
        let state = solve_with_cavitation(p1.c(), p1.zc(), p2.c(), p2.zc(), |c1, zc1, c2, zc2| {
            kc * (c1 - c2) / (1.0 + kc * (zc1 + zc2))
        });
        state.write(p1, p2);
        Ok(())
    }
}

/// Turbulent orifice, `q = Cq A sqrt(2/ρ · (p1 − p2))`.
#[derive(Debug)]
pub struct HydraulicTurbulentOrifice {
    base: ComponentBase,
    turb: TurbulentFlowFunction,
    ports: Option<(HydraulicNodeData, HydraulicNodeData)>,
}

impl HydraulicTurbulentOrifice {
    pub const TYPE_NAME: &'static str = "HydraulicTurbulentOrifice";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = two_port_base(name)?;
        base.add_parameter("Cq", "Flow coefficient", "-", 0.67)?;
        base.add_parameter("A", "Area", "m^2", 1e-5)?;
        base.add_parameter("rho", "Oil density", "kg/m^3", 870.0)?;
        Ok(Self {
            base,
            turb: TurbulentFlowFunction::default(),
            ports: None,
        })
    }
}

impl Component for HydraulicTurbulentOrifice {
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
        let cq = self.base.param("Cq")?;
        let area = self.base.param("A")?;
        let rho = self.base.parameters().positive("rho")?;
        self.turb = TurbulentFlowFunction::from_orifice(cq, area, rho);
        self.ports = Some((
            HydraulicNodeData::bind(&self.base, "P1")?,
            HydraulicNodeData::bind(&self.base, "P2")?,
        ));
        self.simulate_one_timestep()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let (p1, p2) = bound(&self.ports, "turbulent orifice ports")?;
        let turb = self.turb;
        let state = solve_with_cavitation(p1.c(), p1.zc(), p2.c(), p2.zc(), |c1, zc1, c2, zc2| {
            turb.flow(c1, c2, zc1, zc2)
        });
        state.write(p1, p2);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tlm_graph::{Node, NodeFactory};

    fn nodes(c1: f64, c2: f64, zc: f64) -> (Arc<Node>, Arc<Node>) {
        let f = NodeFactory::with_builtin();
        let a = Arc::new(f.create(HYDRAULIC).unwrap());
        let b = Arc::new(f.create(HYDRAULIC).unwrap());
        for (n, c) in [(&a, c1), (&b, c2)] {
            let h = HydraulicNodeData::from_node(Arc::clone(n));
            h.set_c(c);
            h.set_zc(zc);
        }
        (a, b)
    }

    fn connect(comp: &mut dyn Component, a: &Arc<Node>, b: &Arc<Node>) {
        comp.port_mut("P1").unwrap().set_node(a).unwrap();
        comp.port_mut("P2").unwrap().set_node(b).unwrap();
    }

    #[test]
    fn laminar_matches_closed_form() {
        let (a, b) = nodes(2e6, 1e6, 1e9);
        let mut o = HydraulicLaminarOrifice::with_kc("or", 1e-11).unwrap();
        connect(&mut o, &a, &b);
        o.initialize().unwrap();

        let (h1, h2) = (HydraulicNodeData::from_node(a), HydraulicNodeData::from_node(b));
        let expected = 1e-11 * 1e6 / (1.0 + 1e-11 * 2e9);
        assert!((h2.q() - expected).abs() < 1e-18);
        assert_eq!(h1.q(), -h2.q());
        assert!((h1.p() - (2e6 - 1e9 * expected)).abs() < 1e-6);
        assert!((h2.p() - (1e6 + 1e9 * expected)).abs() < 1e-6);
    }

    #[test]
    fn laminar_negative_kc_is_taken_as_magnitude() {
        let (a, b) = nodes(2e6, 1e6, 0.0);
        let mut o = HydraulicLaminarOrifice::with_kc("or", -1e-11).unwrap();
        connect(&mut o, &a, &b);
        o.initialize().unwrap();
        assert!(HydraulicNodeData::from_node(b).q() > 0.0);
    }

    #[test]
    fn turbulent_flow_follows_square_root_law() {
        let (a, b) = nodes(1e7, 1e5, 0.0);
        let mut o = HydraulicTurbulentOrifice::new("tor").unwrap();
        connect(&mut o, &a, &b);
        o.initialize().unwrap();
        let q = HydraulicNodeData::from_node(b).q();
        let expected = 0.67 * 1e-5 * (2.0 / 870.0 * (1e7 - 1e5) as f64).sqrt();
        assert!((q - expected).abs() / expected < 1e-9, "q={q}, expected={expected}");
    }

    #[test]
    fn unbound_orifice_fails_to_initialize() {
        let mut o = HydraulicLaminarOrifice::new("or").unwrap();
        assert!(o.initialize().is_err());
    }
}
