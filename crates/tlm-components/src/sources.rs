//! Hydraulic boundary conditions: pressure sources, tank and flow source.

use tlm_core::units::{Pressure, VolumeRate, constants};
use tlm_graph::Port;
use tlm_graph::node_types::HYDRAULIC;

use crate::base::ComponentBase;
use crate::common::{HydraulicNodeData, bound};
use crate::error::ComponentResult;
use crate::traits::{Component, ComponentKind};

/// Ideal pressure source (C): `c = p`, `Zc = 0`.
#[derive(Debug)]
pub struct HydraulicPressureSource {
    base: ComponentBase,
    type_name: &'static str,
    p: f64,
    p1: Option<HydraulicNodeData>,
}

impl HydraulicPressureSource {
    pub const TYPE_NAME: &'static str = "HydraulicPressureSource";
    pub const TANK_TYPE_NAME: &'static str = "HydraulicTank";

    pub fn new(name: &str) -> ComponentResult<Self> {
        Self::build(name, Self::TYPE_NAME, 1e5)
    }

    /// Source held at atmospheric pressure.
    pub fn tank(name: &str) -> ComponentResult<Self> {
        Self::build(name, Self::TANK_TYPE_NAME, constants::P_ATM_PA)
    }

    pub fn with_pressure(name: &str, p: Pressure) -> ComponentResult<Self> {
        let mut s = Self::new(name)?;
        s.base.parameters_mut().set("p", p.value)?;
        Ok(s)
    }

    fn build(name: &str, type_name: &'static str, p: f64) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        base.add_port(Port::new("P1", HYDRAULIC))?;
        base.add_parameter("p", "Pressure", "Pa", p)?;
        Ok(Self {
            base,
            type_name,
            p,
            p1: None,
        })
    }

    fn write(&self) -> ComponentResult<()> {
        let p1 = bound(&self.p1, "pressure source port")?;
        p1.set_c(self.p);
        p1.set_zc(0.0);
        Ok(())
    }
}

impl Component for HydraulicPressureSource {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn type_name(&self) -> &str {
        self.type_name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::C
    }

    fn initialize(&mut self) -> ComponentResult<()> {
        self.p = self.base.param("p")?;
        let p1 = HydraulicNodeData::bind(&self.base, "P1")?;
        p1.set_p(self.p);
        self.p1 = Some(p1);
        self.write()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        self.write()
    }
}

/// Ideal flow source (Q): pushes `q` into the node on `P1`.
#[derive(Debug)]
pub struct HydraulicFlowSource {
    base: ComponentBase,
    q: f64,
    p1: Option<HydraulicNodeData>,
}

impl HydraulicFlowSource {
    pub const TYPE_NAME: &'static str = "HydraulicFlowSource";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        base.add_port(Port::new("P1", HYDRAULIC))?;
        base.add_parameter("q", "Flow", "m^3/s", 1e-3)?;
        Ok(Self {
            base,
            q: 0.0,
            p1: None,
        })
    }

    pub fn with_flow(name: &str, q: VolumeRate) -> ComponentResult<Self> {
        let mut s = Self::new(name)?;
        s.base.parameters_mut().set("q", q.value)?;
        Ok(s)
    }
}

impl Component for HydraulicFlowSource {
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
        self.q = self.base.param("q")?;
        self.p1 = Some(HydraulicNodeData::bind(&self.base, "P1")?);
        self.simulate_one_timestep()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let p1 = bound(&self.p1, "flow source port")?;
        p1.set_q(self.q);
        p1.set_p(p1.c() + p1.zc() * self.q);
        Ok(())
    }
}
