//! Electric domain: voltage source and resistor.

use tlm_core::units::Voltage;
use tlm_graph::Port;
use tlm_graph::node_types::ELECTRIC;

use crate::base::ComponentBase;
use crate::common::{ElectricNodeData, bound};
use crate::error::ComponentResult;
use crate::traits::{Component, ComponentKind};

/// Ideal voltage source (C): `c = U`, `Zc = 0`.
#[derive(Debug)]
pub struct ElectricVoltageSource {
    base: ComponentBase,
    u: f64,
    p1: Option<ElectricNodeData>,
}

impl ElectricVoltageSource {
    pub const TYPE_NAME: &'static str = "ElectricVoltageSource";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        base.add_port(Port::new("P1", ELECTRIC))?;
        base.add_parameter("U", "Voltage", "V", 12.0)?;
        Ok(Self {
            base,
            u: 0.0,
            p1: None,
        })
    }

    pub fn with_voltage(name: &str, u: Voltage) -> ComponentResult<Self> {
        let mut s = Self::new(name)?;
        s.base.parameters_mut().set("U", u.value)?;
        Ok(s)
    }
}

impl Component for ElectricVoltageSource {
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
        ComponentKind::C
    }

    fn initialize(&mut self) -> ComponentResult<()> {
        self.u = self.base.param("U")?;
        let p1 = ElectricNodeData::bind(&self.base, "P1")?;
        p1.set_u(self.u);
        self.p1 = Some(p1);
        self.simulate_one_timestep()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let p1 = bound(&self.p1, "voltage source port")?;
        p1.set_c(self.u);
        p1.set_zc(0.0);
        Ok(())
    }
}

/// Resistor (Q): `i2 = (c1 − c2) / (R + Zc1 + Zc2)`.
#[derive(Debug)]
pub struct ElectricResistor {
    base: ComponentBase,
    r: f64,
    ports: Option<(ElectricNodeData, ElectricNodeData)>,
}

impl ElectricResistor {
    pub const TYPE_NAME: &'static str = "ElectricResistor";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        base.add_port_at(Port::new("P1", ELECTRIC), 0)?;
        base.add_port_at(Port::new("P2", ELECTRIC), 1)?;
        base.add_parameter("R", "Resistance", "Ohm", 1.0)?;
        Ok(Self {
            base,
            r: 0.0,
            ports: None,
        })
    }
}

impl Component for ElectricResistor {
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
        self.r = self.base.parameters().positive("R")?;
        self.ports = Some((
            ElectricNodeData::bind(&self.base, "P1")?,
            ElectricNodeData::bind(&self.base, "P2")?,
        ));
        self.simulate_one_timestep()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let (p1, p2) = bound(&self.ports, "resistor ports")?;
        let (c1, zc1, c2, zc2) = (p1.c(), p1.zc(), p2.c(), p2.zc());
        let i2 = (c1 - c2) / (self.r + zc1 + zc2);
        let i1 = -i2;
        p1.set_i(i1);
        p1.set_u(c1 + zc1 * i1);
        p2.set_i(i2);
        p2.set_u(c2 + zc2 * i2);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tlm_core::units::volt;
    use tlm_graph::NodeFactory;

    #[test]
    fn ohms_law_between_two_sources() {
        let f = NodeFactory::with_builtin();
        let a = Arc::new(f.create(ELECTRIC).unwrap());
        let b = Arc::new(f.create(ELECTRIC).unwrap());

        let mut hi = ElectricVoltageSource::with_voltage("U1", volt(12.0)).unwrap();
        let mut lo = ElectricVoltageSource::with_voltage("U0", volt(2.0)).unwrap();
        let mut r = ElectricResistor::new("R").unwrap();
        r.set_parameter_value("R", 5.0).unwrap();
        hi.port_mut("P1").unwrap().set_node(&a).unwrap();
        lo.port_mut("P1").unwrap().set_node(&b).unwrap();
        r.port_mut("P1").unwrap().set_node(&a).unwrap();
        r.port_mut("P2").unwrap().set_node(&b).unwrap();

        hi.initialize().unwrap();
        lo.initialize().unwrap();
        r.initialize().unwrap();

        let out = ElectricNodeData::bind(r.base(), "P2").unwrap();
        let inp = ElectricNodeData::bind(r.base(), "P1").unwrap();
        assert!((out.i() - 2.0).abs() < 1e-12);
        assert_eq!(inp.i(), -out.i());
        assert_eq!(inp.u(), 12.0);
    }

    #[test]
    fn zero_resistance_is_rejected() {
        let mut r = ElectricResistor::new("R").unwrap();
        r.set_parameter_value("R", 0.0).unwrap();
        assert!(r.initialize().is_err());
    }
}
