//! Translational mechanics: mass, spring and force source.

use tlm_core::units::Force;
use tlm_graph::Port;
use tlm_graph::node_types::MECHANIC;
use tlm_numerics::{FirstOrderTransferFunction, Integrator};

use crate::base::ComponentBase;
use crate::common::{MechanicNodeData, bound};
use crate::error::ComponentResult;
use crate::traits::{Component, ComponentKind};

fn two_port_base(name: &str) -> ComponentResult<ComponentBase> {
    let mut base = ComponentBase::new(name);
    base.add_port_at(Port::new("P1", MECHANIC), 0)?;
    base.add_port_at(Port::new("P2", MECHANIC), 1)?;
    Ok(base)
}

/// Rigid mass with viscous friction between two mechanical ports.
///
/// ```text
/// v2 = (c1 − c2) / (m s + B + Zc1 + Zc2),  x2 = ∫ v2
/// v1 = −v2,  x1 = −x2,  f = c + Zc v
/// ```
#[derive(Debug)]
pub struct MechanicTranslationalMass {
    base: ComponentBase,
    mass: f64,
    damping: f64,
    velocity: FirstOrderTransferFunction,
    position: Integrator,
    ports: Option<(MechanicNodeData, MechanicNodeData)>,
}

impl MechanicTranslationalMass {
    pub const TYPE_NAME: &'static str = "MechanicTranslationalMass";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = two_port_base(name)?;
        base.add_parameter("m", "Mass", "kg", 100.0)?;
        base.add_parameter("B", "Viscous friction", "Ns/m", 10.0)?;
        Ok(Self {
            base,
            mass: 0.0,
            damping: 0.0,
            velocity: FirstOrderTransferFunction::default(),
            position: Integrator::default(),
            ports: None,
        })
    }

    fn denominator(&self, zc1: f64, zc2: f64) -> [f64; 2] {
        [self.damping + zc1 + zc2, self.mass]
    }
}

impl Component for MechanicTranslationalMass {
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
        self.mass = self.base.parameters().positive("m")?;
        self.damping = self.base.param("B")?.max(0.0);
        let p1 = MechanicNodeData::bind(&self.base, "P1")?;
        let p2 = MechanicNodeData::bind(&self.base, "P2")?;

        let (ts, clock) = (self.base.timestep(), self.base.clock());
        let den = self.denominator(p1.zc(), p2.zc());
        let v2 = p2.v();
        self.velocity.initialize(
            clock,
            ts,
            [1.0, 0.0],
            den,
            p1.c() - p2.c(),
            v2,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )?;
        self.position
            .initialize(clock, ts, v2, p2.x(), f64::NEG_INFINITY, f64::INFINITY)?;

        p1.set_v(-v2);
        p1.set_x(-p2.x());
        p1.set_f(p1.c() - p1.zc() * v2);
        p2.set_f(p2.c() + p2.zc() * v2);
        p1.set_eq_mass(self.mass);
        p2.set_eq_mass(self.mass);
        self.ports = Some((p1, p2));
        Ok(())
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let (p1, p2) = bound(&self.ports, "mass ports")?;
        let (c1, zc1, c2, zc2) = (p1.c(), p1.zc(), p2.c(), p2.zc());
        let den = self.denominator(zc1, zc2);
        self.velocity.set_num_den([1.0, 0.0], den)?;
        let v2 = self.velocity.update(c1 - c2)?;
        let x2 = self.position.update(v2)?;

        p1.set_v(-v2);
        p1.set_x(-x2);
        p1.set_f(c1 - zc1 * v2);
        p2.set_v(v2);
        p2.set_x(x2);
        p2.set_f(c2 + zc2 * v2);
        Ok(())
    }
}

/// Linear spring, `Zc = k Ts`.
#[derive(Debug)]
pub struct MechanicTranslationalSpring {
    base: ComponentBase,
    zc: f64,
    ports: Option<(MechanicNodeData, MechanicNodeData)>,
}

impl MechanicTranslationalSpring {
    pub const TYPE_NAME: &'static str = "MechanicTranslationalSpring";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = two_port_base(name)?;
        base.add_parameter("k", "Spring coefficient", "N/m", 100.0)?;
        Ok(Self {
            base,
            zc: 0.0,
            ports: None,
        })
    }
}

impl Component for MechanicTranslationalSpring {
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
        let k = self.base.parameters().positive("k")?;
        self.zc = k * self.base.timestep();
        let p1 = MechanicNodeData::bind(&self.base, "P1")?;
        let p2 = MechanicNodeData::bind(&self.base, "P2")?;
        for port in [&p1, &p2] {
            port.set_c(port.f() - self.zc * port.v());
            port.set_zc(self.zc);
        }
        self.ports = Some((p1, p2));
        Ok(())
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let (p1, p2) = bound(&self.ports, "spring ports")?;
        let zc = self.zc;
        let c1 = p2.c() + 2.0 * zc * p2.v();
        let c2 = p1.c() + 2.0 * zc * p1.v();
        p1.set_c(c1);
        p1.set_zc(zc);
        p2.set_c(c2);
        p2.set_zc(zc);
        Ok(())
    }
}

/// Ideal force source (C): `c = F`, `Zc = 0`.
#[derive(Debug)]
pub struct MechanicForceSource {
    base: ComponentBase,
    force: f64,
    p1: Option<MechanicNodeData>,
}

impl MechanicForceSource {
    pub const TYPE_NAME: &'static str = "MechanicForceSource";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        base.add_port(Port::new("P1", MECHANIC))?;
        base.add_parameter("F", "Force", "N", 0.0)?;
        Ok(Self {
            base,
            force: 0.0,
            p1: None,
        })
    }

    pub fn with_force(name: &str, force: Force) -> ComponentResult<Self> {
        let mut s = Self::new(name)?;
        s.base.parameters_mut().set("F", force.value)?;
        Ok(s)
    }
}

impl Component for MechanicForceSource {
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
        self.force = self.base.param("F")?;
        let p1 = MechanicNodeData::bind(&self.base, "P1")?;
        p1.set_f(self.force);
        self.p1 = Some(p1);
        self.simulate_one_timestep()
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let p1 = bound(&self.p1, "force source port")?;
        p1.set_c(self.force);
        p1.set_zc(0.0);
        Ok(())
    }
}
