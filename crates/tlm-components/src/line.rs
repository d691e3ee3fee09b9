//! Lossless transmission line.

use tlm_graph::Port;
use tlm_graph::node_types::HYDRAULIC;
use tlm_numerics::Delay;

use crate::base::ComponentBase;
use crate::common::{HydraulicNodeData, bound};
use crate::error::{ComponentError, ComponentResult};
use crate::traits::{Component, ComponentKind};

/// Hydraulic line with a pure time delay `T` between its ends.
///
/// The TLM coupling itself contributes one timestep, so the internal delay
/// lines hold `T − Ts`:
///
/// ```text
/// c1 ← α c1 + (1 − α) · delay(c2 + 2 Zc q2)
/// c2 ← α c2 + (1 − α) · delay(c1 + 2 Zc q1)
/// ```
#[derive(Debug)]
pub struct HydraulicTlmLosslessLine {
    base: ComponentBase,
    zc: f64,
    alpha: f64,
    delayed_c1: Delay,
    delayed_c2: Delay,
    ports: Option<(HydraulicNodeData, HydraulicNodeData)>,
}

impl HydraulicTlmLosslessLine {
    pub const TYPE_NAME: &'static str = "HydraulicTLMLosslessLine";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        base.add_port_at(Port::new("P1", HYDRAULIC), 0)?;
        base.add_port_at(Port::new("P2", HYDRAULIC), 1)?;
        base.add_parameter("Zc", "Characteristic impedance", "Ns/m^5", 1e9)?;
        base.add_parameter("T", "Time delay", "s", 1e-3)?;
        base.add_parameter("alpha", "Low pass coefficient", "-", 0.0)?;
        base.add_parameter("p0", "Initial pressure", "Pa", 1e5)?;
        Ok(Self {
            base,
            zc: 0.0,
            alpha: 0.0,
            delayed_c1: Delay::with_steps(0, 0.0),
            delayed_c2: Delay::with_steps(0, 0.0),
            ports: None,
        })
    }

    /// Number of buffered steps on each end.
    pub fn delay_steps(&self) -> usize {
        self.delayed_c1.step_delay()
    }
}

impl Component for HydraulicTlmLosslessLine {
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
        let zc = self.base.parameters().positive("Zc")?;
        let delay = self.base.param("T")?;
        let alpha = self.base.param("alpha")?;
        let p0 = self.base.param("p0")?;
        let ts = self.base.timestep();
        if !(0.0..1.0).contains(&alpha) {
            return Err(ComponentError::InvalidParameter {
                name: "alpha".to_string(),
                what: "must be in [0, 1)",
            });
        }
        if delay < ts * (1.0 - 1e-9) {
            return Err(ComponentError::InvalidParameter {
                name: "T".to_string(),
                what: "must be at least one timestep",
            });
        }

        let inner = (delay - ts).max(0.0);
        self.delayed_c1 = Delay::with_time(inner, ts, p0)?;
        self.delayed_c2 = Delay::with_time(inner, ts, p0)?;
        self.delayed_c1.initialize(self.base.clock(), p0);
        self.delayed_c2.initialize(self.base.clock(), p0);
        self.zc = zc;
        self.alpha = alpha;

        let p1 = HydraulicNodeData::bind(&self.base, "P1")?;
        let p2 = HydraulicNodeData::bind(&self.base, "P2")?;
        for port in [&p1, &p2] {
            port.set_q(0.0);
            port.set_p(p0);
            port.set_c(p0);
            port.set_zc(zc);
        }
        self.ports = Some((p1, p2));
        Ok(())
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let (p1, p2) = bound(&self.ports, "line ports")?;
        let zc = self.zc;
        let c10 = p2.c() + 2.0 * zc * p2.q();
        let c20 = p1.c() + 2.0 * zc * p1.q();
        let c1 = self.alpha * p1.c() + (1.0 - self.alpha) * self.delayed_c1.value_with(c10)?;
        let c2 = self.alpha * p2.c() + (1.0 - self.alpha) * self.delayed_c2.value_with(c20)?;
        p1.set_c(c1);
        p1.set_zc(zc);
        p2.set_c(c2);
        p2.set_zc(zc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tlm_graph::NodeFactory;

    fn bound_line(t: f64) -> (HydraulicTlmLosslessLine, HydraulicNodeData, HydraulicNodeData) {
        let f = NodeFactory::with_builtin();
        let a = Arc::new(f.create(HYDRAULIC).unwrap());
        let b = Arc::new(f.create(HYDRAULIC).unwrap());
        let mut line = HydraulicTlmLosslessLine::new("line").unwrap();
        line.set_parameter_value("T", t).unwrap();
        line.set_parameter_value("p0", 0.0).unwrap();
        line.port_mut("P1").unwrap().set_node(&a).unwrap();
        line.port_mut("P2").unwrap().set_node(&b).unwrap();
        (
            line,
            HydraulicNodeData::from_node(a),
            HydraulicNodeData::from_node(b),
        )
    }

    #[test]
    fn wave_arrives_after_the_inner_delay() {
        // T = 3 Ts: two buffered steps plus the coupling step
        let (mut line, h1, h2) = bound_line(3e-3);
        line.initialize().unwrap();
        assert_eq!(line.delay_steps(), 2);

        h2.set_q(1e-6);
        let zc = line.base().param("Zc").unwrap();
        let mut seen = Vec::new();
        for i in 0..4 {
            line.base().clock().set(i as f64 * 1e-3);
            line.simulate_one_timestep().unwrap();
            seen.push(h1.c());
        }
        assert_eq!(&seen[..2], &[0.0, 0.0]);
        assert!((seen[2] - 2.0 * zc * 1e-6).abs() < 1e-9);
    }

    #[test]
    fn too_short_delay_is_rejected() {
        let (mut line, _h1, _h2) = bound_line(1e-4);
        assert!(matches!(
            line.initialize(),
            Err(ComponentError::InvalidParameter { .. })
        ));
    }
}
