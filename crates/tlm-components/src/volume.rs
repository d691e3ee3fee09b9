//! Hydraulic volume: the capacitive C component of a hydraulic network.

use tlm_core::units::{Pressure, Volume};
use tlm_graph::Port;
use tlm_graph::node_types::HYDRAULIC;

use crate::base::ComponentBase;
use crate::common::HydraulicNodeData;
use crate::error::{ComponentError, ComponentResult};
use crate::traits::{Component, ComponentKind};

/// Lumped volume with any number of connections on its multiport `P1`.
///
/// ## Model
///
/// ```text
/// Zc    = N/2 · Be/V · Ts / (1 − α)
/// pMean = Σ (c_i + 2 Zc_i q_i) / N
/// c_i  ← α c_i + (1 − α)(2 pMean − c_i − 2 Zc_i q_i) + (Zc_i − Zc) q_i
/// ```
///
/// `α` is a numerical damping factor in `[0, 1)`.
#[derive(Debug)]
pub struct HydraulicVolume {
    base: ComponentBase,
    ports: Vec<HydraulicNodeData>,
    zc: f64,
    alpha: f64,
}

impl HydraulicVolume {
    pub const TYPE_NAME: &'static str = "HydraulicVolume";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        base.add_port(Port::new("P1", HYDRAULIC).multi())?;
        base.add_parameter("V", "Volume", "m^3", 1e-3)?;
        base.add_parameter("Beta_e", "Bulk modulus", "Pa", 1e9)?;
        base.add_parameter("alpha", "Low pass coefficient", "-", 0.1)?;
        base.add_parameter("p0", "Initial pressure", "Pa", 1e5)?;
        Ok(Self {
            base,
            ports: Vec::new(),
            zc: 0.0,
            alpha: 0.0,
        })
    }

    /// Volume with typed physical values and no damping.
    pub fn with_values(
        name: &str,
        volume: Volume,
        beta_e: Pressure,
        p0: Pressure,
    ) -> ComponentResult<Self> {
        let mut v = Self::new(name)?;
        v.base.parameters_mut().set("V", volume.value)?;
        v.base.parameters_mut().set("Beta_e", beta_e.value)?;
        v.base.parameters_mut().set("p0", p0.value)?;
        v.base.parameters_mut().set("alpha", 0.0)?;
        Ok(v)
    }

    /// Characteristic impedance computed at the last `initialize`.
    pub fn char_impedance(&self) -> f64 {
        self.zc
    }
}

impl Component for HydraulicVolume {
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
        let volume = self.base.parameters().positive("V")?;
        let beta_e = self.base.parameters().positive("Beta_e")?;
        let alpha = self.base.param("alpha")?;
        let p0 = self.base.param("p0")?;
        if !(0.0..1.0).contains(&alpha) {
            return Err(ComponentError::InvalidParameter {
                name: "alpha".to_string(),
                what: "must be in [0, 1)",
            });
        }

        self.ports = self
            .base
            .nodes("P1")?
            .into_iter()
            .map(HydraulicNodeData::from_node)
            .collect();
        let n = self.ports.len().max(1) as f64;
        self.alpha = alpha;
        self.zc = n / 2.0 * beta_e / volume * self.base.timestep() / (1.0 - alpha);

        for port in &self.ports {
            port.set_q(0.0);
            port.set_p(p0);
            port.set_c(p0);
            port.set_zc(self.zc);
        }
        Ok(())
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        if self.ports.is_empty() {
            return Ok(());
        }
        let n = self.ports.len() as f64;
        let p_mean = self
            .ports
            .iter()
            .map(|p| p.c() + 2.0 * p.zc() * p.q())
            .sum::<f64>()
            / n;

        for port in &self.ports {
            let (c, zc, q) = (port.c(), port.zc(), port.q());
            let c0 = 2.0 * p_mean - c - 2.0 * zc * q;
            port.set_c(self.alpha * c + (1.0 - self.alpha) * c0 + (zc - self.zc) * q);
            port.set_zc(self.zc);
        }
        Ok(())
    }
}
