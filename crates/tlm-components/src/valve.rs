//! Pressure relief valve with spool dynamics.

use tlm_graph::Port;
use tlm_graph::node_types::HYDRAULIC;
use tlm_numerics::{FirstOrderTransferFunction, TurbulentFlowFunction, ValveHysteresis};

use crate::base::ComponentBase;
use crate::common::{HydraulicNodeData, bound, solve_with_cavitation};
use crate::error::ComponentResult;
use crate::traits::{Component, ComponentKind};

/// Pressure drop at which `q_nom` is specified.
const P_NOM: f64 = 7e6;

/// Direct-acting relief valve opening from `P1` to `P2` above `p_ref`.
///
/// ## Model
///
/// The spool opening `x0` (a turbulent flow coefficient) follows the
/// steady-state balance of spring, flow forces and pressure through a first
/// order low pass whose cutoff depends on the operating point:
///
/// ```text
/// b1    = Cs + max(Δp Cf, 0)
/// γ     = 2√|Δp| / (2√|Δp| + (Zc1 + Zc2) x0)
/// b2    = max(γ (Zc1 + Zc2) √|Δp|, 0)
/// xs    = (γ (c1 − c2) + b2 x0 / 2 − p_ref) / (b1 + b2)
/// xh    = p_h / (b1 + b2)
/// x0   ← lowpass(hyst(xs, xh, x0)),  ωc = (1 + b2/b1) / τ
/// ```
///
/// with `Cs = √Pnom / k_cs`, `Cf = 1 / (k_cf √Pnom)` and the opening limited
/// to `[0, q_nom / √Pnom]`.
#[derive(Debug)]
pub struct HydraulicPressureReliefValve {
    base: ComponentBase,
    p_ref: f64,
    tao: f64,
    p_h: f64,
    cs: f64,
    cf: f64,
    x0: f64,
    x0_max: f64,
    filter: FirstOrderTransferFunction,
    turb: TurbulentFlowFunction,
    ports: Option<(HydraulicNodeData, HydraulicNodeData)>,
}

impl HydraulicPressureReliefValve {
    pub const TYPE_NAME: &'static str = "HydraulicPressureReliefValve";

    pub fn new(name: &str) -> ComponentResult<Self> {
        let mut base = ComponentBase::new(name);
        base.add_port_at(Port::new("P1", HYDRAULIC), 0)?;
        base.add_port_at(Port::new("P2", HYDRAULIC), 1)?;
        base.add_parameter("p_ref", "Reference opening pressure", "Pa", 2e7)?;
        base.add_parameter("tao", "Time constant of spool", "s", 0.01)?;
        base.add_parameter("k_cs", "Steady state characteristic due to spring", "(m^3/s)/Pa", 1e-8)?;
        base.add_parameter("k_cf", "Steady state characteristic due to flow forces", "(m^3/s)/Pa", 1e-8)?;
        base.add_parameter("q_nom", "Flow with fully open valve at pressure drop Pnom", "m^3/s", 1e-3)?;
        base.add_parameter("p_h", "Hysteresis width", "Pa", 5e5)?;
        Ok(Self {
            base,
            p_ref: 0.0,
            tao: 0.0,
            p_h: 0.0,
            cs: 0.0,
            cf: 0.0,
            x0: 0.0,
            x0_max: 0.0,
            filter: FirstOrderTransferFunction::default(),
            turb: TurbulentFlowFunction::default(),
            ports: None,
        })
    }

    /// Current spool opening.
    pub fn opening(&self) -> f64 {
        self.x0
    }

    pub fn max_opening(&self) -> f64 {
        self.x0_max
    }
}

impl Component for HydraulicPressureReliefValve {
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
        let params = self.base.parameters();
        self.p_ref = params.value("p_ref")?;
        self.tao = params.positive("tao")?;
        self.p_h = params.value("p_h")?.max(0.0);
        let k_cs = params.positive("k_cs")?;
        let k_cf = params.positive("k_cf")?;
        let q_nom = params.positive("q_nom")?;

        let sqrt_pnom = P_NOM.sqrt();
        self.cs = sqrt_pnom / k_cs;
        self.cf = 1.0 / (k_cf * sqrt_pnom);
        self.x0_max = q_nom / sqrt_pnom;
        self.x0 = 0.0;
        self.filter.initialize(
            self.base.clock(),
            self.base.timestep(),
            [1.0, 0.0],
            [1.0, self.tao],
            0.0,
            0.0,
            0.0,
            self.x0_max,
        )?;

        let p1 = HydraulicNodeData::bind(&self.base, "P1")?;
        let p2 = HydraulicNodeData::bind(&self.base, "P2")?;
        // Closed valve: no flow, each side sees its incoming wave
        for port in [&p1, &p2] {
            port.set_q(0.0);
            port.set_p(port.c());
        }
        self.ports = Some((p1, p2));
        Ok(())
    }

    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let (p1, p2) = bound(&self.ports, "relief valve ports")?;
        let (c1, zc1, c2, zc2) = (p1.c(), p1.zc(), p2.c(), p2.zc());
        let dp = p1.p() - p2.p();
        let sqrt_dp = dp.abs().sqrt();
        let zc = zc1 + zc2;

        let b1 = self.cs + (dp * self.cf).max(0.0);
        let denom = 2.0 * sqrt_dp + zc * self.x0;
        let gamma = if denom != 0.0 { 2.0 * sqrt_dp / denom } else { 1.0 };
        let b2 = (gamma * zc * sqrt_dp).max(0.0);

        let xs = (gamma * (c1 - c2) + b2 * self.x0 / 2.0 - self.p_ref) / (b1 + b2);
        let xh = self.p_h / (b1 + b2);
        let xsh = ValveHysteresis::value(xs, xh, self.x0);

        let w_cutoff = (1.0 + b2 / b1) / self.tao;
        self.filter.set_num_den([1.0, 0.0], [1.0, 1.0 / w_cutoff])?;
        self.x0 = self.filter.update(xsh)?.clamp(0.0, self.x0_max);

        self.turb.set_flow_coefficient(self.x0);
        let turb = self.turb;
        let state = solve_with_cavitation(c1, zc1, c2, zc2, |c1, zc1, c2, zc2| {
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
    use tlm_graph::NodeFactory;

    fn run_valve(c1: f64, c2: f64, steps: usize) -> (HydraulicPressureReliefValve, HydraulicNodeData) {
        let f = NodeFactory::with_builtin();
        let a = Arc::new(f.create(HYDRAULIC).unwrap());
        let b = Arc::new(f.create(HYDRAULIC).unwrap());
        HydraulicNodeData::from_node(Arc::clone(&a)).set_c(c1);
        HydraulicNodeData::from_node(Arc::clone(&b)).set_c(c2);

        let mut valve = HydraulicPressureReliefValve::new("prv").unwrap();
        valve.port_mut("P1").unwrap().set_node(&a).unwrap();
        valve.port_mut("P2").unwrap().set_node(&b).unwrap();
        valve.initialize().unwrap();
        for i in 0..steps {
            valve.base().clock().set(i as f64 * 1e-3);
            valve.simulate_one_timestep().unwrap();
        }
        (valve, HydraulicNodeData::from_node(b))
    }

    #[test]
    fn stays_closed_below_reference_pressure() {
        let (valve, out) = run_valve(1e7, 1e5, 200);
        assert_eq!(valve.opening(), 0.0);
        assert_eq!(out.q(), 0.0);
    }

    #[test]
    fn opens_above_reference_pressure() {
        let (valve, out) = run_valve(3e7, 1e5, 200);
        assert!(valve.opening() > 0.0);
        assert!(valve.opening() <= valve.max_opening());
        assert!(out.q() > 0.0, "relief flow must leave through P2");
    }

    #[test]
    fn spool_follows_a_first_order_lag() {
        let (early, _) = run_valve(3e7, 1e5, 1);
        let (late, _) = run_valve(3e7, 1e5, 50);
        assert!(early.opening() < late.opening());
    }
}
