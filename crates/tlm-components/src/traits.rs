//! Core traits for component models.

use std::sync::Arc;

use tlm_graph::{Node, Port};

use crate::base::ComponentBase;
use crate::error::ComponentResult;

/// Stage a component runs in within one timestep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Signal,
    C,
    Q,
}

/// Closed set of component capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Capacitive or wave-propagating: writes wave variable and impedance.
    C,
    /// Resistive or source: reads wave variable and impedance, writes
    /// pressure and flow (or the domain equivalent).
    Q,
    /// Signal block: reads and writes signal nodes.
    Signal,
    /// Nested system scheduled in the given stage of its parent.
    System(Stage),
}

impl ComponentKind {
    pub fn stage(self) -> Stage {
        match self {
            ComponentKind::C => Stage::C,
            ComponentKind::Q => Stage::Q,
            ComponentKind::Signal => Stage::Signal,
            ComponentKind::System(stage) => stage,
        }
    }

    pub fn is_system(self) -> bool {
        matches!(self, ComponentKind::System(_))
    }
}

/// Contract every simulated component satisfies.
///
/// `initialize` must write every node slot the component owns (wave variable
/// and impedance for C components, pressure and flow for Q components)
/// before any component steps. `simulate_one_timestep` reads and writes only
/// the nodes bound to the component's own ports, so components within one
/// stage can run in any order or in parallel.
pub trait Component: Send {
    fn base(&self) -> &ComponentBase;

    fn base_mut(&mut self) -> &mut ComponentBase;

    /// Registered type name, e.g. `HydraulicLaminarOrifice`.
    fn type_name(&self) -> &str;

    fn kind(&self) -> ComponentKind;

    /// Prepare for a run starting at the component's current time.
    ///
    /// # Returns
    /// An error when a parameter is invalid or a port is unbound; the
    /// owning system aborts before stepping.
    fn initialize(&mut self) -> ComponentResult<()>;

    /// Advance one own timestep.
    fn simulate_one_timestep(&mut self) -> ComponentResult<()>;

    fn finalize(&mut self) -> ComponentResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    /// Advance from the current time to `stop_t`, sub-stepping with the
    /// component's own timestep.
    ///
    /// # Arguments
    /// * `stop_t` - time at the end of the parent's step
    fn simulate_to(&mut self, stop_t: f64) -> ComponentResult<()> {
        let t0 = self.base().time();
        let ts = self.base().timestep();
        let steps = sub_steps(t0, stop_t, ts);
        for i in 0..steps {
            self.simulate_one_timestep()?;
            self.base().clock().set(t0 + (i + 1) as f64 * ts);
        }
        self.base().clock().set(stop_t);
        Ok(())
    }

    fn set_parameter_value(&mut self, name: &str, value: f64) -> ComponentResult<()> {
        self.base_mut().parameters_mut().set(name, value)
    }

    /// Port as seen from the parent (systems resolve their external ports to
    /// the inner component's port).
    fn port(&self, name: &str) -> ComponentResult<&Port> {
        Ok(self.base().ports().port(name)?)
    }

    fn port_mut(&mut self, name: &str) -> ComponentResult<&mut Port> {
        Ok(self.base_mut().ports_mut().port_mut(name)?)
    }

    fn port_names(&self) -> Vec<String> {
        self.base().ports().names()
    }

    /// Push every node owned below this component. Leaf components own no
    /// nodes; systems report theirs and their subsystems'.
    fn collect_nodes(&self, _out: &mut Vec<Arc<Node>>) {}

    /// Named child, for systems.
    fn child(&self, _name: &str) -> Option<&dyn Component> {
        None
    }

    fn child_mut(&mut self, _name: &str) -> Option<&mut dyn Component> {
        None
    }
}

/// Number of `ts` steps from `t0` to `stop_t`, rounded to nearest.
pub fn sub_steps(t0: f64, stop_t: f64, ts: f64) -> usize {
    if !(ts > 0.0) || !(stop_t > t0) {
        return 0;
    }
    ((stop_t - t0) / ts + 0.5) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_of_each_kind() {
        assert_eq!(ComponentKind::C.stage(), Stage::C);
        assert_eq!(ComponentKind::Q.stage(), Stage::Q);
        assert_eq!(ComponentKind::Signal.stage(), Stage::Signal);
        assert_eq!(ComponentKind::System(Stage::Q).stage(), Stage::Q);
        assert!(ComponentKind::System(Stage::C).is_system());
    }

    #[test]
    fn sub_steps_round_to_nearest() {
        assert_eq!(sub_steps(0.0, 1e-3, 1e-4), 10);
        assert_eq!(sub_steps(0.0, 1.0005, 0.1), 10);
        assert_eq!(sub_steps(0.2, 0.2, 0.1), 0);
        assert_eq!(sub_steps(0.0, 1.0, 0.0), 0);
    }
}
