//! State shared by every component: name, timing, ports and parameters.

use std::sync::Arc;

use tlm_core::SimClock;
use tlm_graph::{Node, Port, PortTable};

use crate::error::{ComponentError, ComponentResult};
use crate::parameters::ParameterSet;

/// Timestep used until a parent system assigns one.
pub const DEFAULT_TIMESTEP: f64 = 1e-3;

#[derive(Debug)]
pub struct ComponentBase {
    name: String,
    timestep: f64,
    desired_timestep: Option<f64>,
    clock: SimClock,
    ports: PortTable,
    parameters: ParameterSet,
}

impl ComponentBase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestep: DEFAULT_TIMESTEP,
            desired_timestep: None,
            clock: SimClock::default(),
            ports: PortTable::new(),
            parameters: ParameterSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Timestep in effect for the next run.
    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    /// Assigned by the parent system before `initialize`.
    pub fn set_timestep(&mut self, ts: f64) {
        self.timestep = ts;
    }

    /// Own timestep request; `None` inherits the parent's.
    pub fn desired_timestep(&self) -> Option<f64> {
        self.desired_timestep
    }

    pub fn set_desired_timestep(&mut self, ts: Option<f64>) -> ComponentResult<()> {
        if let Some(ts) = ts {
            if !(ts > 0.0) || !ts.is_finite() {
                return Err(ComponentError::InvalidParameter {
                    name: "timestep".to_string(),
                    what: "must be positive and finite",
                });
            }
            self.timestep = ts;
        }
        self.desired_timestep = ts;
        Ok(())
    }

    pub fn inherits_timestep(&self) -> bool {
        self.desired_timestep.is_none()
    }

    /// Component-local simulation time.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    /// Clock driving the component's delays and filters.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut PortTable {
        &mut self.ports
    }

    /// Append a port.
    pub fn add_port(&mut self, port: Port) -> ComponentResult<()> {
        self.ports.add_port(port, None)?;
        Ok(())
    }

    /// Place a port at a fixed index.
    pub fn add_port_at(&mut self, port: Port, index: usize) -> ComponentResult<()> {
        self.ports.add_port(port, Some(index))?;
        Ok(())
    }

    /// Node bound to `port`.
    pub fn node(&self, port: &str) -> ComponentResult<Arc<Node>> {
        Ok(self.ports.node(port)?)
    }

    /// Every node bound to a (multi)port, in sub-port order.
    pub fn nodes(&self, port: &str) -> ComponentResult<Vec<Arc<Node>>> {
        Ok(self.ports.port(port)?.nodes())
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    pub fn add_parameter(
        &mut self,
        name: &str,
        description: &str,
        unit: &str,
        default: f64,
    ) -> ComponentResult<()> {
        self.parameters.add(name, description, unit, default)
    }

    pub fn param(&self, name: &str) -> ComponentResult<f64> {
        self.parameters.value(name)
    }
}
