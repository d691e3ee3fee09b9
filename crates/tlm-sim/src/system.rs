//! Hierarchical component system.
//!
//! A [`ComponentSystem`] owns its child components and the nodes its
//! `connect` calls create. It is itself a [`Component`], so a system can
//! be nested inside another one and is stepped in the stage its role
//! names.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tlm_components::{
    Component, ComponentBase, ComponentError, ComponentKind, ComponentResult, Stage, sub_steps,
};
use tlm_core::MessageHandler;
use tlm_graph::{GraphError, LogAllocation, Node, NodeFactory, Port, PortKind, PortRef, PortRequirement};

use crate::barrier::{CancelToken, RunControl};
use crate::error::{SimError, SimResult};
use crate::options::SimOptions;
use crate::scheduler::{StepLogger, StepPlan, log_row, run_steps, stage_partition};

/// Type name a nested system reports.
pub const SYSTEM_TYPE_NAME: &str = "Subsystem";

/// Relative tolerance when checking that a child timestep divides the
/// parent's.
const TIMESTEP_TOLERANCE: f64 = 1e-6;

/// Lifecycle of a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemState {
    /// Built or changed since the last initialize.
    Unconfigured,
    Initialized,
    Stepping,
    Finished,
    /// Stopped by a cancel request.
    Aborted,
    /// A check, an initialize or a step failed.
    Failed,
    Finalized,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunOutcome {
    Completed,
    Aborted,
}

/// External port of a system, forwarding to a child's port.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SystemPort {
    name: String,
    component: String,
    port: String,
}

/// What `connect` needs to know about one endpoint before touching it.
struct Endpoint {
    label: String,
    node_type: String,
    kind: PortKind,
    /// Bound node of a single port; multiports never join by themselves.
    node: Option<Arc<Node>>,
    bound: Vec<Arc<Node>>,
}

pub struct ComponentSystem {
    base: ComponentBase,
    role: Stage,
    components: Vec<Box<dyn Component>>,
    signal_ids: Vec<usize>,
    c_ids: Vec<usize>,
    q_ids: Vec<usize>,
    nodes: Vec<Arc<Node>>,
    dummy_nodes: Vec<Arc<Node>>,
    system_ports: Vec<SystemPort>,
    node_factory: Arc<NodeFactory>,
    messages: Arc<MessageHandler>,
    options: SimOptions,
    cancel: CancelToken,
    state: SystemState,
    window: Option<(f64, f64)>,
    log_slots: usize,
    logged: usize,
}

impl fmt::Debug for ComponentSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSystem")
            .field("name", &self.base.name())
            .field("state", &self.state)
            .field("components", &self.component_names())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl ComponentSystem {
    /// A stand-alone system with its own node registry and message queue.
    pub fn new(name: &str) -> Self {
        Self::with_handles(
            name,
            Arc::new(NodeFactory::with_builtin()),
            Arc::new(MessageHandler::new()),
        )
    }

    /// A system sharing a session's node registry and message queue.
    pub fn with_handles(
        name: &str,
        node_factory: Arc<NodeFactory>,
        messages: Arc<MessageHandler>,
    ) -> Self {
        Self {
            base: ComponentBase::new(name),
            role: Stage::C,
            components: Vec::new(),
            signal_ids: Vec::new(),
            c_ids: Vec::new(),
            q_ids: Vec::new(),
            nodes: Vec::new(),
            dummy_nodes: Vec::new(),
            system_ports: Vec::new(),
            node_factory,
            messages,
            options: SimOptions::default(),
            cancel: CancelToken::new(),
            state: SystemState::Unconfigured,
            window: None,
            log_slots: 0,
            logged: 0,
        }
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    /// Stage this system runs in when nested in another system.
    pub fn role(&self) -> Stage {
        self.role
    }

    pub fn set_role(&mut self, role: Stage) {
        self.role = role;
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: SimOptions) -> SimResult<()> {
        options.validate()?;
        self.options = options;
        self.invalidate();
        Ok(())
    }

    pub fn messages(&self) -> &Arc<MessageHandler> {
        &self.messages
    }

    pub fn node_factory(&self) -> &Arc<NodeFactory> {
        &self.node_factory
    }

    /// Handle another thread can use to stop a running simulation.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn timestep(&self) -> f64 {
        self.base.timestep()
    }

    pub fn set_desired_timestep(&mut self, ts: f64) -> SimResult<()> {
        self.base.set_desired_timestep(Some(ts))?;
        self.invalidate();
        Ok(())
    }

    /// Child names in insertion order.
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name()).collect()
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Nodes created by this system's `connect` calls.
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    /// Look up a child by name, or a grandchild by `sub/child` path.
    pub fn component(&self, path: &str) -> Option<&dyn Component> {
        match path.split_once('/') {
            Some((head, rest)) => self.component(head)?.child(rest),
            None => {
                let i = self.index_of(path)?;
                Some(self.components[i].as_ref())
            }
        }
    }

    pub fn component_mut(&mut self, path: &str) -> Option<&mut dyn Component> {
        match path.split_once('/') {
            Some((head, rest)) => self.component_mut(head)?.child_mut(rest),
            None => {
                let i = self.index_of(path)?;
                let component: &mut dyn Component = self.components[i].as_mut();
                Some(component)
            }
        }
    }

    /// Add one child.
    ///
    /// # Returns
    /// `DuplicateName` when the name is taken, `InvalidArg` for a name that
    /// is empty or holds a `/` or `.` separator.
    pub fn add_component(&mut self, component: Box<dyn Component>) -> SimResult<()> {
        let result = self.check_new_names(&[component.name()]);
        if let Err(e) = &result {
            self.report("add_component", e);
        }
        result?;
        tracing::debug!(
            system = self.base.name(),
            component = component.name(),
            kind = ?component.kind(),
            "added component"
        );
        self.components.push(component);
        self.reindex();
        self.invalidate();
        Ok(())
    }

    /// Add several children; either all of them are added or none.
    pub fn add_components(&mut self, components: Vec<Box<dyn Component>>) -> SimResult<()> {
        let names: Vec<&str> = components.iter().map(|c| c.name()).collect();
        let result = self.check_new_names(&names);
        if let Err(e) = &result {
            self.report("add_components", e);
        }
        result?;
        self.components.extend(components);
        self.reindex();
        self.invalidate();
        Ok(())
    }

    /// Remove a child, unbinding its ports. Nodes left with fewer than two
    /// ports are dropped.
    pub fn remove_component(&mut self, name: &str) -> SimResult<Box<dyn Component>> {
        let i = self.component_index(name)?;
        let mut component = self.components.remove(i);
        for port_name in component.port_names() {
            if let Ok(port) = component.port_mut(&port_name) {
                let port_ref = PortRef::new(name, port_name.as_str(), port.kind());
                for node in port.nodes() {
                    port.unbind(&node);
                    node.remove_connection(&port_ref);
                }
            }
        }
        self.system_ports.retain(|p| p.component != name);
        self.reindex();
        self.drop_orphan_nodes();
        self.invalidate();
        tracing::debug!(system = self.base.name(), component = name, "removed component");
        Ok(component)
    }

    /// Connect `c1.p1` with `c2.p2`.
    ///
    /// Everything is validated before any port is touched: unknown
    /// components or ports, node type mismatch, two signal inputs or two
    /// signal outputs, and ports that are both already bound are rejected
    /// with the system unchanged. When exactly one signal port is already
    /// bound to a node of this system, the other port joins that node, so
    /// one output can feed many inputs.
    pub fn connect(&mut self, c1: &str, p1: &str, c2: &str, p2: &str) -> SimResult<()> {
        let result = self.try_connect(c1, p1, c2, p2);
        if let Err(e) = &result {
            self.report("connect", e);
        }
        result
    }

    fn try_connect(&mut self, c1: &str, p1: &str, c2: &str, p2: &str) -> SimResult<()> {
        if !self.dummy_nodes.is_empty() {
            self.invalidate();
        }
        let a = self.endpoint(c1, p1)?;
        let b = self.endpoint(c2, p2)?;
        let invalid = |what: &str| SimError::InvalidConnection {
            from: a.label.clone(),
            to: b.label.clone(),
            what: what.to_string(),
        };

        if c1 == c2 && p1 == p2 {
            return Err(invalid("a port cannot connect to itself"));
        }
        if a.node_type != b.node_type {
            return Err(SimError::TypeMismatch {
                from: a.label.clone(),
                to: b.label.clone(),
                from_type: a.node_type.clone(),
                to_type: b.node_type.clone(),
            });
        }
        match (a.kind, b.kind) {
            (PortKind::Read, PortKind::Read) => return Err(invalid("both ports are signal inputs")),
            (PortKind::Write, PortKind::Write) => {
                return Err(invalid("both ports are signal outputs"));
            }
            _ => {}
        }

        let (node, created) = match (&a.node, &b.node) {
            (Some(na), Some(nb)) if Arc::ptr_eq(na, nb) => {
                return Err(invalid("the ports are already connected"));
            }
            (Some(_), Some(_)) => return Err(invalid("both ports are already connected")),
            (Some(existing), None) | (None, Some(existing)) => {
                if a.kind == PortKind::Power {
                    return Err(invalid("the power port is already connected"));
                }
                if !self.nodes.iter().any(|n| Arc::ptr_eq(n, existing)) {
                    return Err(invalid("the bound port belongs to a node of another system"));
                }
                let joining = if a.node.is_some() { &b } else { &a };
                if joining.bound.iter().any(|n| Arc::ptr_eq(n, existing)) {
                    return Err(invalid("the ports are already connected"));
                }
                if joining.kind == PortKind::Write && existing.write_port().is_some() {
                    return Err(invalid("the signal already has an output"));
                }
                (Arc::clone(existing), false)
            }
            (None, None) => (Arc::new(self.node_factory.create(&a.node_type)?), true),
        };

        let mut bound = Vec::new();
        for (comp, port, endpoint) in [(c1, p1, &a), (c2, p2, &b)] {
            if endpoint.node.is_some() {
                continue;
            }
            if let Err(e) = self.bind(comp, port, endpoint.kind, &node) {
                for (comp, port, kind) in bound {
                    self.unbind(comp, port, kind, &node);
                }
                return Err(e);
            }
            bound.push((comp, port, endpoint.kind));
        }
        if created {
            self.nodes.push(node);
        }
        self.invalidate();
        tracing::debug!(system = self.base.name(), from = %a.label, to = %b.label, "connected");
        Ok(())
    }

    /// Undo a `connect`. On a fanned-out signal only the reader is
    /// detached. A node left with fewer than two ports is dropped.
    pub fn disconnect(&mut self, c1: &str, p1: &str, c2: &str, p2: &str) -> SimResult<()> {
        let a = self.port_of(c1, p1)?;
        let b = self.port_of(c2, p2)?;
        let shared = a.nodes().into_iter().find(|n| {
            b.nodes().iter().any(|m| Arc::ptr_eq(n, m))
                && self.nodes.iter().any(|own| Arc::ptr_eq(own, n))
        });
        let (kind_a, kind_b) = (a.kind(), b.kind());
        let Some(node) = shared else {
            return Err(SimError::NotConnected {
                from: format!("{c1}.{p1}"),
                to: format!("{c2}.{p2}"),
            });
        };
        if node.num_connected_ports() > 2 {
            // other readers still hang on the output, only the reader leaves
            let (comp, port, kind) = if kind_a == PortKind::Write {
                (c2, p2, kind_b)
            } else {
                (c1, p1, kind_a)
            };
            self.unbind(comp, port, kind, &node);
        } else {
            self.unbind(c1, p1, kind_a, &node);
            self.unbind(c2, p2, kind_b, &node);
        }
        self.drop_orphan_nodes();
        self.invalidate();
        Ok(())
    }

    /// Expose `component.port` to the parent system as `name`.
    pub fn add_system_port(&mut self, name: &str, component: &str, port: &str) -> SimResult<()> {
        if self.system_ports.iter().any(|p| p.name == name) {
            return Err(SimError::DuplicateName {
                name: format!("{}.{}", self.base.name(), name),
            });
        }
        self.port_of(component, port)?;
        self.system_ports.push(SystemPort {
            name: name.to_string(),
            component: component.to_string(),
            port: port.to_string(),
        });
        Ok(())
    }

    /// Set a parameter on a child (or grandchild by `sub/child` path).
    pub fn set_component_parameter(
        &mut self,
        component: &str,
        name: &str,
        value: f64,
    ) -> SimResult<()> {
        let target = self
            .component_mut(component)
            .ok_or_else(|| SimError::UnknownComponent {
                name: component.to_string(),
            })?;
        target.set_parameter_value(name, value)?;
        self.invalidate();
        Ok(())
    }

    /// Verify the model can run: required ports are connected (optional
    /// ones get a private dummy node) and every child timestep is an
    /// integer fraction of this system's. Children inheriting the timestep
    /// are given this system's.
    pub fn check_model(&mut self) -> SimResult<()> {
        let ts = self.base.timestep();
        for comp in &mut self.components {
            match comp.base().desired_timestep() {
                None => comp.base_mut().set_timestep(ts),
                Some(child_ts) => {
                    let ratio = ts / child_ts;
                    let divides = ratio >= 1.0 - TIMESTEP_TOLERANCE
                        && (ratio - ratio.round()).abs() <= TIMESTEP_TOLERANCE * ratio;
                    if !divides {
                        return Err(SimError::TimestepMismatch {
                            component: comp.name().to_string(),
                            child: child_ts,
                            parent: ts,
                        });
                    }
                    comp.base_mut().set_timestep(child_ts);
                }
            }

            // Subsystems check their own children when initialized.
            if comp.kind().is_system() {
                continue;
            }
            for port_name in comp.port_names() {
                let port = comp.port(&port_name)?;
                if port.is_connected() {
                    continue;
                }
                match port.requirement() {
                    PortRequirement::Required => {
                        return Err(SimError::UnconnectedPort {
                            component: comp.name().to_string(),
                            port: port_name,
                        });
                    }
                    PortRequirement::Optional => {
                        let node = Arc::new(self.node_factory.create(port.node_type())?);
                        comp.port_mut(&port_name)?.set_node(&node)?;
                        self.dummy_nodes.push(node);
                    }
                }
            }
        }
        Ok(())
    }

    /// Reserve `round((stop - start) / Ts)` log rows in every node of this
    /// system and of its subsystems. Nested systems log at this system's
    /// sampling.
    ///
    /// # Returns
    /// The number of rows reserved. Nodes whose buffer cannot be allocated
    /// stop logging and a warning is queued; the run still goes ahead.
    pub fn pre_allocate_log_space(&mut self, start: f64, stop: f64) -> usize {
        let slots = sub_steps(start, stop, self.base.timestep());
        let mut nodes = Vec::new();
        self.collect_nodes(&mut nodes);
        for node in &nodes {
            node.set_logging_enabled(self.options.log_samples);
            if let LogAllocation::Disabled { reason } = node.pre_allocate_log_space(slots) {
                self.messages.add_warning(
                    "log",
                    format!(
                        "{}: logging disabled for a {} node: {}",
                        self.base.name(),
                        node.node_type(),
                        reason
                    ),
                );
            }
        }
        self.log_slots = slots;
        slots
    }

    /// Check the model, reserve logs and initialize the children, signal
    /// components first, then C, then Q. Row 0 of the log is written from
    /// the initial node values.
    ///
    /// On failure the system is left `Failed` and the error is also queued
    /// as a message.
    pub fn initialize(&mut self, start: f64, stop: f64) -> SimResult<()> {
        if !start.is_finite() || !stop.is_finite() || stop < start {
            return Err(SimError::InvalidArg {
                what: "start and stop must be finite with stop >= start",
            });
        }
        self.options.validate()?;
        self.cancel.reset();
        self.logged = 0;
        self.window = None;
        self.base.clock().set(start);

        let result = self.prepare().and_then(|()| {
            self.pre_allocate_log_space(start, stop);
            self.initialize_children()
        });
        if let Err(e) = result {
            self.state = SystemState::Failed;
            self.report("initialize", &e);
            return Err(e);
        }

        if self.options.log_samples && self.log_slots > 0 {
            let mut nodes = Vec::new();
            self.collect_nodes(&mut nodes);
            log_row(&nodes, 0);
            self.logged = 1;
        }
        self.window = Some((start, stop));
        self.state = SystemState::Initialized;
        tracing::info!(
            system = self.base.name(),
            start,
            stop,
            timestep = self.base.timestep(),
            components = self.components.len(),
            nodes = self.nodes.len(),
            "system initialized"
        );
        Ok(())
    }

    /// Run from `start` to `stop` with the configured strategy,
    /// initializing first unless already initialized for this window.
    ///
    /// # Returns
    /// `Completed`, or `Aborted` after a cancel request. A component
    /// failure stops every thread within the step and returns
    /// `ComponentFailed`; logs stay valid up to the last complete row.
    pub fn simulate(&mut self, start: f64, stop: f64) -> SimResult<RunOutcome> {
        if self.state != SystemState::Initialized || self.window != Some((start, stop)) {
            self.initialize(start, stop)?;
        }

        let ts = self.base.timestep();
        let plan = StepPlan {
            start,
            timestep: ts,
            steps: sub_steps(start, stop, ts),
        };
        let threads = self.options.effective_threads();
        let strategy = self.options.strategy;
        let rows = if self.options.log_samples {
            self.log_slots
        } else {
            0
        };
        let mut log_nodes = Vec::new();
        self.collect_nodes(&mut log_nodes);
        let control = RunControl::new(self.cancel.clone());

        self.state = SystemState::Stepping;
        tracing::info!(
            system = self.base.name(),
            steps = plan.steps,
            threads,
            %strategy,
            "simulation started"
        );
        let started = Instant::now();

        let mut logger = StepLogger::new(&log_nodes, self.base.clock(), plan, rows, self.logged);
        let sets = stage_partition(
            &mut self.components,
            &self.signal_ids,
            &self.c_ids,
            &self.q_ids,
        );
        let result = run_steps(strategy, threads, sets, plan, &mut logger, &control);
        self.logged = logger.logged();

        if let Err(e) = result {
            self.state = SystemState::Failed;
            self.report("simulate", &e);
            return Err(e);
        }
        if let Some((component, source)) = control.take_failure() {
            self.state = SystemState::Failed;
            let e = SimError::ComponentFailed { component, source };
            self.report("simulate", &e);
            return Err(e);
        }
        if control.is_cancelled() {
            self.state = SystemState::Aborted;
            self.messages.add_info(
                "simulate",
                format!(
                    "{}: simulation aborted after {} logged samples",
                    self.base.name(),
                    self.logged
                ),
            );
            return Ok(RunOutcome::Aborted);
        }

        self.state = SystemState::Finished;
        tracing::info!(
            system = self.base.name(),
            elapsed_s = started.elapsed().as_secs_f64(),
            logged = self.logged,
            "simulation finished"
        );
        Ok(RunOutcome::Completed)
    }

    /// Finalize every child.
    pub fn finalize(&mut self) -> SimResult<()> {
        let result = self.finalize_children();
        if let Err(e) = &result {
            self.report("finalize", e);
        }
        self.state = SystemState::Finalized;
        result
    }

    /// Rows fully logged by the last run.
    pub fn num_logged_samples(&self) -> usize {
        self.logged
    }

    /// Rows reserved by the last `pre_allocate_log_space`.
    pub fn log_slots(&self) -> usize {
        self.log_slots
    }

    /// Times of the logged rows.
    pub fn time_vector(&self) -> Vec<f64> {
        let start = self.window.map(|(start, _)| start).unwrap_or_default();
        let ts = self.base.timestep();
        (0..self.logged).map(|i| start + i as f64 * ts).collect()
    }

    /// Logged history of one variable (name or short name) on the node at
    /// `component.port`.
    pub fn log_data_vector(&self, component: &str, port: &str, variable: &str) -> SimResult<Vec<f64>> {
        let node = self.port_node(component, port)?;
        let id = self.variable_id(&node, component, port, variable)?;
        Ok(node.logged_column(id, self.logged)?)
    }

    /// Current value of one variable on the node at `component.port`.
    pub fn node_value(&self, component: &str, port: &str, variable: &str) -> SimResult<f64> {
        let node = self.port_node(component, port)?;
        let id = self.variable_id(&node, component, port, variable)?;
        Ok(node.try_data_value(id)?)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.components.iter().position(|c| c.name() == name)
    }

    fn component_index(&self, name: &str) -> SimResult<usize> {
        self.index_of(name).ok_or_else(|| SimError::UnknownComponent {
            name: name.to_string(),
        })
    }

    fn port_of(&self, component: &str, port: &str) -> SimResult<&Port> {
        let comp = self
            .component(component)
            .ok_or_else(|| SimError::UnknownComponent {
                name: component.to_string(),
            })?;
        comp.port(port).map_err(|_| SimError::UnknownPort {
            component: component.to_string(),
            port: port.to_string(),
        })
    }

    fn port_node(&self, component: &str, port: &str) -> SimResult<Arc<Node>> {
        Ok(self.port_of(component, port)?.node()?)
    }

    fn variable_id(&self, node: &Node, component: &str, port: &str, variable: &str) -> SimResult<usize> {
        node.data_id_from_name(variable)
            .ok_or_else(|| SimError::UnknownVariable {
                component: component.to_string(),
                port: port.to_string(),
                variable: variable.to_string(),
            })
    }

    fn endpoint(&self, component: &str, port: &str) -> SimResult<Endpoint> {
        if self.index_of(component).is_none() {
            return Err(SimError::UnknownComponent {
                name: component.to_string(),
            });
        }
        let p = self.port_of(component, port)?;
        let node = if p.is_multiport() { None } else { p.node_ptr() };
        Ok(Endpoint {
            label: format!("{component}.{port}"),
            node_type: p.node_type().to_string(),
            kind: p.kind(),
            node,
            bound: p.nodes(),
        })
    }

    fn bind(&mut self, component: &str, port: &str, kind: PortKind, node: &Arc<Node>) -> SimResult<()> {
        let comp = self
            .component_mut(component)
            .ok_or_else(|| SimError::UnknownComponent {
                name: component.to_string(),
            })?;
        comp.port_mut(port)?.set_node(node)?;
        node.add_connection(PortRef::new(component, port, kind));
        Ok(())
    }

    fn unbind(&mut self, component: &str, port: &str, kind: PortKind, node: &Arc<Node>) {
        if let Some(comp) = self.component_mut(component) {
            if let Ok(p) = comp.port_mut(port) {
                p.unbind(node);
            }
        }
        node.remove_connection(&PortRef::new(component, port, kind));
    }

    /// Drop nodes with fewer than two ports, unbinding the one left.
    fn drop_orphan_nodes(&mut self) {
        let (keep, orphans): (Vec<_>, Vec<_>) = std::mem::take(&mut self.nodes)
            .into_iter()
            .partition(|n| n.num_connected_ports() >= 2);
        self.nodes = keep;
        for node in orphans {
            for port_ref in node.connected_ports() {
                self.unbind(&port_ref.component, &port_ref.port, port_ref.kind, &node);
            }
        }
    }

    fn check_new_names(&self, names: &[&str]) -> SimResult<()> {
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() || name.contains('/') || name.contains('.') {
                return Err(SimError::InvalidArg {
                    what: "component names must be non-empty and free of '/' and '.'",
                });
            }
            if self.index_of(name).is_some() || names[..i].contains(name) {
                return Err(SimError::DuplicateName {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Rebuild the per-stage index lists.
    fn reindex(&mut self) {
        self.signal_ids.clear();
        self.c_ids.clear();
        self.q_ids.clear();
        for (i, comp) in self.components.iter().enumerate() {
            let stage = match comp.kind() {
                ComponentKind::Signal => Stage::Signal,
                ComponentKind::C => Stage::C,
                ComponentKind::Q => Stage::Q,
                ComponentKind::System(role) => role,
            };
            match stage {
                Stage::Signal => self.signal_ids.push(i),
                Stage::C => self.c_ids.push(i),
                Stage::Q => self.q_ids.push(i),
            }
        }
    }

    /// Order signal components so each runs after the components driving
    /// its inputs. A cycle keeps the declared order for the components on
    /// it and queues a warning.
    fn sort_signals(&mut self) {
        let ids = self.signal_ids.clone();
        let names: Vec<&str> = ids.iter().map(|&i| self.components[i].name()).collect();
        let deps: Vec<Vec<usize>> = ids
            .iter()
            .enumerate()
            .map(|(k, &i)| {
                let comp = &self.components[i];
                let mut found = Vec::new();
                for port_name in comp.port_names() {
                    let Ok(port) = comp.port(&port_name) else {
                        continue;
                    };
                    if port.kind() != PortKind::Read {
                        continue;
                    }
                    for node in port.nodes() {
                        let driver = node
                            .write_port()
                            .and_then(|w| names.iter().position(|n| *n == w.component));
                        if let Some(d) = driver.filter(|&d| d != k) {
                            found.push(d);
                        }
                    }
                }
                found
            })
            .collect();

        let mut placed = vec![false; ids.len()];
        let mut order = Vec::with_capacity(ids.len());
        while order.len() < ids.len() {
            let ready = (0..ids.len()).find(|&k| !placed[k] && deps[k].iter().all(|&d| placed[d]));
            match ready {
                Some(k) => {
                    placed[k] = true;
                    order.push(ids[k]);
                }
                None => {
                    let rest: Vec<usize> = (0..ids.len()).filter(|&k| !placed[k]).collect();
                    let cycle: Vec<&str> = rest.iter().map(|&k| names[k]).collect();
                    self.messages.add_warning(
                        "signal",
                        format!(
                            "{}: algebraic loop between {}, using declared order",
                            self.base.name(),
                            cycle.join(", ")
                        ),
                    );
                    order.extend(rest.into_iter().map(|k| ids[k]));
                }
            }
        }
        self.signal_ids = order;
    }

    /// Checks and ordering shared by top-level and nested initialization.
    fn prepare(&mut self) -> SimResult<()> {
        self.reindex();
        self.check_model()?;
        self.sort_signals();
        let t0 = self.base.time();
        for comp in &self.components {
            comp.base().clock().set(t0);
        }
        Ok(())
    }

    fn initialize_children(&mut self) -> SimResult<()> {
        let order: Vec<usize> = self
            .signal_ids
            .iter()
            .chain(&self.c_ids)
            .chain(&self.q_ids)
            .copied()
            .collect();
        for i in order {
            let comp = &mut self.components[i];
            comp.initialize().map_err(|source| SimError::ComponentFailed {
                component: comp.name().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    fn finalize_children(&mut self) -> SimResult<()> {
        for comp in &mut self.components {
            comp.finalize().map_err(|source| SimError::ComponentFailed {
                component: comp.name().to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Any structural change sends the system back to `Unconfigured`.
    fn invalidate(&mut self) {
        self.dummy_nodes.clear();
        self.state = SystemState::Unconfigured;
        self.window = None;
    }

    fn report(&self, tag: &str, error: &SimError) {
        self.messages
            .add_error(tag, format!("{}: {}", self.base.name(), error));
    }

    /// Express a failure inside this system as a component error of the
    /// parent.
    fn as_subsystem_error(&self, error: SimError) -> ComponentError {
        match error {
            SimError::ComponentFailed { component, source } => ComponentError::Subsystem {
                path: format!("{}/{}", self.base.name(), component),
                message: source.to_string(),
            },
            other => ComponentError::Subsystem {
                path: self.base.name().to_string(),
                message: other.to_string(),
            },
        }
    }

    fn alias(&self, name: &str) -> ComponentResult<SystemPort> {
        self.system_ports
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| {
                ComponentError::Graph(GraphError::UnknownPort {
                    port: name.to_string(),
                })
            })
    }
}

impl Component for ComponentSystem {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn type_name(&self) -> &str {
        SYSTEM_TYPE_NAME
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::System(self.role)
    }

    /// Nested initialization: the parent has already set this system's
    /// clock and timestep.
    fn initialize(&mut self) -> ComponentResult<()> {
        let result = self.prepare().and_then(|()| self.initialize_children());
        match result {
            Ok(()) => {
                self.state = SystemState::Initialized;
                Ok(())
            }
            Err(e) => {
                self.state = SystemState::Failed;
                Err(self.as_subsystem_error(e))
            }
        }
    }

    /// One own timestep: signal, C and Q children in turn.
    fn simulate_one_timestep(&mut self) -> ComponentResult<()> {
        let stop_t = self.base.time() + self.base.timestep();
        let order = self.signal_ids.iter().chain(&self.c_ids).chain(&self.q_ids);
        for &i in order {
            let comp = &mut self.components[i];
            if let Err(source) = comp.simulate_to(stop_t) {
                let e = SimError::ComponentFailed {
                    component: comp.name().to_string(),
                    source,
                };
                self.state = SystemState::Failed;
                return Err(self.as_subsystem_error(e));
            }
        }
        Ok(())
    }

    fn finalize(&mut self) -> ComponentResult<()> {
        let result = self.finalize_children();
        self.state = SystemState::Finalized;
        result.map_err(|e| self.as_subsystem_error(e))
    }

    fn port(&self, name: &str) -> ComponentResult<&Port> {
        let alias = self.alias(name)?;
        let child = self.component(&alias.component).ok_or_else(|| {
            ComponentError::Graph(GraphError::UnknownPort {
                port: name.to_string(),
            })
        })?;
        child.port(&alias.port)
    }

    fn port_mut(&mut self, name: &str) -> ComponentResult<&mut Port> {
        let alias = self.alias(name)?;
        let child = self.component_mut(&alias.component).ok_or_else(|| {
            ComponentError::Graph(GraphError::UnknownPort {
                port: name.to_string(),
            })
        })?;
        child.port_mut(&alias.port)
    }

    fn port_names(&self) -> Vec<String> {
        self.system_ports.iter().map(|p| p.name.clone()).collect()
    }

    fn collect_nodes(&self, out: &mut Vec<Arc<Node>>) {
        out.extend(self.nodes.iter().cloned());
        for comp in &self.components {
            comp.collect_nodes(out);
        }
    }

    fn child(&self, name: &str) -> Option<&dyn Component> {
        self.component(name)
    }

    fn child_mut(&mut self, name: &str) -> Option<&mut dyn Component> {
        self.component_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlm_components::{
        HydraulicLaminarOrifice, HydraulicVolume, SignalConstant, SignalGain,
    };
    use tlm_core::units::{m3, pa};

    fn two_volumes(p_left: f64, p_right: f64) -> ComponentSystem {
        let mut sys = ComponentSystem::new("root");
        sys.add_component(Box::new(
            HydraulicVolume::with_values("left", m3(1e-3), pa(1e9), pa(p_left)).unwrap(),
        ))
        .unwrap();
        sys.add_component(Box::new(
            HydraulicVolume::with_values("right", m3(1e-3), pa(1e9), pa(p_right)).unwrap(),
        ))
        .unwrap();
        sys.add_component(Box::new(HydraulicLaminarOrifice::with_kc("or", 1e-11).unwrap()))
            .unwrap();
        sys.connect("left", "P1", "or", "P1").unwrap();
        sys.connect("or", "P2", "right", "P1").unwrap();
        sys
    }

    #[test]
    fn children_are_classified_by_kind() {
        let sys = two_volumes(1e6, 1e6);
        assert_eq!(sys.c_ids, vec![0, 1]);
        assert_eq!(sys.q_ids, vec![2]);
        assert_eq!(sys.nodes().len(), 2);
        assert_eq!(sys.state(), SystemState::Unconfigured);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut sys = two_volumes(1e6, 1e6);
        let err = sys
            .add_component(Box::new(HydraulicVolume::new("left").unwrap()))
            .unwrap_err();
        assert!(matches!(err, SimError::DuplicateName { .. }));
        assert_eq!(sys.num_components(), 3);
        assert_eq!(sys.messages().counts().error, 1);
    }

    #[test]
    fn unconnected_required_port_fails_initialize() {
        let mut sys = ComponentSystem::new("root");
        sys.add_component(Box::new(HydraulicLaminarOrifice::new("or").unwrap()))
            .unwrap();
        let err = sys.initialize(0.0, 1.0).unwrap_err();
        assert!(matches!(err, SimError::UnconnectedPort { .. }), "{err}");
        assert_eq!(sys.state(), SystemState::Failed);
    }

    #[test]
    fn unconnected_signal_ports_get_dummy_nodes() {
        let mut sys = ComponentSystem::new("root");
        sys.add_component(Box::new(SignalGain::new("g").unwrap())).unwrap();
        sys.initialize(0.0, 0.1).unwrap();
        assert!(sys.nodes().is_empty());
        assert_eq!(sys.node_value("g", "out", "y").unwrap(), 0.0);

        // a structural change releases the dummies so the port can be wired
        sys.add_component(Box::new(SignalConstant::new("c").unwrap()))
            .unwrap();
        sys.connect("c", "out", "g", "in").unwrap();
        sys.set_component_parameter("c", "y", 3.0).unwrap();
        sys.set_component_parameter("g", "k", 2.0).unwrap();
        sys.initialize(0.0, 0.1).unwrap();
        assert_eq!(sys.node_value("g", "out", "y").unwrap(), 6.0);
    }

    #[test]
    fn remove_component_drops_its_nodes() {
        let mut sys = two_volumes(1e6, 1e6);
        sys.remove_component("or").unwrap();
        assert!(sys.nodes().is_empty());
        assert!(sys.component("left").unwrap().port("P1").unwrap().nodes().is_empty());
        assert!(sys.remove_component("or").is_err());
    }

    #[test]
    fn disconnect_then_reconnect() {
        let mut sys = two_volumes(1e6, 1e6);
        sys.disconnect("or", "P2", "right", "P1").unwrap();
        assert_eq!(sys.nodes().len(), 1);
        assert!(matches!(
            sys.disconnect("or", "P2", "right", "P1"),
            Err(SimError::NotConnected { .. })
        ));
        sys.connect("or", "P2", "right", "P1").unwrap();
        assert_eq!(sys.nodes().len(), 2);
    }

    #[test]
    fn timestep_must_divide_parent() {
        let mut sys = two_volumes(1e6, 1e6);
        sys.set_desired_timestep(1e-3).unwrap();
        sys.component_mut("or")
            .unwrap()
            .base_mut()
            .set_desired_timestep(Some(3e-4))
            .unwrap();
        let err = sys.initialize(0.0, 0.01).unwrap_err();
        assert!(matches!(err, SimError::TimestepMismatch { .. }), "{err}");

        sys.component_mut("or")
            .unwrap()
            .base_mut()
            .set_desired_timestep(Some(2.5e-4))
            .unwrap();
        sys.initialize(0.0, 0.01).unwrap();
        assert_eq!(sys.component("or").unwrap().base().timestep(), 2.5e-4);
        assert_eq!(sys.component("left").unwrap().base().timestep(), 1e-3);
    }

    #[test]
    fn log_slots_round_to_nearest() {
        let mut sys = two_volumes(1e6, 1e6);
        sys.set_desired_timestep(0.1).unwrap();
        assert_eq!(sys.pre_allocate_log_space(0.0, 1.0005), 10);
        assert_eq!(sys.pre_allocate_log_space(0.0, 1.06), 11);
        assert!(sys.nodes().iter().all(|n| n.log_slots() == 11));
    }

    #[test]
    fn row_zero_holds_initial_values() {
        let mut sys = two_volumes(2e6, 1e6);
        sys.initialize(0.0, 0.01).unwrap();
        assert_eq!(sys.num_logged_samples(), 1);
        let p = sys.log_data_vector("left", "P1", "p").unwrap();
        assert_eq!(p, vec![sys.node_value("left", "P1", "Pressure").unwrap()]);
        assert!(p[0] < 2e6 && p[0] > 1e6, "orifice initialize already moved p: {}", p[0]);
        assert!(matches!(
            sys.log_data_vector("left", "P1", "nope"),
            Err(SimError::UnknownVariable { .. })
        ));
    }
}
