//! Session: the component and node registries plus the message queue that
//! every system built in it shares.

use std::sync::Arc;

use tlm_components::{Component, ComponentFactory, ComponentLibrary, StandardLibrary};
use tlm_core::MessageHandler;
use tlm_graph::NodeFactory;

use crate::description::{NetworkDescription, SystemSpec};
use crate::error::{SimError, SimResult};
use crate::system::ComponentSystem;

#[derive(Debug)]
pub struct Session {
    messages: Arc<MessageHandler>,
    components: ComponentFactory,
    nodes: Arc<NodeFactory>,
}

impl Session {
    /// A session with the built-in node types and the standard component
    /// library loaded.
    pub fn new() -> SimResult<Self> {
        let session = Self::empty();
        session.load_library(&StandardLibrary)?;
        Ok(session)
    }

    /// Built-in node types only; no component types.
    pub fn empty() -> Self {
        Self {
            messages: Arc::new(MessageHandler::new()),
            components: ComponentFactory::new(),
            nodes: Arc::new(NodeFactory::with_builtin()),
        }
    }

    pub fn messages(&self) -> &Arc<MessageHandler> {
        &self.messages
    }

    pub fn component_factory(&self) -> &ComponentFactory {
        &self.components
    }

    pub fn node_factory(&self) -> &Arc<NodeFactory> {
        &self.nodes
    }

    /// Load a library's node types, then its component types. Either
    /// everything is registered or the registries are left as they were.
    ///
    /// # Returns
    /// The number of component types added.
    pub fn load_library(&self, library: &dyn ComponentLibrary) -> SimResult<usize> {
        let name = library.name();
        let node_count = match self.nodes.load_templates(
            name,
            library.core_version(),
            library.node_types(),
        ) {
            Ok(n) => n,
            Err(e) => {
                self.messages
                    .add_error("library", format!("{name}: node types rejected: {e}"));
                return Err(e.into());
            }
        };

        match self.components.load_library(library) {
            Ok(count) => {
                self.messages.add_info(
                    "library",
                    format!("{name}: loaded {count} component and {node_count} node types"),
                );
                Ok(count)
            }
            Err(e) => {
                if node_count > 0 {
                    self.nodes.unregister_library(name);
                }
                self.messages
                    .add_error("library", format!("{name}: component types rejected: {e}"));
                Err(e.into())
            }
        }
    }

    /// Unload every component and node type a library registered.
    ///
    /// # Returns
    /// `(component types, node types)` removed.
    pub fn unload_library(&self, name: &str) -> (usize, usize) {
        let removed = (
            self.components.unregister_library(name),
            self.nodes.unregister_library(name),
        );
        tracing::info!(library = name, components = removed.0, nodes = removed.1, "unloaded library");
        removed
    }

    pub fn create_component(&self, type_name: &str, name: &str) -> SimResult<Box<dyn Component>> {
        self.components.create(type_name, name).map_err(|e| {
            self.messages
                .add_error("create", format!("cannot create '{name}' of type {type_name}: {e}"));
            e.into()
        })
    }

    /// An empty system sharing this session's registries and messages.
    pub fn create_system(&self, name: &str) -> ComponentSystem {
        ComponentSystem::with_handles(name, Arc::clone(&self.nodes), Arc::clone(&self.messages))
    }

    /// Build a ready-to-initialize system from a description.
    pub fn build(&self, description: &NetworkDescription) -> SimResult<ComponentSystem> {
        description.validate()?;
        let mut system = self.build_system(&description.system)?;
        system.set_options(description.options.clone())?;
        tracing::info!(
            system = %description.system.name,
            components = system.num_components(),
            nodes = system.nodes().len(),
            "built system from description"
        );
        Ok(system)
    }

    fn build_system(&self, spec: &SystemSpec) -> SimResult<ComponentSystem> {
        let mut system = self.create_system(&spec.name);
        if let Some(ts) = spec.timestep {
            system.set_desired_timestep(ts)?;
        }
        if let Some(role) = spec.stage {
            system.set_role(role.into());
        }

        for comp in &spec.components {
            let mut component = self.create_component(&comp.type_name, &comp.name)?;
            for (param, value) in &comp.parameters {
                component
                    .set_parameter_value(param, *value)
                    .map_err(|e| SimError::Description {
                        what: format!("{}.{}: {}", comp.name, param, e),
                    })?;
            }
            if let Some(ts) = comp.timestep {
                component.base_mut().set_desired_timestep(Some(ts))?;
            }
            system.add_component(component)?;
        }
        for sub in &spec.subsystems {
            let child = self.build_system(sub)?;
            system.add_component(Box::new(child))?;
        }
        for conn in &spec.connections {
            system.connect(
                &conn.from.component,
                &conn.from.port,
                &conn.to.component,
                &conn.to.port,
            )?;
        }
        for port in &spec.ports {
            system.add_system_port(&port.name, &port.component, &port.port)?;
        }
        Ok(system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlm_components::ComponentCreator;
    use tlm_graph::NodeTemplate;

    struct FutureLibrary;

    impl ComponentLibrary for FutureLibrary {
        fn name(&self) -> &str {
            "future"
        }

        fn core_version(&self) -> &str {
            "99.0.0"
        }

        fn components(&self) -> Vec<(&'static str, ComponentCreator)> {
            Vec::new()
        }
    }

    struct ClashingLibrary;

    impl ComponentLibrary for ClashingLibrary {
        fn name(&self) -> &str {
            "clash"
        }

        fn components(&self) -> Vec<(&'static str, ComponentCreator)> {
            StandardLibrary.components()
        }

        fn node_types(&self) -> Vec<NodeTemplate> {
            vec![NodeTemplate::new("NodePneumatic", "Pneumatic", Vec::new())]
        }
    }

    #[test]
    fn standard_session_creates_components() {
        let session = Session::new().unwrap();
        let v = session.create_component("HydraulicVolume", "v1").unwrap();
        assert_eq!(v.name(), "v1");
        assert!(session.create_component("Nope", "x").is_err());
        assert_eq!(session.messages().counts().error, 1);
    }

    #[test]
    fn incompatible_library_is_rejected() {
        let session = Session::new().unwrap();
        let before = session.component_factory().type_names();
        assert!(session.load_library(&FutureLibrary).is_err());
        assert_eq!(session.component_factory().type_names(), before);
    }

    #[test]
    fn failed_component_load_rolls_back_node_types() {
        let session = Session::new().unwrap();
        assert!(session.load_library(&ClashingLibrary).is_err());
        assert!(!session.node_factory().contains("NodePneumatic"));
    }
}
