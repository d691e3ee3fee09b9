//! Ports: named, typed attachment points from a component to nodes.

use std::sync::{Arc, Weak};

use crate::error::{GraphError, GraphResult};
use crate::node::Node;

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    /// Bidirectional power port (hydraulic, mechanic, electric).
    Power,
    /// Signal input.
    Read,
    /// Signal output.
    Write,
}

/// Whether a port must be connected before simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PortRequirement {
    #[default]
    Required,
    /// Left unconnected, the owning system binds a private dummy node.
    Optional,
}

/// Back-reference from a node to a port bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub component: String,
    pub port: String,
    pub kind: PortKind,
}

impl PortRef {
    pub fn new(component: impl Into<String>, port: impl Into<String>, kind: PortKind) -> Self {
        Self {
            component: component.into(),
            port: port.into(),
            kind,
        }
    }
}

/// A component port.
///
/// A port never owns its node: the system that created the node holds the
/// strong reference, the port keeps a `Weak`. Multiports keep one binding
/// per sub-port, in connection order.
#[derive(Debug, Clone)]
pub struct Port {
    name: String,
    node_type: String,
    kind: PortKind,
    requirement: PortRequirement,
    multi: bool,
    nodes: Vec<Weak<Node>>,
}

impl Port {
    /// A required single power port.
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            kind: PortKind::Power,
            requirement: PortRequirement::Required,
            multi: false,
            nodes: Vec::new(),
        }
    }

    pub fn read(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self::new(name, node_type).with_kind(PortKind::Read)
    }

    pub fn write(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self::new(name, node_type).with_kind(PortKind::Write)
    }

    pub fn with_kind(mut self, kind: PortKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn optional(mut self) -> Self {
        self.requirement = PortRequirement::Optional;
        self
    }

    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn requirement(&self) -> PortRequirement {
        self.requirement
    }

    pub fn is_multiport(&self) -> bool {
        self.multi
    }

    /// Whether `set_node` would currently accept another binding.
    pub fn accepts_node(&self) -> bool {
        self.multi || self.live_nodes() == 0
    }

    /// Bind `node`. Single ports accept one node, multiports append a
    /// sub-port.
    pub fn set_node(&mut self, node: &Arc<Node>) -> GraphResult<()> {
        if node.node_type() != self.node_type {
            return Err(GraphError::NodeTypeMismatch {
                port: self.name.clone(),
                expected: self.node_type.clone(),
                found: node.node_type().to_string(),
            });
        }
        self.nodes.retain(|w| w.strong_count() > 0);
        if !self.multi && !self.nodes.is_empty() {
            return Err(GraphError::AlreadyConnected {
                port: self.name.clone(),
            });
        }
        self.nodes.push(Arc::downgrade(node));
        Ok(())
    }

    /// The bound node (first sub-port for multiports).
    pub fn node(&self) -> GraphResult<Arc<Node>> {
        self.node_ptr().ok_or_else(|| GraphError::NullNode {
            port: self.name.clone(),
        })
    }

    /// The bound node, or `None` when unconnected.
    pub fn node_ptr(&self) -> Option<Arc<Node>> {
        self.nodes.iter().find_map(Weak::upgrade)
    }

    /// Node of sub-port `idx`.
    pub fn node_at(&self, idx: usize) -> GraphResult<Arc<Node>> {
        self.nodes
            .get(idx)
            .and_then(Weak::upgrade)
            .ok_or_else(|| GraphError::NullNode {
                port: format!("{}#{}", self.name, idx),
            })
    }

    /// Every live bound node, in sub-port order.
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.nodes.iter().filter_map(Weak::upgrade).collect()
    }

    /// Number of live bindings (sub-ports for a multiport).
    pub fn num_nodes(&self) -> usize {
        self.live_nodes()
    }

    pub fn is_connected(&self) -> bool {
        self.live_nodes() > 0
    }

    /// Drop the binding to `node`, returning whether it was bound.
    pub fn unbind(&mut self, node: &Arc<Node>) -> bool {
        let before = self.nodes.len();
        let target = Arc::downgrade(node);
        self.nodes.retain(|w| !w.ptr_eq(&target) && w.strong_count() > 0);
        self.nodes.len() != before
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    fn live_nodes(&self) -> usize {
        self.nodes.iter().filter(|w| w.strong_count() > 0).count()
    }
}

/// Name-indexed ports of one component.
///
/// Ports may be placed at a fixed index so that port order does not depend
/// on declaration order; unused indices stay empty.
#[derive(Debug, Clone, Default)]
pub struct PortTable {
    slots: Vec<Option<Port>>,
}

impl PortTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port, appended or at `index`. Returns its index.
    pub fn add_port(&mut self, port: Port, index: Option<usize>) -> GraphResult<usize> {
        if self.get(port.name()).is_some() {
            return Err(GraphError::DuplicatePort {
                port: port.name().to_string(),
            });
        }
        match index {
            Some(i) => {
                if i >= self.slots.len() {
                    self.slots.resize_with(i + 1, || None);
                }
                if let Some(existing) = &self.slots[i] {
                    return Err(GraphError::PortIndexOccupied {
                        index: i,
                        existing: existing.name().to_string(),
                    });
                }
                self.slots[i] = Some(port);
                Ok(i)
            }
            None => {
                self.slots.push(Some(port));
                Ok(self.slots.len() - 1)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Port> {
        self.iter().find(|p| p.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.slots.iter_mut().flatten().find(|p| p.name() == name)
    }

    /// Port by name or an `UnknownPort` error.
    pub fn port(&self, name: &str) -> GraphResult<&Port> {
        self.get(name).ok_or_else(|| GraphError::UnknownPort {
            port: name.to_string(),
        })
    }

    pub fn port_mut(&mut self, name: &str) -> GraphResult<&mut Port> {
        self.get_mut(name).ok_or_else(|| GraphError::UnknownPort {
            port: name.to_string(),
        })
    }

    /// Node bound to the named port.
    pub fn node(&self, name: &str) -> GraphResult<Arc<Node>> {
        self.port(name)?.node()
    }

    pub fn by_index(&self, index: usize) -> Option<&Port> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|p| p.name() == name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Port> {
        self.slots.iter_mut().flatten()
    }

    /// Number of declared ports (gaps excluded).
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|p| p.name().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hyd() -> Arc<Node> {
        Arc::new(Node::new("NodeHydraulic", 6))
    }

    #[test]
    fn unbound_port_reports_null_node() {
        let p = Port::new("P1", "NodeHydraulic");
        assert_eq!(
            p.node().unwrap_err(),
            GraphError::NullNode { port: "P1".into() }
        );
        assert!(p.node_ptr().is_none());
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut p = Port::new("P1", "NodeMechanic");
        let err = p.set_node(&hyd()).unwrap_err();
        assert!(matches!(err, GraphError::NodeTypeMismatch { .. }));
        assert!(!p.is_connected());
    }

    #[test]
    fn single_port_binds_once() {
        let mut p = Port::new("P1", "NodeHydraulic");
        let a = hyd();
        p.set_node(&a).unwrap();
        assert!(!p.accepts_node());
        assert_eq!(
            p.set_node(&hyd()).unwrap_err(),
            GraphError::AlreadyConnected { port: "P1".into() }
        );
        assert!(Arc::ptr_eq(&p.node().unwrap(), &a));
    }

    #[test]
    fn multiport_keeps_subport_order() {
        let mut p = Port::new("P1", "NodeHydraulic").multi();
        let (a, b) = (hyd(), hyd());
        p.set_node(&a).unwrap();
        p.set_node(&b).unwrap();
        assert_eq!(p.num_nodes(), 2);
        assert!(Arc::ptr_eq(&p.node_at(1).unwrap(), &b));
        assert!(p.unbind(&a));
        assert_eq!(p.num_nodes(), 1);
        assert!(Arc::ptr_eq(&p.node().unwrap(), &b));
    }

    #[test]
    fn dropped_node_is_not_reachable() {
        let mut p = Port::new("P1", "NodeHydraulic");
        {
            let n = hyd();
            p.set_node(&n).unwrap();
        }
        assert!(!p.is_connected());
        assert!(p.node().is_err());
    }

    #[test]
    fn table_indexed_placement_with_gaps() {
        let mut t = PortTable::new();
        let p2 = Port::new("P2", "NodeHydraulic");
        assert_eq!(t.add_port(p2, Some(2)).unwrap(), 2);
        let p1 = Port::new("P1", "NodeHydraulic");
        assert_eq!(t.add_port(p1, Some(0)).unwrap(), 0);
        assert!(t.by_index(1).is_none());
        assert_eq!(t.len(), 2);
        assert_eq!(t.index_of("P2"), Some(2));

        let dup = t.add_port(Port::new("P1", "NodeHydraulic"), None);
        assert_eq!(
            dup.unwrap_err(),
            GraphError::DuplicatePort { port: "P1".into() }
        );
        let clash = t.add_port(Port::new("P3", "NodeHydraulic"), Some(0));
        assert!(matches!(clash, Err(GraphError::PortIndexOccupied { index: 0, .. })));
        assert!(matches!(
            t.port("nope"),
            Err(GraphError::UnknownPort { .. })
        ));
    }
}
