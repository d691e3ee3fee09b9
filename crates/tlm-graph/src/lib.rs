//! tlm-graph: nodes and ports of the TLM network.
//!
//! Provides:
//! - Node: typed bundle of shared scalar values with an optional log
//! - Built-in node types with stable slot layouts (hydraulic, mechanic,
//!   electric, signal) and a runtime NodeFactory
//! - Port / PortTable: typed, non-owning attachment points of a component
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tlm_graph::{NodeFactory, Port, node_types::{self, hydraulic}};
//!
//! let factory = NodeFactory::with_builtin();
//! let node = Arc::new(factory.create(node_types::HYDRAULIC).unwrap());
//!
//! let mut port = Port::new("P1", node_types::HYDRAULIC);
//! port.set_node(&node).unwrap();
//! port.node().unwrap().set_data_value(hydraulic::PRESSURE, 2e5);
//!
//! assert_eq!(node.data_value(hydraulic::PRESSURE), 2e5);
//! ```

pub mod error;
pub mod factory;
pub mod node;
pub mod node_types;
pub mod port;

// Re-exports for ergonomics
pub use error::{GraphError, GraphResult};
pub use factory::NodeFactory;
pub use node::{DataDescription, LogAllocation, Node, TlmFixup, VariableCategory};
pub use node_types::{NodeTemplate, SlotSpec};
pub use port::{Port, PortKind, PortRef, PortRequirement, PortTable};
