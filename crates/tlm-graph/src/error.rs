//! Graph-specific error types.

pub type GraphResult<T> = Result<T, GraphError>;

/// Node, port and node-type registry errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A port was asked for its node before being connected.
    NullNode { port: String },

    /// A node of the wrong domain was offered to a port.
    NodeTypeMismatch {
        port: String,
        expected: String,
        found: String,
    },

    /// A single (non-multi) port already has a node.
    AlreadyConnected { port: String },

    /// Two ports with the same name on one component.
    DuplicatePort { port: String },

    /// Indexed port placement collided with an existing port.
    PortIndexOccupied { index: usize, existing: String },

    /// Lookup of a port name that does not exist.
    UnknownPort { port: String },

    /// Node type name not present in the registry.
    UnknownNodeType { node_type: String },

    /// Node type name registered twice.
    DuplicateNodeType { node_type: String },

    /// Data slot id outside the node's data length.
    DataIdOutOfRange { id: usize, len: usize },

    /// Nodes of different types cannot exchange values.
    CopyTypeMismatch { from: String, to: String },

    /// Library built against another core version.
    IncompatibleLibrary {
        library: String,
        expected: String,
        found: String,
    },
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::NullNode { port } => {
                write!(f, "Port '{}' is not connected to a node", port)
            }
            GraphError::NodeTypeMismatch {
                port,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Port '{}' expects node type {} but was given {}",
                    port, expected, found
                )
            }
            GraphError::AlreadyConnected { port } => {
                write!(f, "Port '{}' is already connected", port)
            }
            GraphError::DuplicatePort { port } => {
                write!(f, "Port '{}' is declared twice", port)
            }
            GraphError::PortIndexOccupied { index, existing } => {
                write!(f, "Port index {} is already taken by '{}'", index, existing)
            }
            GraphError::UnknownPort { port } => write!(f, "No port named '{}'", port),
            GraphError::UnknownNodeType { node_type } => {
                write!(f, "Node type {} is not registered", node_type)
            }
            GraphError::DuplicateNodeType { node_type } => {
                write!(f, "Node type {} is already registered", node_type)
            }
            GraphError::DataIdOutOfRange { id, len } => {
                write!(f, "Node data id {} out of range (data length {})", id, len)
            }
            GraphError::CopyTypeMismatch { from, to } => {
                write!(f, "Cannot copy node values from {} to {}", from, to)
            }
            GraphError::IncompatibleLibrary {
                library,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Library '{}' was built against core {}, this core is {}",
                    library, found, expected
                )
            }
        }
    }
}

impl std::error::Error for GraphError {}
