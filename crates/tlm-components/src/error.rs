//! Error types for component operations.

use thiserror::Error;
use tlm_core::TlmError;
use tlm_graph::GraphError;
use tlm_numerics::NumericsError;

/// Errors raised while configuring, initializing or stepping a component.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComponentError {
    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },

    #[error("Parameter '{name}' declared twice")]
    DuplicateParameter { name: String },

    #[error("Non-finite value for parameter '{name}': {value}")]
    NonFinite { name: String, value: f64 },

    #[error("Invalid parameter '{name}': {what}")]
    InvalidParameter { name: String, what: &'static str },

    #[error("Component used before initialize: {what}")]
    NotInitialized { what: &'static str },

    #[error("Unknown component type '{type_name}'")]
    UnknownType { type_name: String },

    #[error("Component type '{type_name}' is already registered")]
    DuplicateType { type_name: String },

    #[error("Library '{library}' was built against core {found}, this core is {expected}")]
    IncompatibleLibrary {
        library: String,
        expected: String,
        found: String,
    },

    #[error("Subsystem '{path}': {message}")]
    Subsystem { path: String, message: String },

    #[error("Port error: {0}")]
    Graph(#[from] GraphError),

    #[error("Numerics error: {0}")]
    Numerics(#[from] NumericsError),
}

pub type ComponentResult<T> = Result<T, ComponentError>;

impl From<TlmError> for ComponentError {
    fn from(e: TlmError) -> Self {
        match e {
            TlmError::IncompatibleVersion {
                library,
                expected,
                found,
            } => ComponentError::IncompatibleLibrary {
                library,
                expected,
                found,
            },
            TlmError::NonFinite { what, value } => ComponentError::NonFinite {
                name: what.to_string(),
                value,
            },
            other => ComponentError::Numerics(NumericsError::from(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ComponentError::UnknownParameter {
            name: "Kc".to_string(),
        };
        assert!(err.to_string().contains("Kc"));
    }

    #[test]
    fn error_conversion() {
        let graph: ComponentError = GraphError::NullNode {
            port: "P1".to_string(),
        }
        .into();
        assert!(graph.to_string().contains("P1"));

        let version: ComponentError = TlmError::IncompatibleVersion {
            library: "lib".to_string(),
            expected: "1".to_string(),
            found: "2".to_string(),
        }
        .into();
        assert!(matches!(version, ComponentError::IncompatibleLibrary { .. }));
    }
}
