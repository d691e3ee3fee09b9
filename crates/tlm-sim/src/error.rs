//! Error types for building and running component systems.

use thiserror::Error;
use tlm_components::ComponentError;
use tlm_core::TlmError;
use tlm_graph::GraphError;

/// Errors raised while configuring, initializing or stepping a system.
///
/// An externally cancelled run is not an error; it ends with
/// [`crate::RunOutcome::Aborted`].
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Unknown component '{name}'")]
    UnknownComponent { name: String },

    #[error("Component name '{name}' is already used")]
    DuplicateName { name: String },

    #[error("Unknown port '{component}.{port}'")]
    UnknownPort { component: String, port: String },

    #[error("Unknown variable '{variable}' on '{component}.{port}'")]
    UnknownVariable {
        component: String,
        port: String,
        variable: String,
    },

    #[error("Cannot connect '{from}' to '{to}': {what}")]
    InvalidConnection {
        from: String,
        to: String,
        what: String,
    },

    #[error("Cannot connect '{from}' ({from_type}) to '{to}' ({to_type})")]
    TypeMismatch {
        from: String,
        to: String,
        from_type: String,
        to_type: String,
    },

    #[error("'{from}' and '{to}' are not connected")]
    NotConnected { from: String, to: String },

    #[error("Required port '{component}.{port}' is not connected")]
    UnconnectedPort { component: String, port: String },

    #[error("Timestep {child} of '{component}' is not an integer fraction of {parent}")]
    TimestepMismatch {
        component: String,
        child: f64,
        parent: f64,
    },

    #[error("Invalid state: {what}")]
    InvalidState { what: &'static str },

    #[error("Component '{component}' failed: {source}")]
    ComponentFailed {
        component: String,
        #[source]
        source: ComponentError,
    },

    #[error("Invalid network description: {what}")]
    Description { what: String },

    #[error("Thread pool error: {message}")]
    ThreadPool { message: String },

    #[error("Component error: {0}")]
    Component(#[from] ComponentError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SimResult<T> = Result<T, SimError>;

impl From<TlmError> for SimError {
    fn from(e: TlmError) -> Self {
        SimError::Component(ComponentError::from(e))
    }
}

impl SimError {
    /// Configuration problems are found before any step is taken.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SimError::UnknownComponent { .. }
                | SimError::DuplicateName { .. }
                | SimError::UnknownPort { .. }
                | SimError::InvalidConnection { .. }
                | SimError::TypeMismatch { .. }
                | SimError::UnconnectedPort { .. }
                | SimError::TimestepMismatch { .. }
                | SimError::Description { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_names_the_component() {
        let err = SimError::ComponentFailed {
            component: "pump".to_string(),
            source: ComponentError::NotInitialized { what: "ports" },
        };
        let text = err.to_string();
        assert!(text.contains("pump"), "{text}");
        assert!(text.contains("ports"), "{text}");
        assert!(!err.is_config());
    }

    #[test]
    fn graph_errors_convert() {
        let err: SimError = GraphError::UnknownPort {
            port: "P9".to_string(),
        }
        .into();
        assert!(matches!(err, SimError::Graph(_)));
        assert!(
            SimError::UnconnectedPort {
                component: "v".to_string(),
                port: "P1".to_string()
            }
            .is_config()
        );
    }
}
