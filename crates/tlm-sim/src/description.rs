//! YAML network descriptions.
//!
//! ```yaml
//! name: orifice_demo
//! timestep: 0.001
//! stop: 1.0
//! components:
//!   - { name: left, type: HydraulicVolume, parameters: { p0: 2.0e6 } }
//!   - { name: right, type: HydraulicVolume }
//!   - { name: or, type: HydraulicLaminarOrifice, parameters: { Kc: 1.0e-11 } }
//! connections:
//!   - left.P1 -> or.P1
//!   - or.P2 -> right.P1
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tlm_components::Stage;

use crate::error::{SimError, SimResult};
use crate::options::SimOptions;

/// A top-level system plus the run it is meant for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescription {
    #[serde(flatten)]
    pub system: SystemSpec,
    #[serde(default)]
    pub start: f64,
    #[serde(default = "default_stop")]
    pub stop: f64,
    #[serde(default)]
    pub options: SimOptions,
}

fn default_stop() -> f64 {
    1.0
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestep: Option<f64>,
    /// Stage a nested system runs in; C when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageRole>,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsystems: Vec<SystemSpec>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Ports exposed to the parent system.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<SystemPortSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestep: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SystemPortSpec {
    pub name: String,
    pub component: String,
    pub port: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    Signal,
    C,
    Q,
}

impl From<StageRole> for Stage {
    fn from(role: StageRole) -> Self {
        match role {
            StageRole::Signal => Stage::Signal,
            StageRole::C => Stage::C,
            StageRole::Q => Stage::Q,
        }
    }
}

/// `component.port`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub component: String,
    pub port: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.port)
    }
}

impl std::str::FromStr for Endpoint {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        let (component, port) = s.trim().rsplit_once('.').ok_or_else(|| SimError::Description {
            what: format!("'{s}' is not of the form component.port"),
        })?;
        if component.is_empty() || port.is_empty() {
            return Err(SimError::Description {
                what: format!("'{s}' is not of the form component.port"),
            });
        }
        Ok(Self {
            component: component.to_string(),
            port: port.to_string(),
        })
    }
}

/// Written `from.port -> to.port`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Connection {
    pub from: Endpoint,
    pub to: Endpoint,
}

impl TryFrom<String> for Connection {
    type Error = SimError;

    fn try_from(s: String) -> SimResult<Self> {
        let (from, to) = s.split_once("->").ok_or_else(|| SimError::Description {
            what: format!("connection '{s}' has no '->'"),
        })?;
        Ok(Self {
            from: from.parse()?,
            to: to.parse()?,
        })
    }
}

impl From<Connection> for String {
    fn from(c: Connection) -> Self {
        format!("{} -> {}", c.from, c.to)
    }
}

impl NetworkDescription {
    pub fn from_yaml_str(text: &str) -> SimResult<Self> {
        let description: Self = serde_yaml::from_str(text)?;
        description.validate()?;
        Ok(description)
    }

    pub fn load(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> SimResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Structural checks that do not need a component registry.
    pub fn validate(&self) -> SimResult<()> {
        if !self.start.is_finite() || !self.stop.is_finite() || self.stop < self.start {
            return Err(SimError::Description {
                what: format!("bad time window {} .. {}", self.start, self.stop),
            });
        }
        self.options.validate()?;
        validate_system(&self.system)
    }
}

fn validate_system(spec: &SystemSpec) -> SimResult<()> {
    let bad = |what: String| Err(SimError::Description {
        what: format!("{}: {}", spec.name, what),
    });

    if spec.name.is_empty() {
        return bad("system name is empty".to_string());
    }
    if let Some(ts) = spec.timestep {
        if !(ts.is_finite() && ts > 0.0) {
            return bad(format!("timestep {ts} must be positive"));
        }
    }

    let mut names = HashSet::new();
    let children = spec
        .components
        .iter()
        .map(|c| c.name.as_str())
        .chain(spec.subsystems.iter().map(|s| s.name.as_str()));
    for name in children {
        if !names.insert(name) {
            return bad(format!("duplicate component name '{name}'"));
        }
    }
    for comp in &spec.components {
        if let Some(ts) = comp.timestep {
            if !(ts.is_finite() && ts > 0.0) {
                return bad(format!("{}: timestep {ts} must be positive", comp.name));
            }
        }
    }
    for conn in &spec.connections {
        for end in [&conn.from, &conn.to] {
            if !names.contains(end.component.as_str()) {
                return bad(format!("connection names unknown component '{}'", end.component));
            }
        }
    }
    for port in &spec.ports {
        if !names.contains(port.component.as_str()) {
            return bad(format!(
                "port '{}' names unknown component '{}'",
                port.name, port.component
            ));
        }
    }
    spec.subsystems.iter().try_for_each(validate_system)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SchedulerStrategy;

    const DEMO: &str = r#"
name: demo
timestep: 0.001
stop: 0.5
options:
  strategy: work_stealing
  threads: 2
components:
  - name: left
    type: HydraulicVolume
    parameters: { p0: 2.0e6 }
  - { name: or, type: HydraulicLaminarOrifice }
subsystems:
  - name: sub
    stage: c
    components:
      - { name: v, type: HydraulicVolume }
    ports:
      - { name: P1, component: v, port: P1 }
connections:
  - left.P1 -> or.P1
  - or.P2 -> sub.P1
"#;

    #[test]
    fn parses_demo_network() {
        let d = NetworkDescription::from_yaml_str(DEMO).unwrap();
        assert_eq!(d.system.name, "demo");
        assert_eq!(d.start, 0.0);
        assert_eq!(d.stop, 0.5);
        assert_eq!(d.options.strategy, SchedulerStrategy::WorkStealing);
        assert!(d.options.log_samples);
        assert_eq!(d.system.components[0].parameters["p0"], 2.0e6);
        assert_eq!(d.system.subsystems[0].stage, Some(StageRole::C));
        assert_eq!(
            d.system.connections[1].to,
            Endpoint {
                component: "sub".to_string(),
                port: "P1".to_string()
            }
        );
    }

    #[test]
    fn yaml_round_trip_keeps_connections() {
        let d = NetworkDescription::from_yaml_str(DEMO).unwrap();
        let text = d.to_yaml_string().unwrap();
        assert!(text.contains("left.P1 -> or.P1"), "{text}");
        assert_eq!(NetworkDescription::from_yaml_str(&text).unwrap(), d);
    }

    #[test]
    fn rejects_malformed_connections() {
        let text = DEMO.replace("left.P1 -> or.P1", "left.P1 => or.P1");
        assert!(NetworkDescription::from_yaml_str(&text).is_err());
        let text = DEMO.replace("left.P1 -> or.P1", "ghost.P1 -> or.P1");
        let err = NetworkDescription::from_yaml_str(&text).unwrap_err();
        assert!(err.to_string().contains("ghost"), "{err}");
    }

    #[test]
    fn rejects_duplicate_names_and_bad_window() {
        let text = DEMO.replace("name: or,", "name: left,");
        assert!(NetworkDescription::from_yaml_str(&text).is_err());
        let text = DEMO.replace("stop: 0.5", "stop: -1.0");
        assert!(NetworkDescription::from_yaml_str(&text).is_err());
    }
}
