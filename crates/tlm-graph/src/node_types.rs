//! Built-in node types and their stable slot layouts.
//!
//! Slot ids are part of the result-export contract: consumers look columns
//! up by id, so reordering them is a breaking change.

use crate::node::{Node, TlmFixup, VariableCategory};

pub const HYDRAULIC: &str = "NodeHydraulic";
pub const MECHANIC: &str = "NodeMechanic";
pub const ELECTRIC: &str = "NodeElectric";
pub const SIGNAL: &str = "NodeSignal";

pub mod hydraulic {
    pub const FLOW: usize = 0;
    pub const PRESSURE: usize = 1;
    pub const TEMPERATURE: usize = 2;
    pub const WAVE_VARIABLE: usize = 3;
    pub const CHAR_IMPEDANCE: usize = 4;
    pub const HEAT_FLOW: usize = 5;
    pub const DATA_LENGTH: usize = 6;
}

pub mod mechanic {
    pub const VELOCITY: usize = 0;
    pub const FORCE: usize = 1;
    pub const POSITION: usize = 2;
    pub const WAVE_VARIABLE: usize = 3;
    pub const CHAR_IMPEDANCE: usize = 4;
    pub const EQ_MASS: usize = 5;
    pub const DATA_LENGTH: usize = 6;
}

pub mod electric {
    pub const VOLTAGE: usize = 0;
    pub const CURRENT: usize = 1;
    pub const WAVE_VARIABLE: usize = 2;
    pub const CHAR_IMPEDANCE: usize = 3;
    pub const DATA_LENGTH: usize = 4;
}

pub mod signal {
    pub const VALUE: usize = 0;
    pub const DATA_LENGTH: usize = 1;
}

/// One slot of a node template.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotSpec {
    pub name: String,
    pub short_name: String,
    pub unit: String,
    pub category: VariableCategory,
    pub default: f64,
}

impl SlotSpec {
    pub fn new(
        name: &str,
        short_name: &str,
        unit: &str,
        category: VariableCategory,
        default: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            short_name: short_name.to_string(),
            unit: unit.to_string(),
            category,
            default,
        }
    }
}

/// Recipe for nodes of one type.
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    pub type_name: String,
    pub nice_name: String,
    pub slots: Vec<SlotSpec>,
    pub fixup: Option<TlmFixup>,
}

impl NodeTemplate {
    pub fn new(type_name: &str, nice_name: &str, slots: Vec<SlotSpec>) -> Self {
        Self {
            type_name: type_name.to_string(),
            nice_name: nice_name.to_string(),
            slots,
            fixup: None,
        }
    }

    pub fn with_fixup(mut self, fixup: TlmFixup) -> Self {
        self.fixup = Some(fixup);
        self
    }

    /// A fresh node with described slots set to their defaults.
    pub fn instantiate(&self) -> Node {
        let mut node = Node::new(self.type_name.as_str(), self.slots.len());
        for (id, slot) in self.slots.iter().enumerate() {
            // ids come from enumerate, always in range
            let _ = node.set_data_characteristics(
                id,
                slot.name.as_str(),
                slot.short_name.as_str(),
                slot.unit.as_str(),
                slot.category,
            );
            node.set_data_value(id, slot.default);
        }
        if let Some(fixup) = self.fixup {
            node.set_tlm_fixup(fixup);
        }
        node
    }
}

fn hydraulic_fixup(_src: &Node, dst: &Node) {
    dst.set_data_value(
        hydraulic::WAVE_VARIABLE,
        dst.data_value(hydraulic::PRESSURE),
    );
}

fn mechanic_fixup(_src: &Node, dst: &Node) {
    dst.set_data_value(mechanic::WAVE_VARIABLE, dst.data_value(mechanic::FORCE));
}

fn electric_fixup(_src: &Node, dst: &Node) {
    dst.set_data_value(electric::WAVE_VARIABLE, dst.data_value(electric::VOLTAGE));
}

pub fn hydraulic_template() -> NodeTemplate {
    use VariableCategory::*;
    NodeTemplate::new(
        HYDRAULIC,
        "Hydraulic",
        vec![
            SlotSpec::new("Flow", "q", "m^3/s", Flow, 0.0),
            SlotSpec::new("Pressure", "p", "Pa", Intensity, 1e5),
            SlotSpec::new("Temperature", "T", "K", Default, 293.0),
            SlotSpec::new("WaveVariable", "c", "Pa", Tlm, 1e5),
            SlotSpec::new("CharImpedance", "Zc", "Pa s/m^3", Tlm, 0.0),
            SlotSpec::new("HeatFlow", "Qdot", "W", Hidden, 0.0),
        ],
    )
    .with_fixup(hydraulic_fixup)
}

pub fn mechanic_template() -> NodeTemplate {
    use VariableCategory::*;
    NodeTemplate::new(
        MECHANIC,
        "Mechanic",
        vec![
            SlotSpec::new("Velocity", "v", "m/s", Flow, 0.0),
            SlotSpec::new("Force", "f", "N", Intensity, 0.0),
            SlotSpec::new("Position", "x", "m", Default, 0.0),
            SlotSpec::new("WaveVariable", "c", "N", Tlm, 0.0),
            SlotSpec::new("CharImpedance", "Zc", "N s/m", Tlm, 0.0),
            SlotSpec::new("EquivalentMass", "me", "kg", Hidden, 1.0),
        ],
    )
    .with_fixup(mechanic_fixup)
}

pub fn electric_template() -> NodeTemplate {
    use VariableCategory::*;
    NodeTemplate::new(
        ELECTRIC,
        "Electric",
        vec![
            SlotSpec::new("Voltage", "U", "V", Intensity, 0.0),
            SlotSpec::new("Current", "i", "A", Flow, 0.0),
            SlotSpec::new("WaveVariable", "c", "V", Tlm, 0.0),
            SlotSpec::new("CharImpedance", "Zc", "V/A", Tlm, 0.0),
        ],
    )
    .with_fixup(electric_fixup)
}

pub fn signal_template() -> NodeTemplate {
    NodeTemplate::new(
        SIGNAL,
        "Signal",
        vec![SlotSpec::new("Value", "y", "", VariableCategory::Default, 0.0)],
    )
}

/// The four built-in node types.
pub fn builtin_templates() -> Vec<NodeTemplate> {
    vec![
        hydraulic_template(),
        mechanic_template(),
        electric_template(),
        signal_template(),
    ]
}
