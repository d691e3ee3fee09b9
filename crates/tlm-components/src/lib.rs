//! tlm-components: the component contract and a standard model library.
//!
//! Provides:
//! - `Component` trait with the C / Q / Signal / System kind split
//! - `ComponentBase` (name, timestep, clock, ports, parameters)
//! - Hydraulic models: volume, sources, tank, lossless line, orifices,
//!   relief valve, fixed displacement pump
//! - Mechanic, electric and signal models
//! - `ComponentFactory` and the `ComponentLibrary` loading contract
//!
//! Every model reads and writes only the nodes bound to its own ports, so
//! all components of one stage can step in any order or in parallel.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tlm_components::{Component, HydraulicLaminarOrifice, HydraulicPressureSource};
//! use tlm_components::common::HydraulicNodeData;
//! use tlm_core::units::pa;
//! use tlm_graph::{NodeFactory, node_types::HYDRAULIC};
//!
//! let nodes = NodeFactory::with_builtin();
//! let high = Arc::new(nodes.create(HYDRAULIC).unwrap());
//! let low = Arc::new(nodes.create(HYDRAULIC).unwrap());
//!
//! let mut supply = HydraulicPressureSource::with_pressure("supply", pa(2e6)).unwrap();
//! let mut drain = HydraulicPressureSource::with_pressure("drain", pa(1e6)).unwrap();
//! let mut orifice = HydraulicLaminarOrifice::with_kc("or", 1e-11).unwrap();
//! supply.port_mut("P1").unwrap().set_node(&high).unwrap();
//! drain.port_mut("P1").unwrap().set_node(&low).unwrap();
//! orifice.port_mut("P1").unwrap().set_node(&high).unwrap();
//! orifice.port_mut("P2").unwrap().set_node(&low).unwrap();
//!
//! supply.initialize().unwrap();
//! drain.initialize().unwrap();
//! orifice.initialize().unwrap();
//!
//! let q = HydraulicNodeData::from_node(low).q();
//! assert!((q - 1e-5).abs() < 1e-18);
//! ```

pub mod base;
pub mod common;
pub mod electric;
pub mod error;
pub mod factory;
pub mod line;
pub mod mechanic;
pub mod orifice;
pub mod parameters;
pub mod pump;
pub mod signal;
pub mod sources;
pub mod traits;
pub mod valve;
pub mod volume;

// Re-exports
pub use base::{ComponentBase, DEFAULT_TIMESTEP};
pub use electric::{ElectricResistor, ElectricVoltageSource};
pub use error::{ComponentError, ComponentResult};
pub use factory::{ComponentCreator, ComponentFactory, ComponentLibrary, StandardLibrary};
pub use line::HydraulicTlmLosslessLine;
pub use mechanic::{MechanicForceSource, MechanicTranslationalMass, MechanicTranslationalSpring};
pub use orifice::{HydraulicLaminarOrifice, HydraulicTurbulentOrifice};
pub use parameters::{Parameter, ParameterSet};
pub use pump::HydraulicFixedDisplacementPump;
pub use signal::{SignalConstant, SignalGain, SignalSecondOrderFilter, SignalStep};
pub use sources::{HydraulicFlowSource, HydraulicPressureSource};
pub use traits::{Component, ComponentKind, Stage, sub_steps};
pub use valve::HydraulicPressureReliefValve;
pub use volume::HydraulicVolume;
