//! Runtime registry of component types and the libraries that provide them.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tlm_core::error::check_core_version;
use tlm_graph::NodeTemplate;

use crate::electric::{ElectricResistor, ElectricVoltageSource};
use crate::error::{ComponentError, ComponentResult};
use crate::line::HydraulicTlmLosslessLine;
use crate::mechanic::{MechanicForceSource, MechanicTranslationalMass, MechanicTranslationalSpring};
use crate::orifice::{HydraulicLaminarOrifice, HydraulicTurbulentOrifice};
use crate::pump::HydraulicFixedDisplacementPump;
use crate::signal::{SignalConstant, SignalGain, SignalSecondOrderFilter, SignalStep};
use crate::sources::{HydraulicFlowSource, HydraulicPressureSource};
use crate::traits::Component;
use crate::valve::HydraulicPressureReliefValve;
use crate::volume::HydraulicVolume;

/// Builds a boxed component with the given instance name.
pub type ComponentCreator = fn(&str) -> ComponentResult<Box<dyn Component>>;

/// A bundle of component (and optionally node) types loaded as a unit.
pub trait ComponentLibrary {
    fn name(&self) -> &str;

    /// Core version the library was built against. Loading fails unless it
    /// equals [`tlm_core::CORE_VERSION`].
    fn core_version(&self) -> &str {
        tlm_core::CORE_VERSION
    }

    /// `(type name, creator)` pairs.
    fn components(&self) -> Vec<(&'static str, ComponentCreator)>;

    /// Extra node types the components need.
    fn node_types(&self) -> Vec<NodeTemplate> {
        Vec::new()
    }
}

/// Every component shipped with this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardLibrary;

impl StandardLibrary {
    pub const NAME: &'static str = "standard";
}

/// Wrap a `fn(&str) -> ComponentResult<T>` constructor as a [`ComponentCreator`].
macro_rules! creator {
    ($ctor:path) => {{
        fn create(name: &str) -> ComponentResult<Box<dyn Component>> {
            Ok(Box::new($ctor(name)?))
        }
        create as ComponentCreator
    }};
}

impl ComponentLibrary for StandardLibrary {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn components(&self) -> Vec<(&'static str, ComponentCreator)> {
        vec![
            (HydraulicVolume::TYPE_NAME, creator!(HydraulicVolume::new)),
            (HydraulicPressureSource::TYPE_NAME, creator!(HydraulicPressureSource::new)),
            (HydraulicPressureSource::TANK_TYPE_NAME, creator!(HydraulicPressureSource::tank)),
            (HydraulicFlowSource::TYPE_NAME, creator!(HydraulicFlowSource::new)),
            (HydraulicTlmLosslessLine::TYPE_NAME, creator!(HydraulicTlmLosslessLine::new)),
            (HydraulicLaminarOrifice::TYPE_NAME, creator!(HydraulicLaminarOrifice::new)),
            (HydraulicTurbulentOrifice::TYPE_NAME, creator!(HydraulicTurbulentOrifice::new)),
            (HydraulicPressureReliefValve::TYPE_NAME, creator!(HydraulicPressureReliefValve::new)),
            (HydraulicFixedDisplacementPump::TYPE_NAME, creator!(HydraulicFixedDisplacementPump::new)),
            (MechanicTranslationalMass::TYPE_NAME, creator!(MechanicTranslationalMass::new)),
            (MechanicTranslationalSpring::TYPE_NAME, creator!(MechanicTranslationalSpring::new)),
            (MechanicForceSource::TYPE_NAME, creator!(MechanicForceSource::new)),
            (ElectricVoltageSource::TYPE_NAME, creator!(ElectricVoltageSource::new)),
            (ElectricResistor::TYPE_NAME, creator!(ElectricResistor::new)),
            (SignalConstant::TYPE_NAME, creator!(SignalConstant::new)),
            (SignalStep::TYPE_NAME, creator!(SignalStep::new)),
            (SignalGain::TYPE_NAME, creator!(SignalGain::new)),
            (SignalSecondOrderFilter::TYPE_NAME, creator!(SignalSecondOrderFilter::new)),
        ]
    }
}

struct Entry {
    creator: ComponentCreator,
    library: String,
}

/// Registry mapping component type names to creators.
#[derive(Default)]
pub struct ComponentFactory {
    entries: RwLock<HashMap<String, Entry>>,
}

impl std::fmt::Debug for ComponentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentFactory")
            .field("types", &self.type_names())
            .finish()
    }
}

impl ComponentFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with [`StandardLibrary`] already loaded.
    pub fn with_standard() -> ComponentResult<Self> {
        let factory = Self::new();
        factory.load_library(&StandardLibrary)?;
        Ok(factory)
    }

    pub fn register(
        &self,
        library: &str,
        type_name: &str,
        creator: ComponentCreator,
    ) -> ComponentResult<()> {
        let mut entries = self.write();
        if entries.contains_key(type_name) {
            return Err(ComponentError::DuplicateType {
                type_name: type_name.to_string(),
            });
        }
        entries.insert(
            type_name.to_string(),
            Entry {
                creator,
                library: library.to_string(),
            },
        );
        tracing::debug!(type_name, library, "registered component type");
        Ok(())
    }

    /// Register every component type of `library`, or none of them.
    ///
    /// # Returns
    /// The number of types added. A version mismatch or a name clash leaves
    /// the registry untouched.
    pub fn load_library(&self, library: &dyn ComponentLibrary) -> ComponentResult<usize> {
        let name = library.name();
        check_core_version(name, library.core_version())?;

        let components = library.components();
        let mut entries = self.write();
        for (i, (type_name, _)) in components.iter().enumerate() {
            let clash = entries.contains_key(*type_name)
                || components[..i].iter().any(|(other, _)| other == type_name);
            if clash {
                return Err(ComponentError::DuplicateType {
                    type_name: type_name.to_string(),
                });
            }
        }
        for (type_name, creator) in &components {
            entries.insert(
                type_name.to_string(),
                Entry {
                    creator: *creator,
                    library: name.to_string(),
                },
            );
        }
        tracing::info!(library = name, count = components.len(), "loaded component library");
        Ok(components.len())
    }

    pub fn unregister(&self, type_name: &str) -> ComponentResult<()> {
        self.write()
            .remove(type_name)
            .map(|_| ())
            .ok_or_else(|| ComponentError::UnknownType {
                type_name: type_name.to_string(),
            })
    }

    /// Drop every type registered by `library`; returns how many went.
    pub fn unregister_library(&self, library: &str) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, e| e.library != library);
        before - entries.len()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.read().contains_key(type_name)
    }

    /// Build a new instance of `type_name` named `name`.
    pub fn create(&self, type_name: &str, name: &str) -> ComponentResult<Box<dyn Component>> {
        let creator = self
            .read()
            .get(type_name)
            .map(|e| e.creator)
            .ok_or_else(|| ComponentError::UnknownType {
                type_name: type_name.to_string(),
            })?;
        creator(name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
