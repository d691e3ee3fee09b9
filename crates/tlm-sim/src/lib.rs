//! tlm-sim: component systems and the schedulers that step them.
//!
//! Provides:
//! - ComponentSystem: owns components and nodes, checks and initializes the
//!   model, logs node values and nests inside other systems
//! - Serial, static partition, work stealing and task pool schedulers, all
//!   running the signal, C and Q stages in lock step
//! - Session: shared component/node registries with library loading
//! - YAML network descriptions
//!
//! # Example
//!
//! ```
//! use tlm_sim::{RunOutcome, Session};
//!
//! let session = Session::new().unwrap();
//! let mut sys = session.create_system("demo");
//! sys.add_component(session.create_component("HydraulicVolume", "a").unwrap()).unwrap();
//! sys.add_component(session.create_component("HydraulicVolume", "b").unwrap()).unwrap();
//! sys.add_component(session.create_component("HydraulicLaminarOrifice", "or").unwrap()).unwrap();
//! sys.connect("a", "P1", "or", "P1").unwrap();
//! sys.connect("or", "P2", "b", "P1").unwrap();
//!
//! assert_eq!(sys.simulate(0.0, 0.1).unwrap(), RunOutcome::Completed);
//! assert_eq!(sys.time_vector().len(), 100);
//! ```

pub mod barrier;
pub mod description;
pub mod error;
pub mod options;
pub mod session;
pub mod system;

mod scheduler;

pub use barrier::{CancelToken, RunControl, StageBarrier};
pub use description::{
    ComponentSpec, Connection, Endpoint, NetworkDescription, StageRole, SystemPortSpec, SystemSpec,
};
pub use error::{SimError, SimResult};
pub use options::{SchedulerStrategy, SimOptions};
pub use session::Session;
pub use system::{ComponentSystem, RunOutcome, SYSTEM_TYPE_NAME, SystemState};
