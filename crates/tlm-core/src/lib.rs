//! tlm-core: stable foundation for the TLM simulation engine.
//!
//! Contains:
//! - units (uom SI types + constructors for the physical domains)
//! - numeric (Real + tolerances + limiter/square-root helpers used by components)
//! - clock (shared simulation time read by delays and filters)
//! - message (severity-tagged bounded message queue owned by a session)
//! - error (shared error types)

pub mod clock;
pub mod error;
pub mod message;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use clock::SimClock;
pub use error::{TlmError, TlmResult};
pub use message::{CoreMessage, MessageHandler, Severity, SeverityCounts};
pub use numeric::*;
pub use units::*;

/// Version string that component and node libraries are checked against
/// when they are registered.
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");
