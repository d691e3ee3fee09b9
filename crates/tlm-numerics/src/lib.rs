//! tlm-numerics: per-component numeric building blocks.
//!
//! Components own these helpers and drive them once per simulation tick:
//! - [`Delay`]: fixed-capacity history with fractional-step interpolation
//! - [`FirstOrderTransferFunction`], [`SecondOrderTransferFunction`]:
//!   bilinear (Tustin) discretized filters with output limits
//! - [`Integrator`]: trapezoidal integration with limits
//! - [`TurbulentFlowFunction`], [`ValveHysteresis`]: valve/orifice helpers
//! - [`EquationSystemSolver`]: small dense Newton steps for components with
//!   local implicit equations
//!
//! Tick-aware helpers take a [`tlm_core::SimClock`] at initialization and
//! refuse to update before that.

pub mod delay;
pub mod equation_solver;
pub mod error;
pub mod flow;
pub mod integrator;
pub mod transfer_function;

pub use delay::Delay;
pub use equation_solver::{EquationSystemSolver, NewtonConfig, NewtonResult, newton_solve};
pub use error::{NumericsError, NumericsResult};
pub use flow::{TurbulentFlowFunction, ValveHysteresis};
pub use integrator::Integrator;
pub use transfer_function::{
    FirstOrderTransferFunction, SecondOrderFilter, SecondOrderTransferFunction,
};
