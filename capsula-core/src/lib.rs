#![deny(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
//! This crate drives populations of [capsules](capsula_building_blocks::Capsule) through time.
//!
//! ## Tick
//! Every external tick of a [Simulation](simulation::Simulation) performs the following steps:
//! 1. The [lifecycle] grows every capsule and divides those which exceeded their division
//!    length.
//! 2. The [RelaxationSolver](solvers::RelaxationSolver) applies flows, rebuilds the
//!    [SpatialGrid](capsula_building_blocks::SpatialGrid) and resolves overlaps either by
//!    iterating explicit steps or by handing the packed state to an
//!    [Integrator](solvers::Integrator).
//! 3. Capsules which left the domain through an open face are removed.
//!
//! The population cannot change its size while a relaxation call is in progress since the
//! solver only ever receives a mutable slice of capsules.
//!
//! ## Exporting
//! The [CsvExporter](storage::CsvExporter) writes one delimited text file per logged tick.
//! Looping over ticks, deciding when to save and displaying progress is left to the caller,
//! which may use [FixedStepsize](time::FixedStepsize) for this purpose.

pub mod assembly;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod population;
pub mod simulation;
pub mod solvers;
pub mod storage;
pub mod time;

#[doc(hidden)]
pub use rayon;

#[cfg(feature = "tracing")]
#[doc(hidden)]
pub use tracing;
