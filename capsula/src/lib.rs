#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
//! [capsula](crate) simulates colonies of rod-shaped bacteria.
//! Every bacterium is a capsule, a line segment with hemispherical caps, which grows along its
//! axis and divides once it exceeds its division length.
//! Growth continuously creates overlaps which are relaxed away by soft repulsive forces in the
//! overdamped regime.
//!
//! - [concepts] contains the error types and traits shared by all crates.
//! - [building_blocks] provides the [Capsule](building_blocks::Capsule) with its force laws, the
//!   domain with solid and open faces and the spatial grid.
//! - [core] assembles forces, relaxes populations and drives the lifecycle.
//!
//! ```
//! use capsula::prelude::*;
//! let mut setup = SimulationSetup::default();
//! setup.n_initial = 2;
//! let mut simulation = Simulation::new(&setup)?;
//! let report = simulation.tick()?;
//! assert_eq!(report.tick, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use capsula_building_blocks as building_blocks;

pub use capsula_concepts as concepts;

pub use capsula_core as core;

/// Re-exports the default simulation types and traits.
pub mod prelude;
