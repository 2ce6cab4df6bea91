#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
//! # capsula - Building Blocks
//!
//! The physical ingredients of the capsule model.
//! A [Capsule] is a line segment with hemispherical caps which grows along its axis and divides
//! once it exceeds its division length.
//! Capsules are confined by a [CapsuleDomain] whose faces are either solid or open and are
//! bucketed by a [SpatialGrid] such that neighbor forces only need to be evaluated for nearby
//! pairs.
//!
//! ```
//! # use capsula_building_blocks::*;
//! use nalgebra::Vector3;
//! let parameters = CapsuleParameters::default();
//! let capsule = Capsule::new(
//!     CapsuleId(0),
//!     [Vector3::new(1.0, 1.0, 0.5), Vector3::new(3.25, 1.0, 0.5)],
//!     parameters,
//! )?;
//! assert_eq!(capsule.radius(), 0.5);
//! assert!((capsule.extent() - 2.25).abs() < 1e-12);
//! # Ok::<(), capsula_concepts::SetupError>(())
//! ```

mod capsule;
mod domain;
mod geometry;
mod grid;

pub use capsule::*;
pub use domain::*;
pub use geometry::*;
pub use grid::*;

/// Handy re-exports of every building block.
pub mod prelude {
    pub use crate::capsule::*;
    pub use crate::domain::*;
    pub use crate::geometry::*;
    pub use crate::grid::*;
}
