pub use capsula_building_blocks::*;
pub use capsula_concepts::*;

pub use capsula_core::assembly::*;
pub use capsula_core::config::*;
pub use capsula_core::errors::*;
pub use capsula_core::lifecycle::*;
pub use capsula_core::population::*;
pub use capsula_core::simulation::*;
pub use capsula_core::solvers::*;
pub use capsula_core::storage::*;
pub use capsula_core::time::*;
