//! Parameters which are read once to set up a [Simulation](crate::simulation::Simulation).
//!
//! All settings can be (de)serialized.
//! A complete setup is usually stored as a json file and read with
//! [SimulationSetup::from_json_file].
//!
//! ```
//! # use capsula_core::config::SimulationSetup;
//! let setup = SimulationSetup::default();
//! assert!(setup.validate().is_ok());
//! let json = serde_json::to_string(&setup)?;
//! let read: SimulationSetup = serde_json::from_str(&json)?;
//! assert_eq!(setup, read);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
use std::path::Path;

use capsula_building_blocks::{
    CapsuleDomain, CapsuleParameters, ContactDistribution, Face, FaceKind, Flow, SpatialGrid,
    DEFAULT_MIN_CELL_WIDTH,
};
use capsula_concepts::{SetupError, StorageError};
use serde::{Deserialize, Serialize};

use crate::solvers::RelaxationStrategy;

/// Bounds and faces of the cuboid domain together with the layout of the grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DomainSettings {
    /// Lower corner
    pub min: [f64; 3],
    /// Upper corner
    pub max: [f64; 3],
    /// Faces through which capsules may leave. All other faces are solid.
    pub open_faces: Vec<Face>,
    /// Constant forces acting beyond a face
    pub flows: Vec<Flow>,
    /// Minimal width of a grid cell
    pub min_cell_width: f64,
    /// Also divide the domain into cells along the z-axis
    pub vertical_stratification: bool,
}

impl Default for DomainSettings {
    fn default() -> Self {
        DomainSettings {
            min: [0.0; 3],
            max: [40.0, 40.0, 1.0],
            open_faces: Vec::new(),
            flows: Vec::new(),
            min_cell_width: DEFAULT_MIN_CELL_WIDTH,
            vertical_stratification: false,
        }
    }
}

impl DomainSettings {
    /// Constructs the domain with the configured faces and flows.
    pub fn build_domain(&self) -> Result<CapsuleDomain, SetupError> {
        let mut domain = CapsuleDomain::from_boundaries(self.min, self.max)?;
        for face in self.open_faces.iter() {
            domain = domain.with_face(*face, FaceKind::Open);
        }
        for flow in self.flows.iter() {
            if flow.force.iter().any(|x| !x.is_finite()) {
                return Err(SetupError(format!(
                    "Flow at face {:?} has non-finite force {:?}",
                    flow.face, flow.force
                )));
            }
            domain = domain.with_flow(flow.face, flow.force);
        }
        Ok(domain)
    }

    /// Constructs the grid layout for the given domain.
    pub fn build_grid(&self, domain: &CapsuleDomain) -> Result<SpatialGrid, SetupError> {
        SpatialGrid::new(domain, self.min_cell_width, self.vertical_stratification)
    }
}

/// Numerical settings of the relaxation and the simulation loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Timestep of the external tick
    pub dt: f64,
    /// How overlaps are resolved
    pub strategy: RelaxationStrategy,
    /// How contact forces are shared between endpoints
    pub contact_distribution: ContactDistribution,
    /// Evaluate forces with multiple threads
    pub parallel: bool,
    /// Seed of the random number generator used for placement and division
    pub rng_seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            dt: 0.01,
            strategy: RelaxationStrategy::default(),
            contact_distribution: ContactDistribution::default(),
            parallel: false,
            rng_seed: 0,
        }
    }
}

impl Settings {
    /// Checks the timestep and the relaxation strategy.
    pub fn validate(&self) -> Result<(), SetupError> {
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            return Err(SetupError(format!(
                "Timestep must be positive but is {}",
                self.dt
            )));
        }
        self.strategy.validate()
    }
}

/// Complete description of a simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationSetup {
    /// See [DomainSettings]
    pub domain: DomainSettings,
    /// Parameters of all initially placed capsules
    pub capsule: CapsuleParameters,
    /// See [Settings]
    pub settings: Settings,
    /// Number of capsules which are placed randomly at the start
    pub n_initial: usize,
}

impl Default for SimulationSetup {
    fn default() -> Self {
        SimulationSetup {
            domain: DomainSettings::default(),
            capsule: CapsuleParameters::default(),
            settings: Settings::default(),
            n_initial: 1,
        }
    }
}

/// Checks that capsules with these parameters cannot interact across more than one cell.
pub fn check_cell_width(
    grid: &SpatialGrid,
    parameters: &CapsuleParameters,
) -> Result<(), SetupError> {
    let required = parameters.max_interaction_distance();
    if grid.min_cell_width() < required {
        return Err(SetupError(format!(
            "Grid cell width {} is smaller than the largest interaction distance {required} \
            of capsules",
            grid.min_cell_width()
        )));
    }
    Ok(())
}

impl SimulationSetup {
    /// Checks every part of the setup.
    pub fn validate(&self) -> Result<(), SetupError> {
        self.capsule.validate()?;
        self.settings.validate()?;
        let domain = self.domain.build_domain()?;
        let grid = self.domain.build_grid(&domain)?;
        check_cell_width(&grid, &self.capsule)
    }

    /// Reads a setup from a json file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let file = std::fs::File::open(path.as_ref()).map_err(StorageError::from)?;
        let reader = std::io::BufReader::new(file);
        let setup: SimulationSetup = serde_json::from_reader(reader).map_err(|e| {
            SetupError(format!(
                "Could not parse setup file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        setup.validate()?;
        Ok(setup)
    }

    /// Writes the setup as pretty printed json.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let file = std::fs::File::create(path.as_ref())?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| StorageError(format!("Could not serialize setup: {e}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reject_domain_smaller_than_cell() {
        let mut setup = SimulationSetup::default();
        setup.domain.max = [5.0, 40.0, 1.0];
        assert!(setup.validate().is_err());
    }

    #[test]
    fn reject_cell_narrower_than_interaction() {
        let mut setup = SimulationSetup::default();
        setup.domain.min_cell_width = 4.0;
        setup.domain.max = [4.0, 4.0, 1.0];
        assert!(setup.validate().is_err());
    }

    #[test]
    fn reject_non_positive_constants() {
        let mut setup = SimulationSetup::default();
        setup.capsule.stiffness.wall = 0.0;
        assert!(setup.validate().is_err());

        let mut setup = SimulationSetup::default();
        setup.settings.dt = -0.01;
        assert!(setup.validate().is_err());

        let mut setup = SimulationSetup::default();
        setup.capsule.division_length = 6.0;
        assert!(setup.validate().is_err());
    }

    #[test]
    fn open_faces_and_flows_are_applied() {
        let mut settings = DomainSettings::default();
        settings.open_faces = vec![Face::YMax];
        settings.flows = vec![Flow {
            face: Face::YMax,
            force: [0.0, 1.0, 0.0].into(),
        }];
        let domain = settings.build_domain().unwrap();
        assert_eq!(domain.face_kind(Face::YMax), FaceKind::Open);
        assert_eq!(domain.face_kind(Face::YMin), FaceKind::Solid);
        assert_eq!(domain.flows().len(), 1);
    }

    #[test]
    fn json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.json");
        let mut setup = SimulationSetup::default();
        setup.n_initial = 12;
        setup.to_json_file(&path).unwrap();
        let read = SimulationSetup::from_json_file(&path).unwrap();
        assert_eq!(setup, read);
        assert!(SimulationSetup::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
