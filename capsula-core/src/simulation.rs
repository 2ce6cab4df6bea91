//! A population inside its domain which is advanced one external tick at a time.
use capsula_building_blocks::{Capsule, CapsuleDomain, CapsuleId, Face};
use capsula_concepts::SetupError;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::assembly::ForceAssembler;
use crate::config::{check_cell_width, SimulationSetup};
use crate::errors::SimulationError;
use crate::lifecycle::{grow_and_divide, remove_exited};
use crate::population::Population;
use crate::solvers::{RelaxationReport, RelaxationSolver};

/// Summary of one external tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Number of completed ticks including this one
    pub tick: u64,
    /// Simulation time after this tick
    pub time: f64,
    /// Identifiers of parents and their division products
    pub divisions: Vec<(CapsuleId, CapsuleId)>,
    /// Capsules which left the domain together with the face they left through
    pub removed: Vec<(CapsuleId, Face)>,
    /// Result of the relaxation call
    pub relaxation: RelaxationReport,
    /// Size of the population at the end of the tick
    pub n_capsules: usize,
}

/// Owns the population, the domain, the solver and the random number generator.
///
/// The loop over ticks is left to the caller.
/// ```
/// # use capsula_core::config::SimulationSetup;
/// # use capsula_core::simulation::Simulation;
/// let mut setup = SimulationSetup::default();
/// setup.n_initial = 4;
/// let mut simulation = Simulation::new(&setup)?;
/// for _ in 0..10 {
///     let report = simulation.tick()?;
///     assert_eq!(report.n_capsules, simulation.capsules().len());
/// }
/// assert_eq!(simulation.n_ticks(), 10);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Simulation {
    population: Population,
    domain: CapsuleDomain,
    solver: RelaxationSolver,
    dt: f64,
    rng: rand_chacha::ChaCha8Rng,
    n_ticks: u64,
}

impl Simulation {
    /// Validates the setup and places [n_initial](SimulationSetup::n_initial) capsules randomly.
    pub fn new(setup: &SimulationSetup) -> Result<Self, SetupError> {
        setup.validate()?;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(setup.settings.rng_seed);
        let domain = setup.domain.build_domain()?;
        let mut population = Population::new();
        population.place_random(setup.n_initial, &domain, setup.capsule, &mut rng)?;
        Self::from_parts(setup, domain, population, rng)
    }

    /// Validates the setup and uses the given population instead of placing capsules randomly.
    pub fn with_population(
        setup: &SimulationSetup,
        population: Population,
    ) -> Result<Self, SetupError> {
        setup.validate()?;
        let rng = rand_chacha::ChaCha8Rng::seed_from_u64(setup.settings.rng_seed);
        let domain = setup.domain.build_domain()?;
        Self::from_parts(setup, domain, population, rng)
    }

    fn from_parts(
        setup: &SimulationSetup,
        domain: CapsuleDomain,
        population: Population,
        rng: rand_chacha::ChaCha8Rng,
    ) -> Result<Self, SetupError> {
        let grid = setup.domain.build_grid(&domain)?;
        for capsule in population.capsules() {
            check_cell_width(&grid, capsule.parameters())?;
        }
        let assembler = ForceAssembler::new(
            grid,
            setup.settings.contact_distribution,
            setup.settings.parallel,
        );
        let solver = RelaxationSolver::new(setup.settings.strategy, setup.settings.dt, assembler);
        Ok(Simulation {
            population,
            domain,
            solver,
            dt: setup.settings.dt,
            rng,
            n_ticks: 0,
        })
    }

    /// Performs one external tick: growth and division, relaxation and removal of capsules
    /// which left through an open face.
    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    pub fn tick(&mut self) -> Result<TickReport, SimulationError> {
        let divisions = grow_and_divide(&mut self.population, self.dt, &mut self.rng)?;
        let relaxation = self.relax()?;
        let removed = remove_exited(&mut self.population, &self.domain);
        self.n_ticks += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            tick = self.n_ticks,
            n_capsules = self.population.len(),
            divisions = divisions.len(),
            removed = removed.len(),
            "tick finished"
        );
        Ok(TickReport {
            tick: self.n_ticks,
            time: self.time(),
            divisions,
            removed,
            relaxation,
            n_capsules: self.population.len(),
        })
    }

    /// Performs a single relaxation call without growth, division or removal.
    pub fn relax(&mut self) -> Result<RelaxationReport, SimulationError> {
        let n_capsules = self.population.len();
        self.solver
            .relax(self.population.capsules_mut(), &self.domain)
            .map_err(|error| SimulationError::Integrator {
                tick: self.n_ticks,
                n_capsules,
                error,
            })
    }

    /// The current population
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// All capsules of the current population
    pub fn capsules(&self) -> &[Capsule] {
        self.population.capsules()
    }

    /// The simulation domain
    pub fn domain(&self) -> &CapsuleDomain {
        &self.domain
    }

    /// The relaxation solver
    pub fn solver(&self) -> &RelaxationSolver {
        &self.solver
    }

    /// Number of completed ticks
    pub fn n_ticks(&self) -> u64 {
        self.n_ticks
    }

    /// Simulation time which has passed
    pub fn time(&self) -> f64 {
        self.n_ticks as f64 * self.dt
    }
}
