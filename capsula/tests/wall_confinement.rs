use capsula::prelude::*;

const EPSILON: f64 = 1e-3;

fn penetrating_simulation(strategy: RelaxationStrategy) -> Result<Simulation, SetupError> {
    let mut setup = SimulationSetup::default();
    setup.domain.max = [20.0, 20.0, 1.0];
    setup.settings.strategy = strategy;
    let mut population = Population::new();
    // First endpoint is 0.3 away from the lower x face
    population.spawn(
        [[0.3, 10.0, 0.5].into(), [2.55, 10.0, 0.5].into()],
        CapsuleParameters::default(),
    )?;
    Simulation::with_population(&setup, population)
}

#[test]
fn force_points_away_from_wall() -> Result<(), SetupError> {
    let simulation = penetrating_simulation(RelaxationStrategy::default())?;
    let capsule = &simulation.capsules()[0];
    let [f1, f2] = capsule.calculate_wall_force(simulation.domain());
    assert!(f1.x > 0.0);
    assert_eq!(f1.y, 0.0);
    assert_eq!(f1.z, 0.0);
    assert_eq!(f2.norm(), 0.0);
    Ok(())
}

#[test]
fn converges_to_one_radius() -> Result<(), Box<dyn std::error::Error>> {
    let mut simulation =
        penetrating_simulation(RelaxationStrategy::integrator(IntegratorKind::RungeKutta4))?;
    let radius = simulation.capsules()[0].radius();
    let mut distance = 0.3;
    for n in 0..200 {
        simulation.relax()?;
        distance = simulation.capsules()[0].endpoints()[0].x;
        assert!(distance <= radius + EPSILON);
        if n >= 150 {
            assert!(distance >= radius - EPSILON);
        }
    }
    assert!((distance - radius).abs() < EPSILON);
    Ok(())
}

#[test]
fn open_face_does_not_confine() -> Result<(), Box<dyn std::error::Error>> {
    let mut setup = SimulationSetup::default();
    setup.domain.open_faces = vec![Face::XMin];
    let mut population = Population::new();
    population.spawn(
        [[0.3, 10.0, 0.5].into(), [2.55, 10.0, 0.5].into()],
        CapsuleParameters::default(),
    )?;
    let mut simulation = Simulation::with_population(&setup, population)?;
    simulation.relax()?;
    assert_eq!(simulation.capsules()[0].endpoints()[0].x, 0.3);
    Ok(())
}
