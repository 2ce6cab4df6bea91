use approx::assert_abs_diff_eq;
use capsula::prelude::*;

/// One capsule beyond the open upper y face and an overlapping pair well inside the domain
fn drifting_capsule() -> Result<Simulation, SetupError> {
    let mut setup = SimulationSetup::default();
    setup.domain.max = [20.0, 20.0, 1.0];
    setup.domain.open_faces = vec![Face::YMax];
    setup.domain.flows = vec![Flow {
        face: Face::YMax,
        force: [0.0, 2.0, 0.0].into(),
    }];
    let parameters = CapsuleParameters::default();
    let mut population = Population::new();
    population.spawn([[5.0, 20.5, 0.5].into(), [7.25, 20.5, 0.5].into()], parameters)?;
    population.spawn([[5.0, 5.0, 0.5].into(), [7.25, 5.0, 0.5].into()], parameters)?;
    population.spawn([[6.0, 5.6, 0.5].into(), [8.25, 5.6, 0.5].into()], parameters)?;
    Simulation::with_population(&setup, population)
}

#[test]
fn flow_is_applied_once_per_relaxation() -> Result<(), Box<dyn std::error::Error>> {
    let mut simulation = drifting_capsule()?;
    let dt = SimulationSetup::default().settings.dt;
    let report = simulation.relax()?;
    // The overlapping pair needs more than a single iteration
    assert!(report.steps > 1);
    let [p1, p2] = *simulation.capsules()[0].endpoints();
    assert_abs_diff_eq!(p1.y, 20.5 + 2.0 * dt, epsilon = 1e-12);
    assert_abs_diff_eq!(p2.y, 20.5 + 2.0 * dt, epsilon = 1e-12);
    assert_abs_diff_eq!(p1.x, 5.0, epsilon = 1e-12);
    assert_abs_diff_eq!(p2.x, 7.25, epsilon = 1e-12);
    Ok(())
}

#[test]
fn flow_pushes_capsule_out_of_domain() -> Result<(), Box<dyn std::error::Error>> {
    let mut simulation = drifting_capsule()?;
    simulation.relax()?;
    let report = simulation.tick()?;
    assert_eq!(report.removed, vec![(CapsuleId(0), Face::YMax)]);
    assert_eq!(report.n_capsules, 2);
    assert!(simulation
        .capsules()
        .iter()
        .all(|capsule| capsule.id() != CapsuleId(0)));
    Ok(())
}
