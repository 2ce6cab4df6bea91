use approx::assert_abs_diff_eq;
use capsula::prelude::*;
use nalgebra::Vector3;
use rand::{Rng, SeedableRng};

/// All pairs which actually interact, each given by its ordered indices
fn interacting(capsules: &[Capsule], pairs: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut interacting: Vec<_> =
        evaluate_pairs(capsules, pairs, ContactDistribution::default(), false)
            .into_iter()
            .map(|(i, j, _)| (i.min(j), i.max(j)))
            .collect();
    interacting.sort();
    interacting
}

fn accumulated_forces(
    capsules: &[Capsule],
    domain: &CapsuleDomain,
    pairs: &[(usize, usize)],
) -> Vec<[Vector3<f64>; 2]> {
    let mut capsules = capsules.to_vec();
    clear_forces(&mut capsules);
    apply_self_and_wall_forces(&mut capsules, domain, false);
    let interactions = evaluate_pairs(&capsules, pairs, ContactDistribution::default(), false);
    scatter_pair_forces(&mut capsules, &interactions);
    capsules.iter().map(|c| *c.forces()).collect()
}

fn compare_against_brute_force(
    capsules: &[Capsule],
    domain: &CapsuleDomain,
    grid: &mut SpatialGrid,
) {
    grid.rebuild(capsules);
    let mut grid_pairs = Vec::new();
    grid.neighbor_pairs(&mut grid_pairs);
    let all_pairs = brute_force_pairs(capsules.len());

    let from_grid = interacting(capsules, &grid_pairs);
    let from_all = interacting(capsules, &all_pairs);
    assert!(!from_all.is_empty());
    assert_eq!(from_grid, from_all);

    let f_grid = accumulated_forces(capsules, domain, &grid_pairs);
    let f_all = accumulated_forces(capsules, domain, &all_pairs);
    for (a, b) in f_grid.iter().zip(f_all.iter()) {
        for k in 0..2 {
            assert_abs_diff_eq!(a[k], b[k], epsilon = 1e-8);
        }
    }
}

#[test]
fn planar_colony() -> Result<(), Box<dyn std::error::Error>> {
    let domain = CapsuleDomain::from_bound([40.0, 40.0, 1.0])?;
    let mut grid = SpatialGrid::new(&domain, DEFAULT_MIN_CELL_WIDTH, false)?;
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(11);
    let mut population = Population::new();
    population.place_random(120, &domain, CapsuleParameters::default(), &mut rng)?;
    compare_against_brute_force(population.capsules(), &domain, &mut grid);
    Ok(())
}

#[test]
fn stratified_volume() -> Result<(), Box<dyn std::error::Error>> {
    let domain = CapsuleDomain::from_bound([20.0, 20.0, 20.0])?;
    let mut grid = SpatialGrid::new(&domain, DEFAULT_MIN_CELL_WIDTH, true)?;
    assert_eq!(grid.n_cells(), [3, 3, 3]);
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(5);
    let mut population = Population::new();
    for _ in 0..150 {
        let p1 = Vector3::from_fn(|_, _| rng.gen_range(1.0..19.0));
        let direction = Vector3::from_fn(|_, _| rng.gen_range(-1.0..1.0));
        if direction.norm() < 1e-3 {
            continue;
        }
        let p2 = p1 + direction.normalize() * 2.25;
        population.spawn([p1, p2], CapsuleParameters::default())?;
    }
    compare_against_brute_force(population.capsules(), &domain, &mut grid);
    Ok(())
}

#[test]
fn grid_pairs_are_a_subset_of_all_pairs() -> Result<(), Box<dyn std::error::Error>> {
    let domain = CapsuleDomain::from_bound([40.0, 40.0, 1.0])?;
    let mut grid = SpatialGrid::new(&domain, DEFAULT_MIN_CELL_WIDTH, false)?;
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(2);
    let mut population = Population::new();
    population.place_random(60, &domain, CapsuleParameters::default(), &mut rng)?;
    grid.rebuild(population.capsules());
    let mut pairs = Vec::new();
    grid.neighbor_pairs(&mut pairs);
    let mut canonical: Vec<_> = pairs.iter().map(|(i, j)| (*i.min(j), *i.max(j))).collect();
    canonical.sort();
    let n = canonical.len();
    canonical.dedup();
    assert_eq!(n, canonical.len());
    assert!(canonical.iter().all(|(i, j)| i != j));
    assert!(n < brute_force_pairs(60).len());
    Ok(())
}
