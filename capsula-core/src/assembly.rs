//! Accumulates the forces of every force law acting on a population.
//!
//! Assembly always starts by zeroing the accumulators of every capsule.
//! Afterwards forces are only ever added.
//! Pair forces are evaluated in two phases:
//! the candidate pairs are first mapped to their [PairForce] (optionally in parallel with
//! [rayon]) while preserving their order, then the results are scattered to the endpoints
//! sequentially.
//! Thus every pair is evaluated exactly once and the summation order does not depend on the
//! number of threads.
use capsula_building_blocks::{
    Capsule, CapsuleDomain, ContactDistribution, PairForce, SpatialGrid,
};
use rayon::prelude::*;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Sets the force accumulators of all capsules to zero.
pub fn clear_forces(capsules: &mut [Capsule]) {
    capsules.iter_mut().for_each(|c| c.clear_forces());
}

/// Adds the internal spring and the wall repulsion of every capsule.
#[cfg_attr(feature = "tracing", instrument(skip_all))]
pub fn apply_self_and_wall_forces(capsules: &mut [Capsule], domain: &CapsuleDomain, parallel: bool) {
    let apply = |capsule: &mut Capsule| {
        let internal = capsule.calculate_internal_force();
        let wall = capsule.calculate_wall_force(domain);
        capsule.add_forces(&internal);
        capsule.add_forces(&wall);
    };
    if parallel {
        capsules.par_iter_mut().for_each(apply);
    } else {
        capsules.iter_mut().for_each(apply);
    }
}

/// Adds the forces of all configured flows.
pub fn apply_flow_forces(capsules: &mut [Capsule], domain: &CapsuleDomain) {
    if domain.flows().is_empty() {
        return;
    }
    for capsule in capsules.iter_mut() {
        let flow = capsule.calculate_flow_force(domain);
        capsule.add_forces(&flow);
    }
}

/// Candidate pairs of a population which tests every pair of capsules once.
pub fn brute_force_pairs(n_capsules: usize) -> Vec<(usize, usize)> {
    (0..n_capsules)
        .flat_map(|i| (i + 1..n_capsules).map(move |j| (i, j)))
        .collect()
}

/// Evaluates all candidate pairs and returns those which actually overlap together with their
/// forces, in the order of the candidates.
#[cfg_attr(feature = "tracing", instrument(skip_all))]
pub fn evaluate_pairs(
    capsules: &[Capsule],
    pairs: &[(usize, usize)],
    distribution: ContactDistribution,
    parallel: bool,
) -> Vec<(usize, usize, PairForce)> {
    let evaluate = |(i, j): &(usize, usize)| {
        capsules[*i]
            .calculate_force_between(&capsules[*j], distribution)
            .map(|force| (*i, *j, force))
    };
    if parallel {
        pairs.par_iter().filter_map(evaluate).collect()
    } else {
        pairs.iter().filter_map(evaluate).collect()
    }
}

/// Adds previously evaluated pair forces to the accumulators of both participants.
///
/// Returns the number of interacting pairs.
pub fn scatter_pair_forces(
    capsules: &mut [Capsule],
    interactions: &[(usize, usize, PairForce)],
) -> usize {
    for (i, j, force) in interactions.iter() {
        capsules[*i].add_forces(&force.own);
        capsules[*j].add_forces(&force.ext);
    }
    interactions.len()
}

/// Sum of the force magnitudes of all endpoints.
pub fn total_force_magnitude(capsules: &[Capsule]) -> f64 {
    capsules.iter().map(|c| c.force_magnitude()).sum()
}

/// Owns the [SpatialGrid] together with the candidate pairs derived from it.
///
/// The candidates are determined once per relaxation call by [ForceAssembler::rebuild].
/// Afterwards [ForceAssembler::assemble] can be called as often as needed.
#[derive(Clone, Debug)]
pub struct ForceAssembler {
    grid: SpatialGrid,
    pairs: Vec<(usize, usize)>,
    distribution: ContactDistribution,
    parallel: bool,
}

impl ForceAssembler {
    /// Construct a new assembler from a grid layout.
    pub fn new(grid: SpatialGrid, distribution: ContactDistribution, parallel: bool) -> Self {
        ForceAssembler {
            grid,
            pairs: Vec::new(),
            distribution,
            parallel,
        }
    }

    /// The underlying grid
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Candidate pairs determined at the last rebuild
    pub fn candidate_pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// Chosen distribution policy of contact forces
    pub fn distribution(&self) -> ContactDistribution {
        self.distribution
    }

    /// Clears and repopulates the grid and collects candidate pairs.
    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    pub fn rebuild(&mut self, capsules: &[Capsule]) {
        self.grid.rebuild(capsules);
        self.grid.neighbor_pairs(&mut self.pairs);
    }

    /// Zeroes all accumulators and adds internal, wall and neighbor forces.
    ///
    /// Returns the number of interacting pairs.
    pub fn assemble(&self, capsules: &mut [Capsule], domain: &CapsuleDomain) -> usize {
        clear_forces(capsules);
        apply_self_and_wall_forces(capsules, domain, self.parallel);
        let interactions = evaluate_pairs(capsules, &self.pairs, self.distribution, self.parallel);
        scatter_pair_forces(capsules, &interactions)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use capsula_building_blocks::{CapsuleId, CapsuleParameters};
    use nalgebra::Vector3;

    fn two_overlapping() -> Vec<Capsule> {
        let parameters = CapsuleParameters::default();
        vec![
            Capsule::new(
                CapsuleId(0),
                [Vector3::new(5.0, 5.0, 0.5), Vector3::new(7.25, 5.0, 0.5)],
                parameters,
            )
            .unwrap(),
            Capsule::new(
                CapsuleId(1),
                [Vector3::new(5.5, 5.6, 0.5), Vector3::new(7.75, 5.6, 0.5)],
                parameters,
            )
            .unwrap(),
        ]
    }

    #[test]
    fn assembly_starts_from_zero() {
        let domain = CapsuleDomain::from_bound([20.0, 20.0, 1.0]).unwrap();
        let grid = SpatialGrid::new(&domain, 6.5, false).unwrap();
        let mut assembler = ForceAssembler::new(grid, ContactDistribution::default(), false);
        let mut capsules = two_overlapping();
        assembler.rebuild(&capsules);
        assert_eq!(assembler.candidate_pairs(), &[(0, 1)]);

        let n = assembler.assemble(&mut capsules, &domain);
        assert_eq!(n, 1);
        let first = capsules.iter().map(|c| *c.forces()).collect::<Vec<_>>();
        // A second assembly may not accumulate on top of the first one
        assembler.assemble(&mut capsules, &domain);
        let second = capsules.iter().map(|c| *c.forces()).collect::<Vec<_>>();
        assert_eq!(first, second);
        assert!(capsules[0].forces()[0].y < 0.0);
        assert!(capsules[1].forces()[0].y > 0.0);
    }

    #[test]
    fn parallel_matches_sequential() {
        let domain = CapsuleDomain::from_bound([20.0, 20.0, 1.0]).unwrap();
        let mut capsules = two_overlapping();
        let pairs = brute_force_pairs(capsules.len());
        let seq = evaluate_pairs(&capsules, &pairs, ContactDistribution::default(), false);
        let par = evaluate_pairs(&capsules, &pairs, ContactDistribution::default(), true);
        assert_eq!(seq, par);
        apply_self_and_wall_forces(&mut capsules, &domain, true);
        scatter_pair_forces(&mut capsules, &par);
        assert!(total_force_magnitude(&capsules) > 0.0);
    }

    #[test]
    fn brute_force_pairs_are_complete() {
        let pairs = brute_force_pairs(4);
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert!(brute_force_pairs(1).is_empty());
    }
}
