//! Growth, division and removal of capsules between relaxation calls.
use capsula_building_blocks::{CapsuleDomain, CapsuleId, Face};
use capsula_concepts::{Cycle, CycleEvent, DivisionError};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::population::Population;

/// Grows every capsule by `dt` and divides those exceeding their division length.
///
/// Only capsules which were present when this function was called are grown and may divide.
/// Division products are appended to the population and thus every capsule divides at most once
/// per call.
/// Returns pairs of `(parent, child)` identifiers.
#[cfg_attr(feature = "tracing", instrument(skip_all))]
pub fn grow_and_divide(
    population: &mut Population,
    dt: f64,
    rng: &mut rand_chacha::ChaCha8Rng,
) -> Result<Vec<(CapsuleId, CapsuleId)>, DivisionError> {
    let n_capsules = population.len();
    let mut divisions = Vec::new();
    for i in 0..n_capsules {
        if let Some(CycleEvent::Division) = population.capsules_mut()[i].update_cycle(dt) {
            let child_id = population.allocate_id();
            let child = population.capsules_mut()[i].divide(rng, child_id)?;
            divisions.push((population.capsules()[i].id(), child_id));
            population.push(child);
        }
    }
    #[cfg(feature = "tracing")]
    {
        if !divisions.is_empty() {
            tracing::debug!(divisions = divisions.len(), "capsules divided");
        }
    }
    Ok(divisions)
}

/// Removes every capsule whose two endpoints both lie beyond the same open face.
///
/// Returns the identifiers of removed capsules and the face they left through.
pub fn remove_exited(population: &mut Population, domain: &CapsuleDomain) -> Vec<(CapsuleId, Face)> {
    let removed: Vec<_> = population
        .capsules()
        .iter()
        .filter_map(|c| domain.exited_face(c).map(|face| (c.id(), face)))
        .collect();
    if !removed.is_empty() {
        population.retain(|c| domain.exited_face(c).is_none());
        #[cfg(feature = "tracing")]
        tracing::debug!(removed = removed.len(), "capsules left the domain");
    }
    removed
}

#[cfg(test)]
mod test {
    use super::*;
    use capsula_building_blocks::{CapsuleParameters, FaceKind};
    use nalgebra::Vector3;
    use rand::SeedableRng;

    #[test]
    fn divides_at_most_once_per_tick() {
        let mut population = Population::new();
        let parameters = CapsuleParameters::default();
        population
            .spawn(
                [Vector3::new(2.0, 2.0, 0.5), Vector3::new(6.6, 2.0, 0.5)],
                parameters,
            )
            .unwrap();
        population
            .spawn(
                [Vector3::new(2.0, 8.0, 0.5), Vector3::new(4.25, 8.0, 0.5)],
                parameters,
            )
            .unwrap();
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        let mut divisions = vec![];
        let mut ticks = 0;
        while divisions.is_empty() {
            divisions = grow_and_divide(&mut population, 0.01, &mut rng).unwrap();
            ticks += 1;
            assert!(ticks < 1_000);
        }
        // Both capsules grew identically and thus divide in the same tick
        assert_eq!(divisions.len(), 2);
        assert_eq!(divisions[0], (CapsuleId(0), CapsuleId(2)));
        assert_eq!(divisions[1], (CapsuleId(1), CapsuleId(3)));
        assert_eq!(population.len(), 4);
        for capsule in population.capsules() {
            assert!(!capsule.ready_to_divide());
        }
    }

    #[test]
    fn only_open_faces_remove() {
        let domain = CapsuleDomain::from_bound([20.0, 20.0, 1.0])
            .unwrap()
            .with_face(Face::YMin, FaceKind::Open);
        let parameters = CapsuleParameters::default();
        let mut population = Population::new();
        let inside = population
            .spawn(
                [Vector3::new(2.0, 2.0, 0.5), Vector3::new(4.25, 2.0, 0.5)],
                parameters,
            )
            .unwrap();
        let below = population
            .spawn(
                [Vector3::new(2.0, -2.0, 0.5), Vector3::new(4.25, -2.0, 0.5)],
                parameters,
            )
            .unwrap();
        population
            .spawn(
                [Vector3::new(-4.0, 2.0, 0.5), Vector3::new(-1.75, 2.0, 0.5)],
                parameters,
            )
            .unwrap();
        let removed = remove_exited(&mut population, &domain);
        assert_eq!(removed, vec![(below, Face::YMin)]);
        assert_eq!(population.len(), 2);
        assert_eq!(population.capsules()[0].id(), inside);
    }
}
