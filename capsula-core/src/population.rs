//! The ordered collection of capsules together with its identifier sequence.
use capsula_building_blocks::{Capsule, CapsuleDomain, CapsuleId, CapsuleParameters};
use capsula_concepts::SetupError;
use nalgebra::Vector3;
use rand::Rng;
use rand_distr::{Distribution, UnitCircle};
use serde::{Deserialize, Serialize};

/// Hands out strictly increasing [CapsuleId]s.
///
/// Every population owns its allocator such that independent simulations never share
/// identifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// Allocator whose first identifier is `first`.
    pub fn starting_at(first: u64) -> Self {
        IdAllocator { next: first }
    }

    /// Returns a fresh identifier.
    pub fn next_id(&mut self) -> CapsuleId {
        let id = CapsuleId(self.next);
        self.next += 1;
        id
    }

    /// Identifier which will be returned next.
    pub fn peek(&self) -> CapsuleId {
        CapsuleId(self.next)
    }
}

/// Ordered collection of capsules.
///
/// The length of the population can only be changed by the owner.
/// Solvers only ever receive a slice by [Population::capsules_mut] and can thus move capsules
/// but never insert or remove them.
///
/// ```
/// # use capsula_building_blocks::*;
/// # use capsula_core::population::Population;
/// use nalgebra::Vector3;
/// let mut population = Population::new();
/// let parameters = CapsuleParameters::default();
/// let id = population.spawn([Vector3::new(1.0, 1.0, 0.5), Vector3::new(3.25, 1.0, 0.5)], parameters)?;
/// assert_eq!(id, CapsuleId(0));
/// assert_eq!(population.len(), 1);
/// # Ok::<(), capsula_concepts::SetupError>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Population {
    capsules: Vec<Capsule>,
    ids: IdAllocator,
}

impl Population {
    /// Empty population
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a capsule with a fresh identifier and appends it.
    pub fn spawn(
        &mut self,
        pos: [Vector3<f64>; 2],
        parameters: CapsuleParameters,
    ) -> Result<CapsuleId, SetupError> {
        let id = self.ids.peek();
        let capsule = Capsule::new(id, pos, parameters)?;
        self.ids.next_id();
        self.capsules.push(capsule);
        Ok(id)
    }

    /// Places `n` capsules of initial length with uniformly distributed midpoints.
    ///
    /// Midpoints are drawn inside the lateral plane of the domain keeping a margin of half the
    /// initial length plus one radius to every lateral face.
    /// All capsules lie at half the height of the domain and are oriented randomly within the
    /// lateral plane.
    pub fn place_random(
        &mut self,
        n: usize,
        domain: &CapsuleDomain,
        parameters: CapsuleParameters,
        rng: &mut rand_chacha::ChaCha8Rng,
    ) -> Result<(), SetupError> {
        let min = domain.get_min();
        let max = domain.get_max();
        let half_length = 0.5 * parameters.initial_length;
        let margin = half_length + parameters.radius;
        for i in 0..2 {
            if max[i] - min[i] <= 2.0 * margin {
                return Err(SetupError(format!(
                    "Domain extent {} along axis {i} leaves no room to place capsules",
                    max[i] - min[i]
                )));
            }
        }
        let z = 0.5 * (min.z + max.z);
        for _ in 0..n {
            let x = rng.gen_range(min.x + margin..max.x - margin);
            let y = rng.gen_range(min.y + margin..max.y - margin);
            let [dx, dy]: [f64; 2] = UnitCircle.sample(rng);
            let midpoint = Vector3::new(x, y, z);
            let half_axis = Vector3::new(dx, dy, 0.0) * half_length;
            self.spawn([midpoint - half_axis, midpoint + half_axis], parameters)?;
        }
        Ok(())
    }

    /// Number of capsules
    pub fn len(&self) -> usize {
        self.capsules.len()
    }

    /// `true` if there are no capsules
    pub fn is_empty(&self) -> bool {
        self.capsules.is_empty()
    }

    /// All capsules in order
    pub fn capsules(&self) -> &[Capsule] {
        &self.capsules
    }

    /// Mutable access to all capsules which cannot change the length of the population.
    pub fn capsules_mut(&mut self) -> &mut [Capsule] {
        &mut self.capsules
    }

    /// Identifier which the next capsule will receive
    pub fn next_id(&self) -> CapsuleId {
        self.ids.peek()
    }

    /// Reserves a fresh identifier, for example for a division product.
    pub(crate) fn allocate_id(&mut self) -> CapsuleId {
        self.ids.next_id()
    }

    /// Appends a capsule which already carries an identifier of this population.
    pub(crate) fn push(&mut self, capsule: Capsule) {
        self.capsules.push(capsule);
    }

    /// Keeps only the capsules for which `keep` returns `true` while preserving their order.
    pub(crate) fn retain(&mut self, keep: impl FnMut(&Capsule) -> bool) {
        self.capsules.retain(keep);
    }
}
