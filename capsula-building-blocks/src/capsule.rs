use capsula_concepts::{Cycle, DivisionError, Position, SetupError};

use nalgebra::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{closest_points_between_segments, CapsuleDomain, SegmentContact};

/// Segments shorter than this are treated as points when computing their axis.
const DEGENERATE_EXTENT: f64 = 1e-12;

/// Smallest target length (relative to the initial length) a division product may receive.
const MIN_RELATIVE_LENGTH: f64 = 1e-3;

/// Unique identifier of a capsule.
///
/// Identifiers are handed out by the population in strictly increasing order.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CapsuleId(pub u64);

impl core::fmt::Display for CapsuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Spring constants of the three force laws acting on a capsule.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stiffness {
    /// Internal (growth) spring keeping the segment at its target length
    pub internal: f64,
    /// Repulsion from solid domain faces
    pub wall: f64,
    /// Repulsion between overlapping capsules
    pub neighbor: f64,
}

impl Default for Stiffness {
    fn default() -> Self {
        Stiffness {
            internal: 100.0,
            wall: 1000.0,
            neighbor: 1000.0,
        }
    }
}

/// Parameters shared by every capsule of a population.
///
/// | Struct Field | Description |
/// | --- | --- |
/// | `radius` | Radius of the hemispherical caps and the cylinder. Constant per capsule. |
/// | `initial_length` | Target segment length of freshly placed capsules. |
/// | `max_length` | Asymptotic limit of the logistic growth law. |
/// | `division_length` | Capsules divide once their target length exceeds this value. |
/// | `growth_rate` | Rate $g$ of the logistic growth law. |
/// | `stiffness` | See [Stiffness]. |
/// | `division_asymmetry` | Amplitude of the split point perturbation relative to `max_length`. |
/// | `division_jitter` | Amplitude of the positional jitter relative to `initial_length`. |
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapsuleParameters {
    /// Radius of the capsule
    pub radius: f64,
    /// Target length given to capsules at initialization
    pub initial_length: f64,
    /// Maximum length of the logistic growth
    pub max_length: f64,
    /// Division threshold length
    pub division_length: f64,
    /// Growth rate constant
    pub growth_rate: f64,
    /// Stiffness constants of the force laws
    pub stiffness: Stiffness,
    /// Split point perturbation relative to the maximum length
    pub division_asymmetry: f64,
    /// Positional jitter relative to the initial length
    pub division_jitter: f64,
}

impl Default for CapsuleParameters {
    fn default() -> Self {
        CapsuleParameters {
            radius: 0.5,
            initial_length: 2.25,
            max_length: 5.0,
            division_length: 4.5,
            growth_rate: 1.0,
            stiffness: Stiffness::default(),
            division_asymmetry: 0.1,
            division_jitter: 0.01,
        }
    }
}

impl CapsuleParameters {
    /// Checks that all constants are positive and the lengths are ordered consistently.
    ///
    /// ```
    /// # use capsula_building_blocks::CapsuleParameters;
    /// let mut parameters = CapsuleParameters::default();
    /// assert!(parameters.validate().is_ok());
    /// parameters.radius = 0.0;
    /// assert!(parameters.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), SetupError> {
        let positive = [
            ("radius", self.radius),
            ("initial_length", self.initial_length),
            ("max_length", self.max_length),
            ("division_length", self.division_length),
            ("growth_rate", self.growth_rate),
            ("stiffness.internal", self.stiffness.internal),
            ("stiffness.wall", self.stiffness.wall),
            ("stiffness.neighbor", self.stiffness.neighbor),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(SetupError(format!(
                    "Capsule parameter {name} must be positive and finite but is {value}"
                )));
            }
        }
        for (name, value) in [
            ("division_asymmetry", self.division_asymmetry),
            ("division_jitter", self.division_jitter),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(SetupError(format!(
                    "Capsule parameter {name} must be non-negative but is {value}"
                )));
            }
        }
        if self.initial_length >= self.division_length || self.division_length >= self.max_length
        {
            return Err(SetupError(format!(
                "Capsule lengths must satisfy initial_length < division_length < max_length \
                but got {} < {} < {}",
                self.initial_length, self.division_length, self.max_length
            )));
        }
        Ok(())
    }

    /// Largest distance between the midpoints of two capsules at which they can still touch.
    pub fn max_interaction_distance(&self) -> f64 {
        self.max_length + 2.0 * self.radius
    }
}

/// Determines how the contact force between two capsules is shared by their endpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactDistribution {
    /// The force is split according to the contact parameter $s_c$ such that the endpoint
    /// closer to the contact point receives the larger share.
    #[default]
    ContactParameter,
    /// Both endpoints receive one half of the force.
    Even,
}

impl ContactDistribution {
    /// Weights of the first and second endpoint for a given contact parameter.
    pub fn weights(&self, contact_parameter: f64) -> [f64; 2] {
        match self {
            ContactDistribution::ContactParameter => [1.0 - contact_parameter, contact_parameter],
            ContactDistribution::Even => [0.5, 0.5],
        }
    }
}

/// Forces which result from the contact of two capsules, per endpoint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairForce {
    /// Forces acting on the endpoints of the first capsule
    pub own: [Vector3<f64>; 2],
    /// Forces acting on the endpoints of the second capsule
    pub ext: [Vector3<f64>; 2],
    /// Geometry of the contact
    pub contact: SegmentContact,
}

/// A rod-shaped organism represented by a line segment with hemispherical caps.
///
/// # Force laws
/// With the extent $e=|\vec{p}_2-\vec{p}_1|$ and the target length $L$, the internal spring
/// acts along the axis with magnitude
/// \\begin{equation}
///     F_\text{internal} = \frac{1}{2}k_\text{internal}(e-L)^2
/// \\end{equation}
/// pushing the endpoints apart if $e<L$ and pulling them together otherwise.
/// Solid faces and neighbors repel with a soft power law of the penetration depth $\delta$
/// \\begin{equation}
///     F_\text{wall} = 0.4 k_\text{wall}\delta^{5/2}
///     \qquad
///     F_\text{neighbor} = 0.4 k_\text{neighbor}\delta^{5/2}.
/// \\end{equation}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    id: CapsuleId,
    pos: [Vector3<f64>; 2],
    force: [Vector3<f64>; 2],
    length: f64,
    parameters: CapsuleParameters,
}

impl Capsule {
    /// Creates a new capsule at the given endpoints with target length
    /// [initial_length](CapsuleParameters::initial_length).
    pub fn new(
        id: CapsuleId,
        pos: [Vector3<f64>; 2],
        parameters: CapsuleParameters,
    ) -> Result<Self, SetupError> {
        parameters.validate()?;
        if pos.iter().any(|p| p.iter().any(|x| !x.is_finite())) {
            return Err(SetupError(format!(
                "Capsule {id} received non-finite endpoints {pos:?}"
            )));
        }
        Ok(Capsule {
            id,
            pos,
            force: [Vector3::zeros(); 2],
            length: parameters.initial_length,
            parameters,
        })
    }

    /// Unique identifier
    pub fn id(&self) -> CapsuleId {
        self.id
    }

    /// Both endpoints of the segment
    pub fn endpoints(&self) -> &[Vector3<f64>; 2] {
        &self.pos
    }

    /// The endpoints as a tuple suited for the geometric routines
    pub fn segment(&self) -> (Vector3<f64>, Vector3<f64>) {
        (self.pos[0], self.pos[1])
    }

    /// Currently accumulated forces per endpoint
    pub fn forces(&self) -> &[Vector3<f64>; 2] {
        &self.force
    }

    /// Radius of the capsule
    pub fn radius(&self) -> f64 {
        self.parameters.radius
    }

    /// Target length which is advanced by growth
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Parameters which this capsule was created with
    pub fn parameters(&self) -> &CapsuleParameters {
        &self.parameters
    }

    /// Actual distance between the two endpoints
    pub fn extent(&self) -> f64 {
        (self.pos[1] - self.pos[0]).norm()
    }

    /// Midpoint of the segment
    pub fn midpoint(&self) -> Vector3<f64> {
        (self.pos[0] + self.pos[1]) * 0.5
    }

    /// Unit vector pointing from the first to the second endpoint.
    ///
    /// Falls back to the x-axis when both endpoints coincide.
    pub fn axis(&self) -> Vector3<f64> {
        let dist = self.pos[1] - self.pos[0];
        let extent = dist.norm();
        if extent < DEGENERATE_EXTENT {
            Vector3::x()
        } else {
            dist / extent
        }
    }

    /// Adds to the force accumulators of both endpoints.
    #[inline]
    pub fn add_forces(&mut self, forces: &[Vector3<f64>; 2]) {
        self.force[0] += forces[0];
        self.force[1] += forces[1];
    }

    /// Resets both force accumulators to zero.
    #[inline]
    pub fn clear_forces(&mut self) {
        self.force = [Vector3::zeros(); 2];
    }

    /// Sum of the magnitudes of both accumulated forces.
    pub fn force_magnitude(&self) -> f64 {
        self.force[0].norm() + self.force[1].norm()
    }

    /// Internal spring force which keeps the extent at the target length.
    pub fn calculate_internal_force(&self) -> [Vector3<f64>; 2] {
        let extent = self.extent();
        let axis = self.axis();
        let discrepancy = extent - self.length;
        let magnitude = 0.5 * self.parameters.stiffness.internal * discrepancy * discrepancy;
        // Positive values push the endpoints apart
        let strength = if discrepancy < 0.0 {
            magnitude
        } else {
            -magnitude
        };
        [-axis * strength, axis * strength]
    }

    /// Repulsion from every solid face which is closer than one radius to an endpoint.
    pub fn calculate_wall_force(&self, domain: &CapsuleDomain) -> [Vector3<f64>; 2] {
        let radius = self.radius();
        let stiffness = self.parameters.stiffness.wall;
        let mut force = [Vector3::zeros(); 2];
        for (p, f) in self.pos.iter().zip(force.iter_mut()) {
            for (face, distance) in domain.solid_face_distances(p) {
                if distance < radius {
                    let penetration = radius - distance;
                    *f += face.inward_normal() * 0.4 * stiffness * penetration.powf(2.5);
                }
            }
        }
        force
    }

    /// Constant flow forces for every endpoint which crossed a face with configured flow.
    pub fn calculate_flow_force(&self, domain: &CapsuleDomain) -> [Vector3<f64>; 2] {
        let mut force = [Vector3::zeros(); 2];
        for flow in domain.flows() {
            for (p, f) in self.pos.iter().zip(force.iter_mut()) {
                if domain.is_beyond(p, flow.face) {
                    *f += flow.force;
                }
            }
        }
        force
    }

    /// Cheap test whether two capsules could possibly overlap, based on their midpoints.
    pub fn may_touch(&self, other: &Capsule) -> bool {
        let reach = 0.5 * (self.extent() + other.extent()) + self.radius() + other.radius();
        (self.midpoint() - other.midpoint()).norm_squared() <= reach * reach
    }

    /// Calculates the repulsion between two capsules if they overlap.
    ///
    /// The force is directed along the vector connecting the closest points and shared among the
    /// endpoints according to the chosen [ContactDistribution].
    /// When both capsules use different neighbor stiffness, their mean is taken.
    pub fn calculate_force_between(
        &self,
        other: &Capsule,
        distribution: ContactDistribution,
    ) -> Option<PairForce> {
        if !self.may_touch(other) {
            return None;
        }
        let contact = closest_points_between_segments(&self.segment(), &other.segment());
        let contact_distance = self.radius() + other.radius();
        if contact.distance >= contact_distance {
            return None;
        }
        let overlap = contact_distance - contact.distance;
        let stiffness =
            0.5 * (self.parameters.stiffness.neighbor + other.parameters.stiffness.neighbor);
        let magnitude = 0.4 * stiffness * overlap.powf(2.5);
        let direction = if contact.distance > DEGENERATE_EXTENT {
            contact.separation / contact.distance
        } else {
            self.fallback_direction(other)
        };
        let force = direction * magnitude;
        let [w0, w1] = distribution.weights(contact.sc);
        let [v0, v1] = distribution.weights(contact.tc);
        Some(PairForce {
            own: [force * w0, force * w1],
            ext: [-force * v0, -force * v1],
            contact,
        })
    }

    /// Direction of repulsion when the two segments intersect exactly.
    fn fallback_direction(&self, other: &Capsule) -> Vector3<f64> {
        let midpoints = self.midpoint() - other.midpoint();
        if midpoints.norm() > DEGENERATE_EXTENT {
            return midpoints.normalize();
        }
        let normal = self.axis().cross(&other.axis());
        if normal.norm() > DEGENERATE_EXTENT {
            return normal.normalize();
        }
        let perpendicular = self.axis().cross(&Vector3::z());
        if perpendicular.norm() > DEGENERATE_EXTENT {
            perpendicular.normalize()
        } else {
            Vector3::y()
        }
    }

    /// Overdamped update of the endpoints which consumes the accumulated forces.
    ///
    /// \\begin{equation}
    ///     \vec{p}_i(t+\Delta t) = \vec{p}_i(t) + \Delta t\vec{F}_i
    /// \\end{equation}
    #[inline]
    pub fn euler_step(&mut self, dt: f64) {
        self.pos[0] += self.force[0] * dt;
        self.pos[1] += self.force[1] * dt;
        self.clear_forces();
    }
}

impl Position<[Vector3<f64>; 2]> for Capsule {
    fn pos(&self) -> [Vector3<f64>; 2] {
        self.pos
    }

    fn set_pos(&mut self, pos: &[Vector3<f64>; 2]) {
        self.pos = *pos;
    }
}

impl Cycle<CapsuleId> for Capsule {
    /// Logistic growth of the target length
    /// \\begin{equation}
    ///     L \leftarrow L + \Delta t\, g L\left(1-\frac{L}{L_\text{max}}\right)
    /// \\end{equation}
    /// which is capped at $L_\text{max}$.
    fn grow(&mut self, dt: f64) {
        let max_length = self.parameters.max_length;
        let increment =
            dt * self.parameters.growth_rate * self.length * (1.0 - self.length / max_length);
        self.length = (self.length + increment).min(max_length);
    }

    fn ready_to_divide(&self) -> bool {
        self.length > self.parameters.division_length
    }

    /// Splits the capsule at a perturbed point near its middle.
    ///
    /// The parent keeps its first endpoint and is shortened in place while the returned child
    /// occupies the second part of the old segment.
    /// Each product loses one radius at the new boundary to make room for its cap.
    /// The new boundary points and the free end of the child are jittered randomly.
    ///
    /// ```
    /// # use capsula_building_blocks::*;
    /// # use capsula_concepts::Cycle;
    /// # use rand::SeedableRng;
    /// use nalgebra::Vector3;
    /// let parameters = CapsuleParameters::default();
    /// let mut parent = Capsule::new(
    ///     CapsuleId(0),
    ///     [Vector3::new(5.0, 5.0, 0.5), Vector3::new(9.6, 5.0, 0.5)],
    ///     parameters,
    /// )?;
    /// let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
    /// let child = parent.divide(&mut rng, CapsuleId(1))?;
    /// assert_eq!(child.id(), CapsuleId(1));
    /// let lost = 2.0 * parameters.radius;
    /// assert!((parent.length() + child.length() + lost - 4.6).abs() < 1e-10);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    fn divide(
        &mut self,
        rng: &mut rand_chacha::ChaCha8Rng,
        new_id: CapsuleId,
    ) -> Result<Self, DivisionError> {
        let extent = self.extent();
        let axis = self.axis();
        let radius = self.radius();
        let [p1, p2] = self.pos;

        let asymmetry = self.parameters.division_asymmetry * self.parameters.max_length;
        let offset = if asymmetry > 0.0 {
            rng.gen_range(-asymmetry..=asymmetry)
        } else {
            0.0
        };
        let split = 0.5 * extent + offset;
        let min_length = MIN_RELATIVE_LENGTH * self.parameters.initial_length;
        let max_length = self.parameters.max_length;
        let length_1 = (split - radius).clamp(min_length, max_length);
        let length_2 = (extent - split - radius).clamp(min_length, max_length);

        let jitter_amplitude = self.parameters.division_jitter * self.parameters.initial_length;
        let mut jitter = || -> Vector3<f64> {
            if jitter_amplitude > 0.0 {
                Vector3::from_fn(|_, _| rng.gen_range(-jitter_amplitude..=jitter_amplitude))
            } else {
                Vector3::zeros()
            }
        };
        let parent_end = p1 + axis * length_1 + jitter();
        let child_start = p2 - axis * length_2 + jitter();
        let child_end = p2 + jitter();

        if (parent_end - p1).norm() < DEGENERATE_EXTENT
            || (child_end - child_start).norm() < DEGENERATE_EXTENT
        {
            return Err(DivisionError(format!(
                "Division of capsule {} with extent {extent} produced coinciding endpoints",
                self.id
            )));
        }
        if [parent_end, child_start, child_end]
            .iter()
            .any(|p| p.iter().any(|x| !x.is_finite()))
        {
            return Err(DivisionError(format!(
                "Division of capsule {} produced non-finite endpoints",
                self.id
            )));
        }

        self.pos = [p1, parent_end];
        self.length = length_1;
        self.clear_forces();

        Ok(Capsule {
            id: new_id,
            pos: [child_start, child_end],
            force: [Vector3::zeros(); 2],
            length: length_2,
            parameters: self.parameters,
        })
    }
}
