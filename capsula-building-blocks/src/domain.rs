use capsula_concepts::BoundaryError;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::Capsule;

/// One of the six faces of the cuboid domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    /// Lower face in x-direction
    XMin,
    /// Upper face in x-direction
    XMax,
    /// Lower face in y-direction
    YMin,
    /// Upper face in y-direction
    YMax,
    /// Lower face in z-direction
    ZMin,
    /// Upper face in z-direction
    ZMax,
}

impl Face {
    /// All faces ordered by axis and then lower before upper.
    pub const ALL: [Face; 6] = [
        Face::XMin,
        Face::XMax,
        Face::YMin,
        Face::YMax,
        Face::ZMin,
        Face::ZMax,
    ];

    /// Index of the axis which is normal to this face.
    pub fn axis(&self) -> usize {
        match self {
            Face::XMin | Face::XMax => 0,
            Face::YMin | Face::YMax => 1,
            Face::ZMin | Face::ZMax => 2,
        }
    }

    /// `true` for the face at the minimum of its axis.
    pub fn is_lower(&self) -> bool {
        matches!(self, Face::XMin | Face::YMin | Face::ZMin)
    }

    /// Unit normal pointing into the domain.
    pub fn inward_normal(&self) -> Vector3<f64> {
        let mut normal = Vector3::zeros();
        normal[self.axis()] = if self.is_lower() { 1.0 } else { -1.0 };
        normal
    }

    /// Position in [Face::ALL]
    fn index(&self) -> usize {
        2 * self.axis() + if self.is_lower() { 0 } else { 1 }
    }
}

/// Determines if capsules are confined at a face or allowed to leave through it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceKind {
    /// Repels capsules with the wall force law
    #[default]
    Solid,
    /// Generates no force; capsules may exit here
    Open,
}

/// Constant force acting on every endpoint which has crossed the given face.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    /// Face which needs to be crossed
    pub face: Face,
    /// Force applied to the endpoint
    pub force: Vector3<f64>,
}

/// Cuboid simulation domain with a solid/open flag per face.
///
/// ```
/// # use capsula_building_blocks::*;
/// let domain = CapsuleDomain::from_bound([20.0, 20.0, 1.0])?
///     .with_face(Face::YMin, FaceKind::Open)
///     .with_face(Face::YMax, FaceKind::Open);
/// assert_eq!(domain.face_kind(Face::XMin), FaceKind::Solid);
/// assert_eq!(domain.face_kind(Face::YMax), FaceKind::Open);
/// # Ok::<(), capsula_concepts::BoundaryError>(())
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapsuleDomain {
    min: Vector3<f64>,
    max: Vector3<f64>,
    faces: [FaceKind; 6],
    flows: Vec<Flow>,
}

impl CapsuleDomain {
    fn check_min_max(min: &[f64; 3], max: &[f64; 3]) -> Result<(), BoundaryError> {
        for i in 0..3 {
            if !(min[i] < max[i]) || !min[i].is_finite() || !max[i].is_finite() {
                return Err(BoundaryError(format!(
                    "Min {:?} must be smaller than Max {:?} for domain boundaries!",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Domain spanning from the origin to `bound` with only solid faces.
    pub fn from_bound(bound: impl Into<[f64; 3]>) -> Result<Self, BoundaryError> {
        Self::from_boundaries([0.0; 3], bound)
    }

    /// Domain spanning from `min` to `max` with only solid faces.
    pub fn from_boundaries(
        min: impl Into<[f64; 3]>,
        max: impl Into<[f64; 3]>,
    ) -> Result<Self, BoundaryError> {
        let min: [f64; 3] = min.into();
        let max: [f64; 3] = max.into();
        Self::check_min_max(&min, &max)?;
        Ok(CapsuleDomain {
            min: min.into(),
            max: max.into(),
            faces: [FaceKind::Solid; 6],
            flows: Vec::new(),
        })
    }

    /// Sets the kind of a single face.
    pub fn with_face(mut self, face: Face, kind: FaceKind) -> Self {
        self.faces[face.index()] = kind;
        self
    }

    /// Adds a flow which acts on endpoints beyond `face`.
    pub fn with_flow(mut self, face: Face, force: impl Into<[f64; 3]>) -> Self {
        let force: [f64; 3] = force.into();
        self.flows.push(Flow {
            face,
            force: force.into(),
        });
        self
    }

    /// Get the minimum point which defines the simulation domain
    pub fn get_min(&self) -> Vector3<f64> {
        self.min
    }

    /// Get the maximum point which defines the simulation domain
    pub fn get_max(&self) -> Vector3<f64> {
        self.max
    }

    /// Side lengths of the domain
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Kind of the given face
    pub fn face_kind(&self, face: Face) -> FaceKind {
        self.faces[face.index()]
    }

    /// All configured flows
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    /// Signed distance of a point to the plane of a face, positive on the inside.
    pub fn distance_to_face(&self, p: &Vector3<f64>, face: Face) -> f64 {
        let i = face.axis();
        if face.is_lower() {
            p[i] - self.min[i]
        } else {
            self.max[i] - p[i]
        }
    }

    /// Checks if the point lies strictly outside of the plane of the face.
    pub fn is_beyond(&self, p: &Vector3<f64>, face: Face) -> bool {
        self.distance_to_face(p, face) < 0.0
    }

    /// Distances of a point to every solid face.
    pub fn solid_face_distances<'a>(
        &'a self,
        p: &'a Vector3<f64>,
    ) -> impl Iterator<Item = (Face, f64)> + 'a {
        Face::ALL
            .into_iter()
            .filter(|face| self.face_kind(*face) == FaceKind::Solid)
            .map(move |face| (face, self.distance_to_face(p, face)))
    }

    /// Returns the open face through which the capsule has left the domain, if both of its
    /// endpoints lie beyond it.
    pub fn exited_face(&self, capsule: &Capsule) -> Option<Face> {
        let [p1, p2] = capsule.endpoints();
        Face::ALL.into_iter().find(|face| {
            self.face_kind(*face) == FaceKind::Open
                && self.is_beyond(p1, *face)
                && self.is_beyond(p2, *face)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{CapsuleId, CapsuleParameters};

    #[test]
    fn invalid_boundaries() {
        assert!(CapsuleDomain::from_bound([0.0, 1.0, 1.0]).is_err());
        assert!(CapsuleDomain::from_boundaries([2.0; 3], [1.0; 3]).is_err());
        assert!(CapsuleDomain::from_bound([f64::NAN, 1.0, 1.0]).is_err());
    }

    #[test]
    fn normals_point_inside() {
        let domain = CapsuleDomain::from_bound([4.0, 4.0, 4.0]).unwrap();
        let center = Vector3::from([2.0; 3]);
        for face in Face::ALL {
            let d0 = domain.distance_to_face(&center, face);
            let d1 = domain.distance_to_face(&(center + face.inward_normal()), face);
            assert!((d1 - d0 - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn exit_only_through_open_faces() {
        let domain = CapsuleDomain::from_bound([20.0, 20.0, 1.0])
            .unwrap()
            .with_face(Face::YMin, FaceKind::Open);
        let parameters = CapsuleParameters::default();
        let below = Capsule::new(
            CapsuleId(0),
            [Vector3::new(3.0, -1.0, 0.5), Vector3::new(5.0, -2.0, 0.5)],
            parameters,
        )
        .unwrap();
        assert_eq!(domain.exited_face(&below), Some(Face::YMin));

        let straddling = Capsule::new(
            CapsuleId(1),
            [Vector3::new(3.0, 1.0, 0.5), Vector3::new(5.0, -2.0, 0.5)],
            parameters,
        )
        .unwrap();
        assert_eq!(domain.exited_face(&straddling), None);

        let left = Capsule::new(
            CapsuleId(2),
            [Vector3::new(-3.0, 1.0, 0.5), Vector3::new(-5.0, 2.0, 0.5)],
            parameters,
        )
        .unwrap();
        assert_eq!(domain.exited_face(&left), None);
    }
}
