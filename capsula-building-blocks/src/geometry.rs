use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Denominators below this value are treated as zero when solving for the closest points.
pub const PARALLEL_EPSILON: f64 = 1e-12;

/// Calculate the point on a line which is closest to an external given point.
///
/// This function takes an external point $\vec{p}$ and a line segment described by two points
/// $\vec{p}_1,\vec{p}_2$.
/// It returns a tuple $(d, \vec{x}, q)$ which contains the distance $d$ between the calculated
/// nearest point and the external point, the calculated point $\vec{x}$ and a fractional value
/// $0\leq q\leq 1$ which is the relative length of the calculated nearest point between the
/// points of the given line segment given by:
/// $$\vec{x} = (1-q)\vec{p}_1 + q\vec{p}_2$$
///
/// ```
/// use nalgebra::Vector3;
/// # use capsula_building_blocks::nearest_point_from_point_to_line;
///
/// let external_point = Vector3::from([0f64; 3]);
/// let line_segment = (
///     Vector3::from([1.0, 0.0, 0.0]),
///     Vector3::from([-1.0, 2.0, 0.0]),
/// );
/// let (dist, point, rel_length) = nearest_point_from_point_to_line(
///     &external_point,
///     &line_segment,
/// );
///
/// assert!((dist - 1.0/2f64.sqrt()).abs() < 1e-10);
/// assert!((rel_length - 0.25).abs() < 1e-10);
/// assert!((point.x - 0.5).abs() < 1e-10);
/// assert!((point.y - 0.5).abs() < 1e-10);
/// ```
pub fn nearest_point_from_point_to_line(
    point: &Vector3<f64>,
    line: &(Vector3<f64>, Vector3<f64>),
) -> (f64, Vector3<f64>, f64) {
    let ab = line.1 - line.0;
    let ap = point - line.0;
    let norm_squared = ab.norm_squared();
    let t = if norm_squared < PARALLEL_EPSILON {
        0.0
    } else {
        (ab.dot(&ap) / norm_squared).clamp(0.0, 1.0)
    };
    let nearest_point = line.0 * (1.0 - t) + line.1 * t;
    ((point - nearest_point).norm(), nearest_point, t)
}

/// Result of the closest-point calculation between two finite line segments.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentContact {
    /// Minimum distance between the two segments
    pub distance: f64,
    /// Contact parameter $s_c\in[0,1]$ along the first segment
    pub sc: f64,
    /// Contact parameter $t_c\in[0,1]$ along the second segment
    pub tc: f64,
    /// Vector pointing from the closest point of the second segment to the closest point of the
    /// first one.
    pub separation: Vector3<f64>,
}

impl SegmentContact {
    /// Closest point on the first segment given its endpoints.
    pub fn point_on_first(&self, p: &(Vector3<f64>, Vector3<f64>)) -> Vector3<f64> {
        p.0 + (p.1 - p.0) * self.sc
    }

    /// Closest point on the second segment given its endpoints.
    pub fn point_on_second(&self, q: &(Vector3<f64>, Vector3<f64>)) -> Vector3<f64> {
        q.0 + (q.1 - q.0) * self.tc
    }
}

/// Computes the minimum distance between the segments $\vec{p}(s)=\vec{p}_0+s\vec{u}$ and
/// $\vec{q}(t)=\vec{q}_0+t\vec{v}$ with $s,t\in[0,1]$.
///
/// With $\vec{w}=\vec{p}_0-\vec{q}_0$ we solve the $2\times2$ system
/// \\begin{align}
///     a s - b t &= -d\\\\
///     b s - c t &= -e
/// \\end{align}
/// where $a=\vec{u}\cdot\vec{u}$, $b=\vec{u}\cdot\vec{v}$, $c=\vec{v}\cdot\vec{v}$,
/// $d=\vec{u}\cdot\vec{w}$ and $e=\vec{v}\cdot\vec{w}$.
/// When the solution leaves the unit square, the parameters are clamped to the respective edge
/// and the other parameter is recomputed.
/// If the denominator $ac-b^2$ drops below [PARALLEL_EPSILON] the segments are (nearly)
/// parallel and we fix $s_c=0$ and solve for $t_c$ directly.
///
/// ```
/// # use capsula_building_blocks::closest_points_between_segments;
/// use nalgebra::Vector3;
/// let p = (Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, 0.0, 0.0));
/// let q = (Vector3::new(1.0, -1.0, 1.0), Vector3::new(1.0, 1.0, 1.0));
/// let contact = closest_points_between_segments(&p, &q);
/// assert!((contact.distance - 1.0).abs() < 1e-12);
/// assert!((contact.sc - 0.5).abs() < 1e-12);
/// assert!((contact.tc - 0.5).abs() < 1e-12);
/// ```
pub fn closest_points_between_segments(
    p: &(Vector3<f64>, Vector3<f64>),
    q: &(Vector3<f64>, Vector3<f64>),
) -> SegmentContact {
    let u = p.1 - p.0;
    let v = q.1 - q.0;
    let w = p.0 - q.0;
    let a = u.dot(&u);
    let b = u.dot(&v);
    let c = v.dot(&v);
    let d = u.dot(&w);
    let e = v.dot(&w);

    // Degenerate segments reduce to the point-to-line problem
    if a < PARALLEL_EPSILON && c < PARALLEL_EPSILON {
        return SegmentContact {
            distance: w.norm(),
            sc: 0.0,
            tc: 0.0,
            separation: w,
        };
    }
    if a < PARALLEL_EPSILON {
        let (distance, nearest, tc) = nearest_point_from_point_to_line(&p.0, q);
        return SegmentContact {
            distance,
            sc: 0.0,
            tc,
            separation: p.0 - nearest,
        };
    }
    if c < PARALLEL_EPSILON {
        let (distance, nearest, sc) = nearest_point_from_point_to_line(&q.0, p);
        return SegmentContact {
            distance,
            sc,
            tc: 0.0,
            separation: nearest - q.0,
        };
    }

    let denominator = a * c - b * b;
    let mut s_denom = denominator;
    let mut t_denom = denominator;
    let mut s_num;
    let mut t_num;

    if denominator < PARALLEL_EPSILON {
        s_num = 0.0;
        s_denom = 1.0;
        t_num = e;
        t_denom = c;
    } else {
        s_num = b * e - c * d;
        t_num = a * e - b * d;
        if s_num < 0.0 {
            s_num = 0.0;
            t_num = e;
            t_denom = c;
        } else if s_num > s_denom {
            s_num = s_denom;
            t_num = e + b;
            t_denom = c;
        }
    }

    if t_num < 0.0 {
        t_num = 0.0;
        if -d < 0.0 {
            s_num = 0.0;
        } else if -d > a {
            s_num = s_denom;
        } else {
            s_num = -d;
            s_denom = a;
        }
    } else if t_num > t_denom {
        t_num = t_denom;
        if -d + b < 0.0 {
            s_num = 0.0;
        } else if -d + b > a {
            s_num = s_denom;
        } else {
            s_num = -d + b;
            s_denom = a;
        }
    }

    let sc = if s_num.abs() < PARALLEL_EPSILON {
        0.0
    } else {
        s_num / s_denom
    };
    let tc = if t_num.abs() < PARALLEL_EPSILON {
        0.0
    } else {
        t_num / t_denom
    };
    let separation = w + u * sc - v * tc;
    SegmentContact {
        distance: separation.norm(),
        sc,
        tc,
        separation,
    }
}
