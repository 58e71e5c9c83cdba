//! Planes and six-plane convex clip volumes.
//!
//! A [`ClipVolume`] is the region on the positive side of all six of its
//! planes. Plane normals point into the volume, so `distance >= 0` means
//! "inside" and a point exactly on a plane counts as inside.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};
use serde::{Deserialize, Serialize};

use crate::constants::CLIP_PLANE_COUNT;
use crate::types::BoundingBox;

/// A plane in Hessian form: `distance(p) = normal . p + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl Default for Plane {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

impl Plane {
    /// A degenerate plane that every point lies on, so it never rejects anything.
    pub const UNBOUNDED: Plane = Plane {
        normal: Vec3::ZERO,
        offset: 0.0,
    };

    pub fn new(normal: Vec3, offset: f32) -> Self {
        Self { normal, offset }
    }

    /// Plane through `point` whose positive side faces along `normal`
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let n = normal.normalize_or_zero();
        Self {
            normal: n,
            offset: -n.dot(point),
        }
    }

    /// Build from packed `(a, b, c, d)` coefficients and normalize.
    ///
    /// Coefficients with a zero-length normal produce [`Plane::UNBOUNDED`].
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let length = coefficients.xyz().length();
        if length <= f32::EPSILON {
            return Self::UNBOUNDED;
        }
        Self {
            normal: coefficients.xyz() / length,
            offset: coefficients.w / length,
        }
    }

    /// Signed distance from the plane; positive on the side the normal faces
    #[inline]
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.offset
    }

    /// The same plane facing the other way
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            offset: -self.offset,
        }
    }

    /// Intersection point of three planes, if they meet in a single point
    pub fn intersect3(a: &Plane, b: &Plane, c: &Plane) -> Option<Vec3> {
        let bc = b.normal.cross(c.normal);
        let denom = a.normal.dot(bc);
        if denom.abs() <= 1e-8 {
            return None;
        }
        let ca = c.normal.cross(a.normal);
        let ab = a.normal.cross(b.normal);
        Some(-(bc * a.offset + ca * b.offset + ab * c.offset) / denom)
    }
}

/// Index of a plane inside a [`ClipVolume`], in canonical clip order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PlaneIndex {
    Left = 0,
    Right = 1,
    Bottom = 2,
    Top = 3,
    Near = 4,
    Far = 5,
}

impl PlaneIndex {
    /// All planes in the order they are clipped against
    pub const ALL: [PlaneIndex; CLIP_PLANE_COUNT] = [
        PlaneIndex::Left,
        PlaneIndex::Right,
        PlaneIndex::Bottom,
        PlaneIndex::Top,
        PlaneIndex::Near,
        PlaneIndex::Far,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Result of classifying geometry against a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Entirely behind at least one plane
    Outside,
    /// Straddles at least one plane
    Intersecting,
    /// On the positive side of every plane
    Inside,
}

/// Convex region bounded by six planes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipVolume {
    planes: [Plane; CLIP_PLANE_COUNT],
}

impl Default for ClipVolume {
    /// A volume that contains all of space
    fn default() -> Self {
        Self {
            planes: [Plane::UNBOUNDED; CLIP_PLANE_COUNT],
        }
    }
}

impl ClipVolume {
    /// Build from six explicit planes in [`PlaneIndex`] order
    pub fn from_planes(planes: [Plane; CLIP_PLANE_COUNT]) -> Self {
        Self { planes }
    }

    /// Extract the world-space planes of a projection x view transform.
    ///
    /// Expects the `[0, 1]` clip depth range produced by glam's `*_rh`
    /// projections, so the near plane is `z >= 0` and the far plane `z <= w`.
    pub fn from_matrix(view_proj: &Mat4) -> Self {
        let r0 = view_proj.row(0);
        let r1 = view_proj.row(1);
        let r2 = view_proj.row(2);
        let r3 = view_proj.row(3);

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Volume matching an axis-aligned box. Near is the min-z face, far the max-z face.
    pub fn from_box(bounds: &BoundingBox) -> Self {
        Self {
            planes: [
                Plane::new(Vec3::X, -bounds.min.x),
                Plane::new(Vec3::NEG_X, bounds.max.x),
                Plane::new(Vec3::Y, -bounds.min.y),
                Plane::new(Vec3::NEG_Y, bounds.max.y),
                Plane::new(Vec3::Z, -bounds.min.z),
                Plane::new(Vec3::NEG_Z, bounds.max.z),
            ],
        }
    }

    #[inline]
    pub fn plane(&self, index: PlaneIndex) -> &Plane {
        &self.planes[index.index()]
    }

    #[inline]
    pub fn planes(&self) -> &[Plane; CLIP_PLANE_COUNT] {
        &self.planes
    }

    /// Replace a single plane, leaving the others untouched
    pub fn set_plane(&mut self, index: PlaneIndex, plane: Plane) {
        self.planes[index.index()] = plane;
    }

    /// Builder form of [`ClipVolume::set_plane`]
    pub fn with_plane(mut self, index: PlaneIndex, plane: Plane) -> Self {
        self.set_plane(index, plane);
        self
    }

    pub fn classify_point(&self, point: Vec3) -> Containment {
        if self.is_point_inside(point) {
            Containment::Inside
        } else {
            Containment::Outside
        }
    }

    #[inline]
    pub fn is_point_inside(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance(point) >= 0.0)
    }

    pub fn classify_triangle(&self, v0: Vec3, v1: Vec3, v2: Vec3) -> Containment {
        let mut result = Containment::Inside;
        for plane in &self.planes {
            let behind = [v0, v1, v2]
                .iter()
                .filter(|v| plane.distance(**v) < 0.0)
                .count();
            match behind {
                3 => return Containment::Outside,
                0 => {}
                _ => result = Containment::Intersecting,
            }
        }
        result
    }

    /// Conservative overlap test: false only when the triangle is entirely
    /// behind a single plane.
    pub fn is_triangle_inside(&self, v0: Vec3, v1: Vec3, v2: Vec3) -> bool {
        self.classify_triangle(v0, v1, v2) != Containment::Outside
    }

    pub fn classify_box(&self, min: Vec3, max: Vec3) -> Containment {
        let mut result = Containment::Inside;
        for plane in &self.planes {
            // Corner furthest along the normal, and the one furthest against it
            let positive = Vec3::select(plane.normal.cmpge(Vec3::ZERO), max, min);
            let negative = Vec3::select(plane.normal.cmpge(Vec3::ZERO), min, max);

            if plane.distance(positive) < 0.0 {
                return Containment::Outside;
            }
            if plane.distance(negative) < 0.0 {
                result = Containment::Intersecting;
            }
        }
        result
    }

    /// Conservative overlap test for an axis-aligned box
    pub fn is_box_inside(&self, min: Vec3, max: Vec3) -> bool {
        self.classify_box(min, max) != Containment::Outside
    }

    /// Whether a sphere overlaps the volume
    pub fn is_sphere_inside(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance(center) >= -radius)
    }

    /// The 8 corner points, indexed by bit pattern
    /// (bit 0 = right, bit 1 = top, bit 2 = far).
    ///
    /// Returns `None` for unbounded or degenerate volumes.
    pub fn corners(&self) -> Option<[Vec3; 8]> {
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let x = if i & 1 != 0 { PlaneIndex::Right } else { PlaneIndex::Left };
            let y = if i & 2 != 0 { PlaneIndex::Top } else { PlaneIndex::Bottom };
            let z = if i & 4 != 0 { PlaneIndex::Far } else { PlaneIndex::Near };
            *corner = Plane::intersect3(self.plane(x), self.plane(y), self.plane(z))?;
        }
        Some(corners)
    }

    /// Axis-aligned bounds of the volume's corners
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.corners()
            .map(|corners| BoundingBox::from_points(corners.iter().copied()))
    }
}
