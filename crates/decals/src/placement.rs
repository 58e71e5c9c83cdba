//! One-shot world decals placed at a surface point.
//!
//! A placement describes a box centered on the hit point, oriented by the
//! surface normal and a tangent. Its six faces become the clip volume and an
//! orthographic projection across the box face provides texture coordinates:
//! `u` runs along the tangent, `v` runs against the binormal.

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clipper::ClipPlanes;
use crate::constants::DECAL_DEPTH_SCALE;
use crate::primitives::{ClipSettings, DecalPrimitiveSet};
use crate::projector::TextureProjector;
use crate::source::GeometrySource;
use crate::types::UvRect;
use crate::volume::{ClipVolume, Plane};

/// Where and how large a world decal is
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecalPlacement {
    pub center: Vec3,
    /// Surface normal at the center
    pub normal: Vec3,
    /// Direction of increasing `u`. Zero lets the placement pick one.
    pub tangent: Vec3,
    pub width: f32,
    pub height: f32,
}

impl DecalPlacement {
    /// Square decal of side `size` with an automatically chosen tangent
    pub fn new(center: Vec3, normal: Vec3, size: f32) -> Self {
        Self {
            center,
            normal,
            tangent: Vec3::ZERO,
            width: size,
            height: size,
        }
    }

    pub fn with_tangent(mut self, tangent: Vec3) -> Self {
        self.tangent = tangent;
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Reach of the box along the normal, on each side of the center
    pub fn depth(&self) -> f32 {
        self.width * DECAL_DEPTH_SCALE
    }

    /// Orthonormal `(tangent, binormal, normal)` frame
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        let normal = self.normal.normalize_or(Vec3::Y);

        // Project the requested tangent onto the surface
        let mut tangent = (self.tangent - normal * self.tangent.dot(normal)).normalize_or_zero();
        if tangent == Vec3::ZERO {
            tangent = normal.cross(Vec3::splat(0.5)).normalize_or_zero();
        }
        if tangent == Vec3::ZERO {
            tangent = normal.any_orthonormal_vector();
        }
        let binormal = normal.cross(tangent).normalize_or_zero();
        (tangent, binormal, normal)
    }

    /// The decal box as six inward-facing planes
    pub fn clip_volume(&self) -> ClipVolume {
        let (tangent, binormal, normal) = self.basis();
        let half_width = self.width * 0.5;
        let half_height = self.height * 0.5;
        let depth = self.depth();

        let d = self.center.dot(tangent);
        let left = Plane::new(tangent, half_width - d);
        let right = Plane::new(-tangent, half_width + d);

        let d = self.center.dot(binormal);
        let bottom = Plane::new(binormal, half_height - d);
        let top = Plane::new(-binormal, half_height + d);

        let d = self.center.dot(normal);
        let back = Plane::new(normal, depth - d);
        let front = Plane::new(-normal, depth + d);

        ClipVolume::from_planes([left, right, bottom, top, back, front])
    }

    /// Orthographic projection whose clip space spans the decal box.
    ///
    /// Combined with [`TextureProjector`] this gives
    /// `u = dot(p - center, tangent) / width + 0.5`.
    pub fn projection(&self) -> Mat4 {
        let (tangent, binormal, normal) = self.basis();
        let sz = 0.5 / self.depth().max(f32::EPSILON);
        let sx = 2.0 / self.width.max(f32::EPSILON);
        let sy = 2.0 / self.height.max(f32::EPSILON);

        // The projector mirrors clip x, so the x row points against the tangent
        let row_x = (-tangent * sx).extend(tangent.dot(self.center) * sx);
        let row_y = (binormal * sy).extend(-binormal.dot(self.center) * sy);
        let row_z = (normal * sz).extend(0.5 - normal.dot(self.center) * sz);

        Mat4::from_cols(row_x, row_y, row_z, Vec4::W).transpose()
    }

    pub fn projector(&self, dest: UvRect) -> TextureProjector {
        TextureProjector::new(self.projection(), dest)
    }

    /// Settings receiving surfaces that face along the normal, clipped to the box
    pub fn clip_settings(&self) -> ClipSettings {
        let (_, _, normal) = self.basis();
        ClipSettings::facing(normal).with_custom_volume(self.clip_volume())
    }

    /// Build the decal geometry in one go
    pub fn spawn<S>(&self, source: &S, dest: UvRect, planes: ClipPlanes) -> DecalPrimitiveSet
    where
        S: GeometrySource + ?Sized,
    {
        let mut set = DecalPrimitiveSet::new(self.clip_settings());
        let projection = self.projection();
        let outcome = set.regenerate(source, &projection, &self.projector(dest), planes);
        debug!(
            "DecalPlacement: spawned at {:?}, {} triangles",
            self.center, outcome.triangles
        );
        set
    }
}
