//! Texture coordinate projection
//!
//! Maps world-space vertex positions through a projective transform into a
//! destination rectangle of the atlas. Each vertex is handled independently,
//! so the bulk variants can be split across threads freely.

use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};
use rayon::prelude::*;

use crate::constants::PARALLEL_PROJECT_THRESHOLD;
use crate::types::{DecalVertex, UvRect};

/// Projects positions into a destination UV rectangle and tints vertex colors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureProjector {
    /// Projection x view transform used to derive texture coordinates
    pub transform: Mat4,
    /// Destination rectangle in normalized atlas space
    pub dest: UvRect,
    /// Component-wise color multiplier
    pub tint: Vec4,
}

impl TextureProjector {
    /// Projector onto `dest` with a white tint
    pub fn new(transform: Mat4, dest: UvRect) -> Self {
        Self {
            transform,
            dest,
            tint: Vec4::ONE,
        }
    }

    pub fn with_tint(mut self, tint: Vec4) -> Self {
        self.tint = tint;
        self
    }

    /// Texture coordinate for a world-space position.
    ///
    /// The horizontal clip coordinate is negated before the perspective
    /// divide. NDC x = -1 lands on the rectangle's left edge and NDC y = +1
    /// on its top edge. Returns `None` when the point sits on the projection's
    /// eye plane (w = 0).
    pub fn project_point(&self, position: Vec3) -> Option<Vec2> {
        let mut clip = self.transform * position.extend(1.0);
        if clip.w.abs() <= f32::EPSILON {
            return None;
        }
        clip.x = -clip.x;
        let ndc = clip.xy() / clip.w;
        let t = (ndc + Vec2::ONE) * 0.5;

        let left_top = self.dest.left_top;
        let right_bottom = self.dest.right_bottom;
        Some(Vec2::new(
            left_top.x + (right_bottom.x - left_top.x) * t.x,
            right_bottom.y + (left_top.y - right_bottom.y) * t.y,
        ))
    }

    /// Overwrite the vertex UV and multiply its color by the tint.
    ///
    /// A vertex on the eye plane keeps its previous UV but is still tinted.
    #[inline]
    pub fn project_vertex(&self, vertex: &mut DecalVertex) -> bool {
        let projected = self.project_point(vertex.pos());
        if let Some(uv) = projected {
            vertex.uv = uv.to_array();
        }
        vertex.color = (vertex.rgba() * self.tint).to_array();
        projected.is_some()
    }

    /// Project every vertex in order. Returns how many could not be projected.
    pub fn project_all(&self, vertices: &mut [DecalVertex]) -> usize {
        vertices
            .iter_mut()
            .map(|v| self.project_vertex(v))
            .filter(|ok| !ok)
            .count()
    }

    /// Same as [`TextureProjector::project_all`], split over the rayon pool
    /// for large inputs.
    pub fn project_parallel(&self, vertices: &mut [DecalVertex]) -> usize {
        if vertices.len() < PARALLEL_PROJECT_THRESHOLD {
            return self.project_all(vertices);
        }
        vertices
            .par_iter_mut()
            .map(|v| self.project_vertex(v))
            .filter(|ok| !ok)
            .count()
    }
}

/// Map slice-local UVs in `[0, 1]²` into `rect` and multiply colors by `tint`.
///
/// Used when cached geometry is copied into a freshly packed slice. The
/// mapping is affine, so it gives the same result as projecting straight into
/// `rect` before clipping.
pub fn remap_into(vertices: &mut [DecalVertex], rect: &UvRect, tint: Vec4) {
    let origin = rect.left_top;
    let size = rect.size();
    for vertex in vertices {
        vertex.uv = (origin + vertex.texcoord() * size).to_array();
        vertex.color = (vertex.rgba() * tint).to_array();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipper::clip_triangles;
    use crate::volume::Plane;

    const TOLERANCE: f32 = 1e-5;

    #[test]
    fn test_identity_projection_corners() {
        let projector = TextureProjector::new(Mat4::IDENTITY, UvRect::UNIT);

        // Horizontal axis is mirrored: x = +1 lands on the left edge
        let uv = projector.project_point(Vec3::new(1.0, 1.0, 0.0)).unwrap();
        assert!((uv - Vec2::new(0.0, 0.0)).length() < TOLERANCE);

        let uv = projector.project_point(Vec3::new(-1.0, -1.0, 0.0)).unwrap();
        assert!((uv - Vec2::new(1.0, 1.0)).length() < TOLERANCE);

        let uv = projector.project_point(Vec3::ZERO).unwrap();
        assert!((uv - Vec2::splat(0.5)).length() < TOLERANCE);
    }

    #[test]
    fn test_projection_into_sub_rect() {
        let rect = UvRect::new(0.5, 0.25, 0.75, 0.5);
        let projector = TextureProjector::new(Mat4::IDENTITY, rect);

        for x in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            for y in [-1.0, 0.0, 1.0] {
                let uv = projector.project_point(Vec3::new(x, y, 0.0)).unwrap();
                assert!(rect.contains(uv, TOLERANCE), "{uv:?} outside {rect:?}");
            }
        }
    }

    #[test]
    fn test_perspective_divide() {
        let projector = TextureProjector::new(Mat4::IDENTITY, UvRect::UNIT);
        let mut scaled = Mat4::IDENTITY;
        scaled.w_axis = Vec4::new(0.0, 0.0, 0.0, 2.0);
        let halved = TextureProjector::new(scaled, UvRect::UNIT);

        let a = projector.project_point(Vec3::new(0.5, 0.5, 0.0)).unwrap();
        let b = halved.project_point(Vec3::new(1.0, 1.0, 0.0)).unwrap();
        assert!((a - b).length() < TOLERANCE);
    }

    #[test]
    fn test_eye_plane_is_rejected() {
        let mut transform = Mat4::IDENTITY;
        transform.w_axis = Vec4::ZERO;
        let projector = TextureProjector::new(transform, UvRect::UNIT);
        assert!(projector.project_point(Vec3::ZERO).is_none());

        let mut vertex = DecalVertex::new(Vec3::ZERO);
        vertex.uv = [0.3, 0.7];
        assert!(!projector.project_vertex(&mut vertex));
        assert_eq!(vertex.uv, [0.3, 0.7]);
    }

    #[test]
    fn test_tint_multiplies_color() {
        let projector = TextureProjector::new(Mat4::IDENTITY, UvRect::UNIT)
            .with_tint(Vec4::new(1.0, 0.5, 0.0, 0.25));
        let mut vertex = DecalVertex::with_attributes(Vec3::ZERO, Vec2::ZERO, Vec4::new(0.5, 1.0, 1.0, 1.0));
        projector.project_vertex(&mut vertex);
        assert!((vertex.rgba() - Vec4::new(0.5, 0.5, 0.0, 0.25)).length() < TOLERANCE);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let projector = TextureProjector::new(
            Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 0.0, 10.0),
            UvRect::new(0.0, 0.0, 0.5, 0.5),
        );
        let count = PARALLEL_PROJECT_THRESHOLD + 17;
        let source: Vec<DecalVertex> = (0..count)
            .map(|i| {
                let f = i as f32 / count as f32;
                DecalVertex::new(Vec3::new(f * 20.0 - 10.0, 10.0 - f * 20.0, -1.0))
            })
            .collect();

        let mut serial = source.clone();
        let mut parallel = source;
        assert_eq!(projector.project_all(&mut serial), 0);
        assert_eq!(projector.project_parallel(&mut parallel), 0);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_remap_commutes_with_clipping() {
        let rect = UvRect::new(0.25, 0.5, 0.5, 0.75);
        let local = TextureProjector::new(Mat4::IDENTITY, UvRect::UNIT);
        let direct = TextureProjector::new(Mat4::IDENTITY, rect);
        let plane = Plane::new(Vec3::X, 0.2);
        let triangle = [
            DecalVertex::new(Vec3::new(-0.9, -0.9, 0.0)),
            DecalVertex::new(Vec3::new(0.9, -0.9, 0.0)),
            DecalVertex::new(Vec3::new(0.0, 0.9, 0.0)),
        ];

        // Project locally, clip, then remap
        let mut cached = triangle;
        local.project_all(&mut cached);
        let mut remapped = clip_triangles(&cached, &plane);
        remap_into(&mut remapped, &rect, Vec4::ONE);

        // Project straight into the rect, then clip
        let mut projected = triangle;
        direct.project_all(&mut projected);
        let clipped = clip_triangles(&projected, &plane);

        assert_eq!(remapped.len(), clipped.len());
        for (a, b) in remapped.iter().zip(&clipped) {
            assert!((a.texcoord() - b.texcoord()).length() < TOLERANCE);
        }
    }

    #[test]
    fn test_remap_applies_fade() {
        let mut vertices = [DecalVertex::with_attributes(Vec3::ZERO, Vec2::new(1.0, 0.0), Vec4::ONE)];
        remap_into(&mut vertices, &UvRect::new(0.5, 0.5, 1.0, 1.0), Vec4::new(1.0, 1.0, 1.0, 0.4));
        assert!((vertices[0].texcoord() - Vec2::new(1.0, 0.5)).length() < TOLERANCE);
        assert!((vertices[0].color[3] - 0.4).abs() < TOLERANCE);
    }
}
