//! Regeneration of a primitive set: gather, project, clip.

use glam::Mat4;
use tracing::{debug, trace};

use crate::clipper::{clip_to_volume, ClipPlanes};
use crate::projector::TextureProjector;
use crate::source::GeometrySource;
use crate::volume::ClipVolume;

use super::DecalPrimitiveSet;

/// Summary of one regeneration pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegenerateOutcome {
    /// Triangles the source appended before clipping
    pub raw_triangles: usize,
    /// Triangles left after clipping
    pub triangles: usize,
    /// Whether the set came out clean (non-empty)
    pub clean: bool,
}

impl DecalPrimitiveSet {
    /// Rebuild the cached geometry from `source`.
    ///
    /// Unless the settings hold a custom volume, the clip volume is derived
    /// from `view_proj` first. Texture coordinates are projected on the raw
    /// geometry, before clipping, so the UV basis does not depend on how the
    /// triangles were cut. The set stays dirty if nothing survives.
    pub fn regenerate<S>(
        &mut self,
        source: &S,
        view_proj: &Mat4,
        projector: &TextureProjector,
        planes: ClipPlanes,
    ) -> RegenerateOutcome
    where
        S: GeometrySource + ?Sized,
    {
        self.vertices.clear();
        self.bounds = crate::types::BoundingBox::empty();
        self.dirty = true;

        if !self.settings.custom_volume {
            self.settings.clip_volume = ClipVolume::from_matrix(view_proj);
        }
        let volume = self.settings.clip_volume;

        source.decal_polygons(self, Some(&volume));
        let raw_triangles = self.triangle_count();

        if !self.settings.skip_texcoords {
            let failed = projector.project_parallel(&mut self.vertices);
            if failed > 0 {
                trace!("regenerate: {} vertices on the projector eye plane", failed);
            }
        }

        let mut scratch = Vec::with_capacity(self.vertices.len());
        clip_to_volume(&mut self.vertices, &volume, planes, &mut scratch);
        self.recompute_bounds();

        let triangles = self.triangle_count();
        self.dirty = triangles == 0;

        debug!(
            "regenerate: {} raw triangles, {} after clipping (user_data {})",
            raw_triangles, triangles, self.settings.user_data
        );

        RegenerateOutcome {
            raw_triangles,
            triangles,
            clean: !self.dirty,
        }
    }

    /// Regenerate only if the set is dirty. Returns `None` when the cached
    /// geometry was reused.
    pub fn refresh<S>(
        &mut self,
        source: &S,
        view_proj: &Mat4,
        projector: &TextureProjector,
        planes: ClipPlanes,
    ) -> Option<RegenerateOutcome>
    where
        S: GeometrySource + ?Sized,
    {
        if !self.dirty {
            return None;
        }
        Some(self.regenerate(source, view_proj, projector, planes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CLIP_EPSILON;
    use crate::primitives::ClipSettings;
    use crate::types::{BoundingBox, DecalVertex, UvRect};
    use glam::Vec3;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Emits a fixed triangle list and counts how often it was queried
    struct FixedSource {
        triangles: Vec<[Vec3; 3]>,
        queries: AtomicUsize,
    }

    impl FixedSource {
        fn new(triangles: Vec<[Vec3; 3]>) -> Self {
            Self {
                triangles,
                queries: AtomicUsize::new(0),
            }
        }
    }

    impl GeometrySource for FixedSource {
        fn decal_polygons(&self, set: &mut DecalPrimitiveSet, _frustum: Option<&ClipVolume>) {
            self.queries.fetch_add(1, Ordering::Relaxed);
            for [a, b, c] in &self.triangles {
                set.push_triangle(DecalVertex::new(*a), DecalVertex::new(*b), DecalVertex::new(*c));
            }
        }
    }

    /// Unit quad in the XY plane at z = 0.5, facing +Z
    fn quad(half: f32) -> Vec<[Vec3; 3]> {
        let z = 0.5;
        vec![
            [
                Vec3::new(-half, -half, z),
                Vec3::new(half, -half, z),
                Vec3::new(half, half, z),
            ],
            [
                Vec3::new(-half, -half, z),
                Vec3::new(half, half, z),
                Vec3::new(-half, half, z),
            ],
        ]
    }

    #[test]
    fn test_quad_inside_identity_volume() {
        let source = FixedSource::new(quad(0.5));
        let mut set = DecalPrimitiveSet::new(ClipSettings::facing(Vec3::Z));
        let projector = TextureProjector::new(Mat4::IDENTITY, UvRect::UNIT);

        let outcome = set.regenerate(&source, &Mat4::IDENTITY, &projector, ClipPlanes::All);

        assert_eq!(outcome.raw_triangles, 2);
        assert_eq!(outcome.triangles, 2);
        assert!(outcome.clean);
        assert!(!set.is_dirty());
        assert_eq!(set.vertices().len(), 6);
        for v in set.vertices() {
            assert!(UvRect::UNIT.contains(v.texcoord(), CLIP_EPSILON));
        }

        let expected = BoundingBox::new(Vec3::new(-0.5, -0.5, 0.5), Vec3::new(0.5, 0.5, 0.5));
        assert_eq!(*set.bounds(), expected);
    }

    #[test]
    fn test_oversized_quad_is_clipped_to_volume() {
        let source = FixedSource::new(quad(3.0));
        let mut set = DecalPrimitiveSet::new(ClipSettings::facing(Vec3::Z));
        let projector = TextureProjector::new(Mat4::IDENTITY, UvRect::UNIT);

        set.regenerate(&source, &Mat4::IDENTITY, &projector, ClipPlanes::All);

        let bounds = set.bounds();
        assert!(bounds.min.x >= -1.0 - CLIP_EPSILON && bounds.max.x <= 1.0 + CLIP_EPSILON);
        assert!(bounds.min.y >= -1.0 - CLIP_EPSILON && bounds.max.y <= 1.0 + CLIP_EPSILON);
        // UVs came from the unclipped geometry and were interpolated, not re-derived
        for v in set.vertices() {
            let uv = v.texcoord();
            assert!(uv.x >= -CLIP_EPSILON && uv.x <= 1.0 + CLIP_EPSILON);
            assert!(uv.y >= -CLIP_EPSILON && uv.y <= 1.0 + CLIP_EPSILON);
        }
    }

    #[test]
    fn test_without_clipping_keeps_raw_geometry() {
        let source = FixedSource::new(quad(3.0));
        let mut set = DecalPrimitiveSet::new(ClipSettings::facing(Vec3::Z));
        let projector = TextureProjector::new(Mat4::IDENTITY, UvRect::UNIT);

        set.regenerate(&source, &Mat4::IDENTITY, &projector, ClipPlanes::None);
        assert_eq!(set.triangle_count(), 2);
        assert!((set.bounds().max.x - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_source_stays_dirty() {
        let empty = FixedSource::new(Vec::new());
        let mut set = DecalPrimitiveSet::new(ClipSettings::facing(Vec3::Z));
        let projector = TextureProjector::new(Mat4::IDENTITY, UvRect::UNIT);

        let outcome = set.regenerate(&empty, &Mat4::IDENTITY, &projector, ClipPlanes::All);
        assert!(!outcome.clean);
        assert!(set.is_dirty());

        // Retried on the next activation, and succeeds once geometry shows up
        let filled = FixedSource::new(quad(0.5));
        let outcome = set.refresh(&filled, &Mat4::IDENTITY, &projector, ClipPlanes::All);
        assert_eq!(outcome.map(|o| o.triangles), Some(2));
        assert!(!set.is_dirty());
    }

    #[test]
    fn test_refresh_reuses_clean_set() {
        let source = FixedSource::new(quad(0.5));
        let mut set = DecalPrimitiveSet::new(ClipSettings::facing(Vec3::Z));
        let projector = TextureProjector::new(Mat4::IDENTITY, UvRect::UNIT);

        assert!(set.refresh(&source, &Mat4::IDENTITY, &projector, ClipPlanes::All).is_some());
        assert!(set.refresh(&source, &Mat4::IDENTITY, &projector, ClipPlanes::All).is_none());
        assert_eq!(source.queries.load(Ordering::Relaxed), 1);

        set.mark_dirty();
        assert!(set.refresh(&source, &Mat4::IDENTITY, &projector, ClipPlanes::All).is_some());
        assert_eq!(source.queries.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_custom_volume_is_kept() {
        let volume = ClipVolume::from_box(&BoundingBox::new(Vec3::splat(-0.25), Vec3::splat(1.0)));
        let source = FixedSource::new(quad(0.5));
        let mut set = DecalPrimitiveSet::new(ClipSettings::facing(Vec3::Z).with_custom_volume(volume));
        let projector = TextureProjector::new(Mat4::IDENTITY, UvRect::UNIT);

        set.regenerate(&source, &Mat4::IDENTITY, &projector, ClipPlanes::All);
        assert_eq!(set.settings().clip_volume, volume);
        assert!(set.bounds().min.x >= -0.25 - CLIP_EPSILON);
    }

    #[test]
    fn test_skip_texcoords_leaves_uvs() {
        let source = FixedSource::new(quad(0.5));
        let mut settings = ClipSettings::facing(Vec3::Z);
        settings.skip_texcoords = true;
        let mut set = DecalPrimitiveSet::new(settings);
        let projector = TextureProjector::new(Mat4::IDENTITY, UvRect::new(0.5, 0.5, 1.0, 1.0));

        set.regenerate(&source, &Mat4::IDENTITY, &projector, ClipPlanes::All);
        assert!(set.vertices().iter().all(|v| v.uv == [0.0, 0.0]));
    }
}
