//! Per-slice regenerate + copy jobs.
//!
//! A job owns its slice cache for the duration of the frame, so jobs never
//! share mutable state. The sink allocation is the only synchronized step,
//! which lets the whole batch run on the rayon pool.

use decals::{
    remap_into, BoundingBox, ClipPlanes, ClipVolume, DecalPrimitiveRef, GeometrySource, Plane,
    PlaneIndex, RegenerateOutcome, SinkError, SinkFrame, TextureProjector, UvRect,
};
use glam::{Mat4, Vec3, Vec4};
use rayon::prelude::*;
use tracing::trace;

use crate::caster::CasterId;
use crate::constants::{MOVE_EPSILON, SHADOW_REACH};
use crate::packer::AtlasRect;

use super::{shadow_settings, SliceCache};

/// Radius of the sphere a slice projection has to cover
pub(crate) fn slice_radius(bounds: &BoundingBox, extent_padding: f32) -> f32 {
    bounds.half_extents().length() + extent_padding
}

/// Orthographic light-space projection focused on `bounds`, plus a near
/// plane through the point of the bounds closest to the light.
pub(crate) fn slice_projection(
    bounds: &BoundingBox,
    light_dir: Vec3,
    extent_padding: f32,
) -> (Mat4, Plane) {
    let radius = slice_radius(bounds, extent_padding).max(f32::EPSILON);
    let center = bounds.center();
    let eye = center - light_dir * radius;
    let up = if light_dir.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };

    let view = Mat4::look_to_rh(eye, light_dir, up);
    let proj = Mat4::orthographic_rh(
        -radius,
        radius,
        -radius,
        radius,
        0.0,
        radius * (1.0 + SHADOW_REACH),
    );

    let top = bounds
        .corners()
        .into_iter()
        .min_by(|a, b| a.dot(light_dir).total_cmp(&b.dot(light_dir)))
        .unwrap_or(center);

    (proj * view, Plane::from_point_normal(top, light_dir))
}

/// Work item for one packed slice
pub(crate) struct SliceJob {
    pub(crate) key: CasterId,
    /// Index of the slice group within the frame
    pub(crate) group: usize,
    pub(crate) bounds: BoundingBox,
    pub(crate) viewport: AtlasRect,
    pub(crate) uv: UvRect,
    pub(crate) fade: f32,
    pub(crate) cache: SliceCache,
}

/// Result of running one job
pub(crate) struct SliceResult {
    pub(crate) regenerated: Option<RegenerateOutcome>,
    /// `Ok(None)` when there was nothing to draw
    pub(crate) drawn: Result<Option<DecalPrimitiveRef>, SinkError>,
}

/// Frame-wide inputs shared by every job
pub(crate) struct JobContext<'a, 'f, S: ?Sized> {
    pub(crate) source: &'a S,
    pub(crate) frame: &'a SinkFrame<'f>,
    pub(crate) planes: ClipPlanes,
    pub(crate) light_dir: Vec3,
    pub(crate) extent_padding: f32,
}

impl SliceJob {
    fn run<S>(&mut self, ctx: &JobContext<'_, '_, S>) -> SliceResult
    where
        S: GeometrySource + ?Sized,
    {
        if !self.cache.bounds.contains_box(&self.bounds, MOVE_EPSILON) {
            self.cache.primitives.mark_dirty();
        }

        let regenerated = if self.cache.primitives.is_dirty() {
            let (view_proj, near_plane) = slice_projection(&self.bounds, ctx.light_dir, ctx.extent_padding);
            let volume = ClipVolume::from_matrix(&view_proj).with_plane(PlaneIndex::Near, near_plane);
            *self.cache.primitives.settings_mut() =
                shadow_settings(self.key, ctx.light_dir).with_custom_volume(volume);

            let projector = TextureProjector::new(view_proj, UvRect::UNIT);
            let outcome = self
                .cache
                .primitives
                .regenerate(ctx.source, &view_proj, &projector, ctx.planes);
            self.cache.view_proj = view_proj;
            self.cache.bounds = self.bounds;
            Some(outcome)
        } else {
            None
        };

        let drawn = self.copy_to_sink(ctx.frame);
        SliceResult { regenerated, drawn }
    }

    fn copy_to_sink(&self, frame: &SinkFrame<'_>) -> Result<Option<DecalPrimitiveRef>, SinkError> {
        let primitives = &self.cache.primitives;
        if primitives.is_empty() {
            return Ok(None);
        }

        let mut slot = frame.allocate(primitives.vertices().len(), 0)?;
        let vertices = slot.vertices_mut();
        vertices.copy_from_slice(primitives.vertices());
        remap_into(vertices, &self.uv, Vec4::new(1.0, 1.0, 1.0, self.fade));

        trace!(
            "SliceJob {:?}: {} triangles into {:?}",
            self.key,
            primitives.triangle_count(),
            self.viewport
        );
        Ok(Some(slot.finish(primitives.settings().user_data)))
    }
}

/// Run every job, on the rayon pool when `parallel` is set.
///
/// Results come back in job order either way.
pub(crate) fn run_jobs<S>(jobs: &mut [SliceJob], ctx: &JobContext<'_, '_, S>, parallel: bool) -> Vec<SliceResult>
where
    S: GeometrySource + ?Sized,
{
    if parallel {
        jobs.par_iter_mut().map(|job| job.run(ctx)).collect()
    } else {
        jobs.iter_mut().map(|job| job.run(ctx)).collect()
    }
}
