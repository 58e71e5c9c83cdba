//! Per-frame shadow decal orchestration.
//!
//! [`ShadowOrchestrator`] owns everything that lives across frames: one
//! cached [`DecalPrimitiveSet`] per atlas slice, the atlas packer and the
//! shared geometry sink. Each call to [`ShadowOrchestrator::render_frame`]
//! packs the visible casters into slices, refreshes dirty caches, copies the
//! geometry into the sink and drives the [`SliceRenderer`](crate::SliceRenderer).

mod frame;
mod jobs;

use std::collections::HashMap;

use decals::{
    shadow_filter, BoundingBox, ClipPlanes, ClipSettings, DecalPrimitiveRef, DecalPrimitiveSet,
    MaterialFlags, SharedGeometrySink,
};
use glam::{Mat4, Vec3};
use tracing::debug;
use umbra_config::{ConfigError, DecalConfig};

use crate::caster::CasterId;
use crate::packer::RectanglePacker;

/// What happened during one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Casters handed to the frame
    pub considered: usize,
    pub skipped_no_geometry: usize,
    pub skipped_culled: usize,
    pub skipped_faded: usize,
    /// Atlas slices requested from the packer
    pub slices: usize,
    /// The atlas could not hold every slice, so nothing was drawn
    pub overflowed: bool,
    /// Slices whose cached geometry was rebuilt
    pub regenerated: usize,
    /// Slices drawn from cached geometry
    pub reused: usize,
    /// Slices with no geometry after clipping
    pub empty: usize,
    /// Slices dropped because the sink ran out of space
    pub sink_failures: usize,
    /// Whether every cached set was invalidated at the start of the frame
    pub invalidated: bool,
    /// Caster draws issued to the renderer
    pub draws: usize,
    /// Finished sink ranges, valid until the next frame
    pub primitives: Vec<DecalPrimitiveRef>,
}

/// Cached geometry of one slice, keyed by the slice's group leader
#[derive(Debug, Clone)]
pub(crate) struct SliceCache {
    pub(crate) primitives: DecalPrimitiveSet,
    /// Projection the cached texture coordinates were generated with
    pub(crate) view_proj: Mat4,
    /// Group bounds at generation time
    pub(crate) bounds: BoundingBox,
}

impl SliceCache {
    fn new(key: CasterId) -> Self {
        Self {
            primitives: DecalPrimitiveSet::new(shadow_settings(key, Vec3::NEG_Y)),
            view_proj: Mat4::IDENTITY,
            bounds: BoundingBox::empty(),
        }
    }
}

/// Clip settings for shadows cast by light travelling along `light_dir`
pub(crate) fn shadow_settings(key: CasterId, light_dir: Vec3) -> ClipSettings {
    ClipSettings::facing(-light_dir)
        .avoiding(MaterialFlags::NO_DECALS | MaterialFlags::SKY | MaterialFlags::DYNAMIC)
        .with_filter(shadow_filter)
        .with_user_data(key.0 as u64)
}

/// Drives the shadow atlas from frame to frame
#[derive(Debug)]
pub struct ShadowOrchestrator {
    config: DecalConfig,
    sink: SharedGeometrySink,
    /// Payload is the index of the slice group within the frame
    packer: RectanglePacker<usize>,
    caches: HashMap<CasterId, SliceCache>,
    /// Last seen transform of every caster
    transforms: HashMap<CasterId, Mat4>,
    /// Light direction the caches were last invalidated for
    last_light_dir: Option<Vec3>,
    invalidate_pending: bool,
    frame_count: u64,
}

impl ShadowOrchestrator {
    pub fn new(config: DecalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!(
            "ShadowOrchestrator: {}px atlas, sink {} vertices / {} indices",
            config.atlas_size, config.sink_vertex_capacity, config.sink_index_capacity
        );
        Ok(Self {
            sink: SharedGeometrySink::new(config.sink_vertex_capacity, config.sink_index_capacity),
            packer: RectanglePacker::with_padding(config.slice_padding),
            caches: HashMap::new(),
            transforms: HashMap::new(),
            last_light_dir: None,
            invalidate_pending: false,
            frame_count: 0,
            config,
        })
    }

    pub fn config(&self) -> &DecalConfig {
        &self.config
    }

    /// Geometry of the most recent frame; resolves the refs in its report
    pub fn sink(&self) -> &SharedGeometrySink {
        &self.sink
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Request that every cached set is rebuilt on the next frame
    pub fn invalidate_all(&mut self) {
        self.invalidate_pending = true;
    }

    /// Cached geometry of the slice led by `id`, if there is one
    pub fn primitives(&self, id: CasterId) -> Option<&DecalPrimitiveSet> {
        self.caches.get(&id).map(|cache| &cache.primitives)
    }

    pub fn cached_slices(&self) -> usize {
        self.caches.len()
    }

    fn clip_planes(&self) -> ClipPlanes {
        ClipPlanes::from_debug_settings(self.config.clip_enabled, self.config.debug_clip_plane)
    }

    /// Mark every cache dirty if requested or if the light turned far enough
    /// from the direction the caches were last rebuilt for
    fn apply_invalidation(&mut self, light_dir: Vec3) -> bool {
        let light_turned = self
            .last_light_dir
            .is_some_and(|built_for| built_for.dot(light_dir) < self.config.light_invalidate_cos());

        let invalidate = light_turned || self.invalidate_pending || self.config.invalidate_all;
        self.invalidate_pending = false;
        if invalidate || self.last_light_dir.is_none() {
            self.last_light_dir = Some(light_dir);
        }
        if invalidate {
            debug!(
                "ShadowOrchestrator: invalidating {} cached slices (light turned: {})",
                self.caches.len(),
                light_turned
            );
            for cache in self.caches.values_mut() {
                cache.primitives.mark_dirty();
            }
        }
        invalidate
    }
}
