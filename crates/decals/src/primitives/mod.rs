//! Per-object decal geometry cache.
//!
//! A [`DecalPrimitiveSet`] holds the clipped and projected triangles for one
//! shadow caster or decal placement, together with the [`ClipSettings`] that
//! produced them. The set is regenerated lazily: only while its dirty flag is
//! raised, and it stays dirty whenever a regeneration produced no triangles so
//! that a temporarily empty caster keeps retrying.

mod filters;
mod regenerate;

pub use filters::{facing_filter, shaded_facing_filter, shadow_filter, triangle_normal};
pub use regenerate::RegenerateOutcome;

use std::fmt;
use std::sync::Arc;

use glam::Vec3;

use crate::types::{BoundingBox, DecalVertex, MaterialFlags};
use crate::volume::ClipVolume;

/// Per-triangle accept/reject predicate.
///
/// Receives the owning settings and the three candidate vertices. It may
/// rewrite the candidates (for example to shade their color) but must not
/// touch anything else.
pub type TriangleFilter = Arc<
    dyn Fn(&ClipSettings, &mut DecalVertex, &mut DecalVertex, &mut DecalVertex) -> bool
        + Send
        + Sync,
>;

/// Settings controlling how a primitive set gathers and clips geometry
#[derive(Clone)]
pub struct ClipSettings {
    /// Surfaces must face this direction to receive the decal
    pub facing_dir: Vec3,
    /// Volume the geometry is clipped against
    pub clip_volume: ClipVolume,
    /// Keep `clip_volume` as is instead of deriving it from the view-projection
    pub custom_volume: bool,
    /// Geometry whose material has any of these flags is skipped
    pub avoid_material_flags: MaterialFlags,
    /// Leave texture coordinates and colors as the source produced them
    pub skip_texcoords: bool,
    /// Opaque caller tag, carried into the sink references
    pub user_data: u64,
    pub triangle_filter: TriangleFilter,
}

impl fmt::Debug for ClipSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipSettings")
            .field("facing_dir", &self.facing_dir)
            .field("clip_volume", &self.clip_volume)
            .field("custom_volume", &self.custom_volume)
            .field("avoid_material_flags", &self.avoid_material_flags)
            .field("skip_texcoords", &self.skip_texcoords)
            .field("user_data", &self.user_data)
            .finish_non_exhaustive()
    }
}

impl Default for ClipSettings {
    fn default() -> Self {
        Self {
            facing_dir: Vec3::Y,
            clip_volume: ClipVolume::default(),
            custom_volume: false,
            avoid_material_flags: MaterialFlags::NO_DECALS,
            skip_texcoords: false,
            user_data: 0,
            triangle_filter: Arc::new(facing_filter),
        }
    }
}

impl ClipSettings {
    /// Default settings receiving geometry that faces `facing_dir`
    pub fn facing(facing_dir: Vec3) -> Self {
        Self {
            facing_dir: facing_dir.normalize_or_zero(),
            ..Self::default()
        }
    }

    /// Use a fixed clip volume instead of deriving one per regeneration
    pub fn with_custom_volume(mut self, volume: ClipVolume) -> Self {
        self.clip_volume = volume;
        self.custom_volume = true;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&ClipSettings, &mut DecalVertex, &mut DecalVertex, &mut DecalVertex) -> bool
            + Send
            + Sync
            + 'static,
    {
        self.triangle_filter = Arc::new(filter);
        self
    }

    pub fn avoiding(mut self, flags: MaterialFlags) -> Self {
        self.avoid_material_flags = flags;
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }
}

/// Cached, clipped decal geometry for a single object
#[derive(Debug, Clone)]
pub struct DecalPrimitiveSet {
    settings: ClipSettings,
    /// Independent triangles, three vertices each
    vertices: Vec<DecalVertex>,
    bounds: BoundingBox,
    dirty: bool,
}

impl Default for DecalPrimitiveSet {
    fn default() -> Self {
        Self::new(ClipSettings::default())
    }
}

impl DecalPrimitiveSet {
    /// Create an empty set. New sets start dirty.
    pub fn new(settings: ClipSettings) -> Self {
        Self {
            settings,
            vertices: Vec::new(),
            bounds: BoundingBox::empty(),
            dirty: true,
        }
    }

    pub fn settings(&self) -> &ClipSettings {
        &self.settings
    }

    /// Mutable access to the settings. The set is marked dirty since the
    /// cached geometry may no longer match.
    pub fn settings_mut(&mut self) -> &mut ClipSettings {
        self.dirty = true;
        &mut self.settings
    }

    /// Drop all geometry and mark the set for regeneration
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.bounds = BoundingBox::empty();
        self.dirty = true;
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Offer a candidate triangle. It is appended only if the settings'
    /// filter accepts it, after the filter had a chance to rewrite it.
    pub fn push_triangle(
        &mut self,
        mut v0: DecalVertex,
        mut v1: DecalVertex,
        mut v2: DecalVertex,
    ) -> bool {
        let accepted = (self.settings.triangle_filter)(&self.settings, &mut v0, &mut v1, &mut v2);
        if accepted {
            self.vertices.extend_from_slice(&[v0, v1, v2]);
        }
        accepted
    }

    /// Output vertices, interpreted as independent triangles
    pub fn vertices(&self) -> &[DecalVertex] {
        &self.vertices
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Bounds of the output vertices; empty when there is no geometry
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    fn recompute_bounds(&mut self) {
        self.bounds = BoundingBox::from_points(self.vertices.iter().map(|v| v.pos()));
    }
}
