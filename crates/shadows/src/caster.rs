//! Shadow casters and per-frame view data

use decals::{BoundingBox, ClipVolume};
use glam::{Mat4, Vec3};

use crate::constants::{DEFAULT_LIGHT_DIRECTION, FADE_CUTOFF, FADE_EXPONENT};

/// Stable identifier of a caster across frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CasterId(pub u32);

/// An object that may cast a projected shadow this frame
#[derive(Debug, Clone, PartialEq)]
pub struct Caster {
    pub id: CasterId,
    /// Object-to-world transform
    pub transform: Mat4,
    /// Bounds in object space
    pub local_bounds: BoundingBox,
    /// False while the object's model is not loaded yet
    pub has_geometry: bool,
    /// Share the slice of another caster (e.g. a trailer following its truck)
    pub group_with: Option<CasterId>,
}

impl Caster {
    pub fn new(id: CasterId, transform: Mat4, local_bounds: BoundingBox) -> Self {
        Self {
            id,
            transform,
            local_bounds,
            has_geometry: true,
            group_with: None,
        }
    }

    pub fn grouped_with(mut self, leader: CasterId) -> Self {
        self.group_with = Some(leader);
        self
    }

    pub fn without_geometry(mut self) -> Self {
        self.has_geometry = false;
        self
    }

    /// Id of the caster whose slice this one is drawn into
    pub fn group_key(&self) -> CasterId {
        self.group_with.unwrap_or(self.id)
    }

    pub fn world_bounds(&self) -> BoundingBox {
        self.local_bounds.transformed(&self.transform)
    }
}

/// Camera and light state for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView {
    pub camera_position: Vec3,
    /// Direction the light travels in (towards the ground for a sun)
    pub light_direction: Vec3,
    /// Camera frustum for visibility culling, `None` to keep every caster
    pub view_frustum: Option<ClipVolume>,
}

impl FrameView {
    pub fn new(camera_position: Vec3, light_direction: Vec3) -> Self {
        Self {
            camera_position,
            light_direction,
            view_frustum: None,
        }
    }

    pub fn with_frustum(mut self, frustum: ClipVolume) -> Self {
        self.view_frustum = Some(frustum);
        self
    }

    /// Normalized light direction, straight down if unset
    pub fn light_dir(&self) -> Vec3 {
        self.light_direction.normalize_or(DEFAULT_LIGHT_DIRECTION)
    }

    /// Whether a caster's world bounds are inside the camera frustum
    pub fn is_visible(&self, bounds: &BoundingBox) -> bool {
        self.view_frustum
            .is_none_or(|frustum| frustum.is_box_inside(bounds.min, bounds.max))
    }
}

/// Distance fade: 1 at the camera, 0 at `fade_distance` and beyond
pub fn fade_factor(distance: f32, fade_distance: f32) -> f32 {
    let linear = (1.0 - distance / fade_distance).clamp(0.0, 1.0);
    linear.powf(FADE_EXPONENT)
}

/// Whether a fade factor is too small to be worth drawing
pub fn is_faded_out(fade: f32) -> bool {
    fade <= FADE_CUTOFF
}
