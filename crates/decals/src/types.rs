use bitflags::bitflags;
use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// A single vertex of projected decal geometry
///
/// This struct is designed for GPU upload with bytemuck.
/// Every field is a plain `f32` array so the layout has no padding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct DecalVertex {
    /// World-space position
    pub position: [f32; 3],
    /// Texture coordinate (atlas space after projection)
    pub uv: [f32; 2],
    /// RGBA color, multiplied by the projector tint
    pub color: [f32; 4],
}

impl Default for DecalVertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            uv: [0.0; 2],
            color: [1.0; 4],
        }
    }
}

impl DecalVertex {
    /// Create a white vertex with zeroed texture coordinates
    pub fn new(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            ..Self::default()
        }
    }

    /// Create a vertex with every attribute set
    pub fn with_attributes(position: Vec3, uv: Vec2, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            uv: uv.to_array(),
            color: color.to_array(),
        }
    }

    #[inline]
    pub fn pos(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    pub fn texcoord(&self) -> Vec2 {
        Vec2::from_array(self.uv)
    }

    #[inline]
    pub fn rgba(&self) -> Vec4 {
        Vec4::from_array(self.color)
    }

    /// Interpolate every attribute between `self` (t = 0) and `other` (t = 1)
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.pos().lerp(other.pos(), t).to_array(),
            uv: self.texcoord().lerp(other.texcoord(), t).to_array(),
            color: self.rgba().lerp(other.rgba(), t).to_array(),
        }
    }
}

/// Axis-aligned bounding box accumulated from decal vertices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that any added point will replace
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    /// Build the tightest box around a set of points
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut bounds = Self::empty();
        for point in points {
            bounds.include_point(point);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn include_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// The 8 corners, indexed by bit pattern (bit 0 = x max, bit 1 = y max, bit 2 = z max)
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 != 0 { self.max.x } else { self.min.x },
                if i & 2 != 0 { self.max.y } else { self.min.y },
                if i & 4 != 0 { self.max.z } else { self.min.z },
            )
        })
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Whether `other` lies entirely inside this box, allowing `tolerance` slack
    pub fn contains_box(&self, other: &BoundingBox, tolerance: f32) -> bool {
        other.min.cmpge(self.min - Vec3::splat(tolerance)).all()
            && other.max.cmple(self.max + Vec3::splat(tolerance)).all()
    }

    /// Transform all corners and re-fit an axis-aligned box around them
    pub fn transformed(&self, matrix: &glam::Mat4) -> BoundingBox {
        if self.is_empty() {
            return *self;
        }
        BoundingBox::from_points(self.corners().iter().map(|c| matrix.transform_point3(*c)))
    }
}

/// Axis-aligned rectangle in normalized texture space.
///
/// `left_top` holds the minimum corner; v grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvRect {
    pub left_top: Vec2,
    pub right_bottom: Vec2,
}

impl Default for UvRect {
    fn default() -> Self {
        Self::UNIT
    }
}

impl UvRect {
    /// The whole texture, (0,0)-(1,1)
    pub const UNIT: UvRect = UvRect {
        left_top: Vec2::ZERO,
        right_bottom: Vec2::ONE,
    };

    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left_top: Vec2::new(left, top),
            right_bottom: Vec2::new(right, bottom),
        }
    }

    pub fn size(&self) -> Vec2 {
        self.right_bottom - self.left_top
    }

    pub fn left_bottom(&self) -> Vec2 {
        Vec2::new(self.left_top.x, self.right_bottom.y)
    }

    pub fn right_top(&self) -> Vec2 {
        Vec2::new(self.right_bottom.x, self.left_top.y)
    }

    /// Whether a point lies inside, allowing `tolerance` slack on every edge
    pub fn contains(&self, point: Vec2, tolerance: f32) -> bool {
        point.x >= self.left_top.x - tolerance
            && point.x <= self.right_bottom.x + tolerance
            && point.y >= self.left_top.y - tolerance
            && point.y <= self.right_bottom.y + tolerance
    }
}

bitflags! {
    /// Surface material flags used to exclude geometry from receiving decals.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u32 {
        /// Water surfaces
        const WATER = 1 << 0;
        /// Surfaces that never receive decals
        const NO_DECALS = 1 << 1;
        /// Glass and other translucent surfaces
        const TRANSLUCENT = 1 << 2;
        /// Sky and skybox geometry
        const SKY = 1 << 3;
        /// Foliage, grass and other alpha-tested detail
        const FOLIAGE = 1 << 4;
        /// Dynamic objects (vehicles, debris)
        const DYNAMIC = 1 << 5;
    }
}
