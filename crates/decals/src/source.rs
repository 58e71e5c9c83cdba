//! Geometry sources feeding primitive sets.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use glam::Vec3;
use tracing::debug;

use crate::primitives::DecalPrimitiveSet;
use crate::types::{BoundingBox, DecalVertex, MaterialFlags};
use crate::volume::ClipVolume;

/// Supplies world triangles that may receive a decal.
///
/// Implementations append candidates to `set` with
/// [`DecalPrimitiveSet::push_triangle`], never replace what is already there,
/// and leave the set's settings alone. They should skip geometry whose
/// material intersects `set.settings().avoid_material_flags` and may use
/// `frustum` for coarse rejection. Implementations guard their own data;
/// the pipeline may query from several threads at once.
pub trait GeometrySource: Send + Sync {
    fn decal_polygons(&self, set: &mut DecalPrimitiveSet, frustum: Option<&ClipVolume>);
}

/// A world triangle with its surface material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTriangle {
    pub positions: [Vec3; 3],
    pub material: MaterialFlags,
}

impl SourceTriangle {
    pub fn new(positions: [Vec3; 3], material: MaterialFlags) -> Self {
        Self { positions, material }
    }
}

#[derive(Debug, Default)]
struct Region {
    triangles: Vec<SourceTriangle>,
    bounds: BoundingBox,
}

/// Level geometry split into independently streamed regions.
///
/// Regions can be inserted and removed while other threads query decal
/// polygons; reads and writes are serialized by an `RwLock`.
pub struct LevelGeometry {
    regions: RwLock<HashMap<u32, Region>>,
}

impl std::fmt::Debug for LevelGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (region_count, triangle_count) = self
            .regions
            .read()
            .map(|r| (r.len(), r.values().map(|region| region.triangles.len()).sum::<usize>()))
            .unwrap_or((0, 0));
        f.debug_struct("LevelGeometry")
            .field("region_count", &region_count)
            .field("triangle_count", &triangle_count)
            .finish()
    }
}

impl Default for LevelGeometry {
    fn default() -> Self {
        Self {
            regions: RwLock::new(HashMap::new()),
        }
    }
}

impl LevelGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a region's triangles
    pub fn insert_region(&self, region_id: u32, triangles: Vec<SourceTriangle>) {
        let bounds = BoundingBox::from_points(triangles.iter().flat_map(|t| t.positions));
        debug!(
            "LevelGeometry: region {} streamed in with {} triangles",
            region_id,
            triangles.len()
        );
        let mut regions = self.regions.write().unwrap_or_else(PoisonError::into_inner);
        regions.insert(region_id, Region { triangles, bounds });
    }

    /// Unload a region. Returns whether it was present.
    pub fn remove_region(&self, region_id: u32) -> bool {
        let mut regions = self.regions.write().unwrap_or_else(PoisonError::into_inner);
        let removed = regions.remove(&region_id).is_some();
        if removed {
            debug!("LevelGeometry: region {} streamed out", region_id);
        }
        removed
    }

    pub fn clear(&self) {
        self.regions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn region_count(&self) -> usize {
        self.regions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total triangles across all loaded regions
    pub fn triangle_count(&self) -> usize {
        self.regions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|r| r.triangles.len())
            .sum()
    }
}

impl GeometrySource for LevelGeometry {
    fn decal_polygons(&self, set: &mut DecalPrimitiveSet, frustum: Option<&ClipVolume>) {
        let avoid = set.settings().avoid_material_flags;
        let regions = self.regions.read().unwrap_or_else(PoisonError::into_inner);

        for region in regions.values() {
            if region.bounds.is_empty() {
                continue;
            }
            if frustum.is_some_and(|v| !v.is_box_inside(region.bounds.min, region.bounds.max)) {
                continue;
            }

            for triangle in &region.triangles {
                if triangle.material.intersects(avoid) {
                    continue;
                }
                let [a, b, c] = triangle.positions;
                if frustum.is_some_and(|v| !v.is_triangle_inside(a, b, c)) {
                    continue;
                }
                set.push_triangle(DecalVertex::new(a), DecalVertex::new(b), DecalVertex::new(c));
            }
        }
    }
}
