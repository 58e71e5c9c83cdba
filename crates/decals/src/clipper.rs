//! Triangle-list clipping against planes.
//!
//! A Sutherland-Hodgman variant specialized to independent triangles: every
//! input triangle yields zero, one or two output triangles per plane, and new
//! vertices are interpolated (position, UV and color together) where an edge
//! crosses the plane. Vertices exactly on the plane count as inside.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::DecalVertex;
use crate::volume::{ClipVolume, Plane, PlaneIndex};

/// Which planes of a volume to clip against.
///
/// Planes are always visited in [`PlaneIndex::ALL`] order so the vertices
/// generated on shared edges stay the same from frame to frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipPlanes {
    /// Clip against all six planes
    #[default]
    All,
    /// Keep the raw geometry
    None,
    /// Clip against one plane only (diagnostics)
    Single(PlaneIndex),
}

impl ClipPlanes {
    /// Derive the selection from the `clip_enabled` / `debug_clip_plane` pair
    /// found in the pipeline config. Out-of-range plane numbers mean "all".
    pub fn from_debug_settings(clip_enabled: bool, debug_plane: i32) -> Self {
        if !clip_enabled {
            return ClipPlanes::None;
        }
        usize::try_from(debug_plane)
            .ok()
            .and_then(PlaneIndex::from_index)
            .map_or(ClipPlanes::All, ClipPlanes::Single)
    }

    /// Planes selected, in clip order
    pub fn indices(self) -> &'static [PlaneIndex] {
        match self {
            ClipPlanes::All => &PlaneIndex::ALL,
            ClipPlanes::None => &[],
            ClipPlanes::Single(index) => {
                let i = index.index();
                &PlaneIndex::ALL[i..=i]
            }
        }
    }
}

/// Clip a triangle list against a single plane, keeping the positive side.
///
/// `triangles.len()` must be a multiple of 3; a trailing partial triangle is ignored.
pub fn clip_triangles(triangles: &[DecalVertex], plane: &Plane) -> Vec<DecalVertex> {
    let mut output = Vec::with_capacity(triangles.len());
    clip_triangles_into(triangles, plane, &mut output);
    output
}

/// Clip against a single plane, appending the result to `output`.
///
/// Returns the number of triangles appended.
pub fn clip_triangles_into(
    triangles: &[DecalVertex],
    plane: &Plane,
    output: &mut Vec<DecalVertex>,
) -> usize {
    let before = output.len();
    for triangle in triangles.chunks_exact(3) {
        clip_triangle(triangle, plane, output);
    }
    (output.len() - before) / 3
}

/// Clip a triangle list in place against the selected planes of a volume.
///
/// `scratch` is reused between passes to avoid per-plane allocations.
pub fn clip_to_volume(
    vertices: &mut Vec<DecalVertex>,
    volume: &ClipVolume,
    planes: ClipPlanes,
    scratch: &mut Vec<DecalVertex>,
) {
    for &index in planes.indices() {
        if vertices.is_empty() {
            break;
        }
        scratch.clear();
        let kept = clip_triangles_into(vertices, volume.plane(index), scratch);
        trace!(
            "clip_to_volume: plane {:?} kept {} of {} triangles",
            index,
            kept,
            vertices.len() / 3
        );
        std::mem::swap(vertices, scratch);
    }
}

fn clip_triangle(triangle: &[DecalVertex], plane: &Plane, output: &mut Vec<DecalVertex>) {
    let distances = [
        plane.distance(triangle[0].pos()),
        plane.distance(triangle[1].pos()),
        plane.distance(triangle[2].pos()),
    ];
    let in_front = distances.map(|d| d >= 0.0);
    let front_count = in_front.iter().filter(|f| **f).count();

    match front_count {
        3 => output.extend_from_slice(triangle),
        0 => {}
        _ => {
            // Rotate so the run of in-front vertices starts at index 0,
            // preserving winding: (F, B, B) or (F, F, B)
            let offset = if front_count == 1 {
                in_front.iter().position(|f| *f).unwrap_or(0)
            } else {
                (in_front.iter().position(|f| !*f).unwrap_or(0) + 1) % 3
            };
            let v = |i: usize| (triangle[(offset + i) % 3], distances[(offset + i) % 3]);
            let (a, da) = v(0);
            let (b, db) = v(1);
            let (c, dc) = v(2);

            if front_count == 1 {
                let ab = a.lerp(&b, crossing(da, db));
                let ac = a.lerp(&c, crossing(da, dc));
                output.extend_from_slice(&[a, ab, ac]);
            } else {
                let bc = b.lerp(&c, crossing(db, dc));
                let ac = a.lerp(&c, crossing(da, dc));
                output.extend_from_slice(&[a, b, bc, a, bc, ac]);
            }
        }
    }
}

/// Interpolation factor where the edge from distance `from` to `to` crosses zero
#[inline]
fn crossing(from: f32, to: f32) -> f32 {
    let denom = from - to;
    if denom.abs() <= f32::EPSILON {
        0.0
    } else {
        (from / denom).clamp(0.0, 1.0)
    }
}
