//! Stock triangle predicates for [`ClipSettings::triangle_filter`].

use glam::Vec3;

use crate::constants::DECAL_EPSILON;
use crate::types::DecalVertex;

use super::ClipSettings;

/// Unit normal of a counter-clockwise triangle (zero when degenerate)
#[inline]
pub fn triangle_normal(v0: &DecalVertex, v1: &DecalVertex, v2: &DecalVertex) -> Vec3 {
    (v1.pos() - v0.pos())
        .cross(v2.pos() - v0.pos())
        .normalize_or_zero()
}

/// Rejects back-facing and edge-on triangles.
///
/// This is the default predicate.
pub fn facing_filter(
    settings: &ClipSettings,
    v0: &mut DecalVertex,
    v1: &mut DecalVertex,
    v2: &mut DecalVertex,
) -> bool {
    triangle_normal(v0, v1, v2).dot(settings.facing_dir) > DECAL_EPSILON
}

/// Facing test plus a conservative overlap test against the clip volume
pub fn shadow_filter(
    settings: &ClipSettings,
    v0: &mut DecalVertex,
    v1: &mut DecalVertex,
    v2: &mut DecalVertex,
) -> bool {
    facing_filter(settings, v0, v1, v2)
        && settings
            .clip_volume
            .is_triangle_inside(v0.pos(), v1.pos(), v2.pos())
}

/// Facing test that also darkens the triangle by how obliquely it faces.
///
/// Suits light-splash decals where surfaces at grazing angles should receive
/// less light.
pub fn shaded_facing_filter(
    settings: &ClipSettings,
    v0: &mut DecalVertex,
    v1: &mut DecalVertex,
    v2: &mut DecalVertex,
) -> bool {
    let facing = triangle_normal(v0, v1, v2).dot(settings.facing_dir);
    if facing <= DECAL_EPSILON {
        return false;
    }
    let shade = facing.min(1.0);
    for v in [v0, v1, v2] {
        v.color[0] *= shade;
        v.color[1] *= shade;
        v.color[2] *= shade;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use crate::volume::ClipVolume;

    fn triangle(a: Vec3, b: Vec3, c: Vec3) -> [DecalVertex; 3] {
        [DecalVertex::new(a), DecalVertex::new(b), DecalVertex::new(c)]
    }

    #[test]
    fn test_facing_filter_rejects_edge_on() {
        let settings = ClipSettings::facing(Vec3::Y);
        // Lies in the XY plane, normal +Z, perpendicular to the facing direction
        let [mut a, mut b, mut c] = triangle(Vec3::ZERO, Vec3::X, Vec3::Y);
        assert!(!facing_filter(&settings, &mut a, &mut b, &mut c));
    }

    #[test]
    fn test_facing_filter_accepts_upward_floor() {
        let settings = ClipSettings::facing(Vec3::Y);
        // Counter-clockwise seen from above
        let [mut a, mut b, mut c] = triangle(Vec3::ZERO, Vec3::Z, Vec3::X);
        assert!(facing_filter(&settings, &mut a, &mut b, &mut c));
    }

    #[test]
    fn test_shadow_filter_requires_overlap() {
        let volume = ClipVolume::from_box(&BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0)));
        let settings = ClipSettings::facing(Vec3::Y).with_custom_volume(volume);

        let [mut a, mut b, mut c] = triangle(Vec3::ZERO, Vec3::Z, Vec3::X);
        assert!(shadow_filter(&settings, &mut a, &mut b, &mut c));

        let offset = Vec3::new(10.0, 0.0, 0.0);
        let [mut a, mut b, mut c] = triangle(offset, offset + Vec3::Z, offset + Vec3::X);
        assert!(!shadow_filter(&settings, &mut a, &mut b, &mut c));
    }

    #[test]
    fn test_shaded_filter_scales_color() {
        let settings = ClipSettings::facing(Vec3::new(0.0, 1.0, 1.0));
        let [mut a, mut b, mut c] = triangle(Vec3::ZERO, Vec3::Z, Vec3::X);
        assert!(shaded_facing_filter(&settings, &mut a, &mut b, &mut c));

        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((a.color[0] - expected).abs() < 1e-5);
        assert!((c.color[2] - expected).abs() < 1e-5);
        // Alpha untouched
        assert_eq!(b.color[3], 1.0);
    }
}
