/// Fade exponent applied to the linear camera-distance falloff.
pub const FADE_EXPONENT: f32 = 0.8;

/// Casters whose fade factor falls to or below this are skipped for the frame.
pub const FADE_CUTOFF: f32 = 0.01;

/// How far past the caster's center a shadow volume reaches, in caster radii.
pub const SHADOW_REACH: f32 = 4.0;

/// Per-element matrix tolerance below which a caster counts as stationary.
pub const MOVE_EPSILON: f32 = 1e-4;

/// Fallback light direction when none is given: straight down.
pub const DEFAULT_LIGHT_DIRECTION: glam::Vec3 = glam::Vec3::NEG_Y;
