/// Minimum facing dot product for a triangle to receive a decal.
pub const DECAL_EPSILON: f32 = 0.00001;

/// Tolerance used when checking clipped vertices against their planes.
pub const CLIP_EPSILON: f32 = 1e-4;

/// Number of planes in a convex clip volume.
pub const CLIP_PLANE_COUNT: usize = 6;

/// Depth of a spawned world decal as a fraction of its width.
pub const DECAL_DEPTH_SCALE: f32 = 0.5;

/// Vertices below this count are projected serially even when a parallel
/// projection is requested.
pub const PARALLEL_PROJECT_THRESHOLD: usize = 4096;
