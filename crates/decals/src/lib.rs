//! Umbra decals - projected decal geometry
//!
//! This crate turns world triangles into clipped, texture-mapped decal
//! geometry:
//! - [`volume`] - Planes and six-plane convex clip volumes
//! - [`clipper`] - Triangle-list clipping against planes
//! - [`projector`] - Texture coordinate projection into atlas rectangles
//! - [`primitives`] - Per-object cached decal geometry with dirty tracking
//! - [`source`] - Geometry source contract and streamed level geometry
//! - [`placement`] - One-shot world decals at a surface point
//! - [`sink`] - Shared per-frame vertex/index arena
//! - [`types`] - GPU-compatible vertex, bounds and material flags

pub mod clipper;
pub mod constants;
pub mod placement;
pub mod primitives;
pub mod projector;
pub mod sink;
pub mod source;
pub mod types;
pub mod volume;

pub use clipper::*;
pub use constants::*;
pub use placement::*;
pub use primitives::*;
pub use projector::*;
pub use sink::*;
pub use source::*;
pub use types::*;
pub use volume::*;
