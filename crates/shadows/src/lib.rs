//! Umbra shadows - projected shadow decals for dynamic objects
//!
//! Each visible caster gets a square slice of a shared shadow atlas. The
//! caster is rendered into its slice from the light's point of view, and the
//! level geometry below it is clipped and projected into a decal that samples
//! the slice.
//!
//! - [`packer`] - Shelf packing of slices into the atlas
//! - [`caster`] - Caster descriptions, visibility and distance fade
//! - [`renderer`] - Backend contract for drawing slices and decals
//! - [`orchestrator`] - Frame-to-frame caching and the per-frame pass

pub mod caster;
pub mod constants;
pub mod orchestrator;
pub mod packer;
pub mod renderer;

pub use caster::*;
pub use constants::*;
pub use orchestrator::*;
pub use packer::*;
pub use renderer::*;
