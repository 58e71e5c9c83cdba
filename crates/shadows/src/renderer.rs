//! Render-target contract for atlas slices

use decals::{DecalPrimitiveRef, SharedGeometrySink, UvRect};
use glam::{Mat4, Vec3};
use umbra_config::TextureOrigin;

use crate::caster::CasterId;
use crate::packer::AtlasRect;

/// One caster draw into its atlas slice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CasterDraw {
    /// Target region of the atlas, in pixels, in the backend's origin convention
    pub viewport: AtlasRect,
    /// Projection x view of the slice. Horizontally mirrored to match the
    /// decal texture coordinates, so triangle winding appears reversed.
    pub view_proj: Mat4,
    /// Object-to-world transform of the caster
    pub world: Mat4,
    pub caster: CasterId,
}

/// Backend that draws casters into the shadow atlas and submits the decals
/// that sample it.
pub trait SliceRenderer {
    /// Bind the atlas as render target, optionally clearing it
    fn begin_atlas(&mut self, size: u32, clear: bool);

    fn render_caster(&mut self, draw: &CasterDraw);

    /// Hand off this frame's finished decal ranges
    fn submit_decals(&mut self, primitives: &[DecalPrimitiveRef], sink: &SharedGeometrySink);
}

/// Mirror clip-space x so a rendered slice lines up with projected UVs
pub fn mirrored_view_proj(view_proj: &Mat4) -> Mat4 {
    Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0)) * *view_proj
}

/// Viewport and texture-space rectangle for a packed slice.
///
/// `rect` is measured from the top-left. With a bottom-left origin both the
/// viewport and the UV rectangle are flipped vertically.
pub fn slice_targets(rect: &AtlasRect, atlas_size: u32, origin: TextureOrigin) -> (AtlasRect, UvRect) {
    let uv = rect.to_uv(atlas_size, atlas_size);
    match origin {
        TextureOrigin::TopLeft => (*rect, uv),
        TextureOrigin::BottomLeft => (
            rect.flipped_y(atlas_size),
            UvRect::new(
                uv.left_top.x,
                1.0 - uv.left_top.y,
                uv.right_bottom.x,
                1.0 - uv.right_bottom.y,
            ),
        ),
    }
}
