use bytemuck::{Pod, Zeroable};

use crate::api::types::StagedPixel;
use crate::core::viewport::Viewport;

/// Where the host draws the off-screen bitmap on the visible canvas.
/// 8 floats = 32 bytes stride, read directly out of wasm memory.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Blit {
    /// Source bitmap width in texels (grid cells).
    pub src_width: f32,
    /// Source bitmap height in texels.
    pub src_height: f32,
    /// Destination top-left in screen pixels.
    pub dst_x: f32,
    pub dst_y: f32,
    /// Destination size in screen pixels.
    pub dst_width: f32,
    pub dst_height: f32,
    /// Visible canvas size, for clearing.
    pub viewport_width: f32,
    pub viewport_height: f32,
}

impl Blit {
    pub const FLOATS: usize = 8;
    pub const STRIDE_BYTES: usize = Self::FLOATS * 4;

    pub fn from_viewport(viewport: &Viewport, grid_width: u32, grid_height: u32) -> Self {
        let dst = viewport.scaled_grid_size();
        Self {
            src_width: grid_width as f32,
            src_height: grid_height as f32,
            dst_x: viewport.offset().x,
            dst_y: viewport.offset().y,
            dst_width: dst.x,
            dst_height: dst.y,
            viewport_width: viewport.size().x,
            viewport_height: viewport.size().y,
        }
    }
}

/// Everything the host needs to redraw one animation frame.
pub struct RenderFrame<'a> {
    pub blit: Blit,
    /// RGBA8 bitmap bytes, `src_width * src_height * 4`.
    pub bitmap: &'a [u8],
    /// True if the bitmap was recomposed for this frame and must be re-uploaded.
    pub bitmap_changed: bool,
    /// Staged cells, so the host can outline them.
    pub staged: &'a [StagedPixel],
    /// Screen size of one cell at the current zoom.
    pub cell_screen_size: f32,
}
