use glam::{IVec2, Vec2};

use crate::api::config::CanvasConfig;
use crate::core::transform::{centered_offset, clamp_offset, screen_to_grid, zoom_about};

/// Pan/zoom state of the on-screen view onto the grid.
///
/// The offset is re-clamped on every mutation, so a `Viewport` never shows the grid
/// pushed entirely out of view.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    /// Screen position of the grid's top-left corner.
    offset: Vec2,
    /// Zoom factor, within `[min_scale, max_scale]`.
    scale: f32,
    /// Host canvas size in screen pixels.
    size: Vec2,
    /// Grid extent in screen pixels at scale 1.0.
    grid_px: Vec2,
    cell_size: f32,
    min_scale: f32,
    max_scale: f32,
}

impl Viewport {
    pub fn new(config: &CanvasConfig, size: Vec2) -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: config.clamp_scale(1.0),
            size,
            grid_px: config.grid_pixel_size(),
            cell_size: config.cell_size,
            min_scale: config.min_scale,
            max_scale: config.max_scale,
        }
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Scaled grid extent in screen pixels.
    pub fn scaled_grid_size(&self) -> Vec2 {
        self.grid_px * self.scale
    }

    /// Cell under a screen point (may be outside the grid).
    pub fn screen_to_grid(&self, screen: Vec2) -> IVec2 {
        screen_to_grid(screen, self.offset, self.scale, self.cell_size)
    }

    /// The offset the viewport would take for `candidate` at `scale`.
    pub fn clamped(&self, candidate: Vec2, scale: f32) -> Vec2 {
        clamp_offset(candidate, scale, self.size, self.grid_px)
    }

    /// Offset and scale after zooming to `target_scale` around a screen anchor.
    pub fn zoomed_at(&self, anchor: Vec2, target_scale: f32) -> (Vec2, f32) {
        let scale = target_scale.clamp(self.min_scale, self.max_scale);
        let offset = zoom_about(anchor, self.offset, self.scale, scale);
        (self.clamped(offset, scale), scale)
    }

    /// Apply a new transform. Scale and offset are clamped. Returns true if anything changed.
    pub fn set_transform(&mut self, offset: Vec2, scale: f32) -> bool {
        let scale = scale.clamp(self.min_scale, self.max_scale);
        let offset = self.clamped(offset, scale);
        let changed = offset != self.offset || scale != self.scale;
        self.offset = offset;
        self.scale = scale;
        changed
    }

    /// Center the grid at the current scale. Run once after mount and on resize.
    pub fn center(&mut self) -> bool {
        let offset = centered_offset(self.scale, self.size, self.grid_px);
        self.set_transform(offset, self.scale)
    }

    /// Update the host canvas size and re-clamp the offset.
    pub fn resize(&mut self, size: Vec2) -> bool {
        let resized = size != self.size;
        self.size = size.max(Vec2::ZERO);
        let moved = self.set_transform(self.offset, self.scale);
        resized || moved
    }
}
