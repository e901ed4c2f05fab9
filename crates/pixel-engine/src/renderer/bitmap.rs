use crate::api::types::{Color, GridSize};
use crate::store::committed::CommittedStore;
use crate::store::staged::EditBuffer;

/// Off-screen RGBA8 image of the whole grid, one texel per cell.
///
/// Scaling to screen happens in the host's blit, so composition cost does not depend on zoom.
/// Recomposition only runs when the committed or staged revision differs from the pair the
/// bitmap was last composed from.
pub struct PixelBitmap {
    grid: GridSize,
    background: Color,
    texels: Vec<Color>,
    composed_from: Option<(u64, u64)>,
    compositions: u64,
}

impl PixelBitmap {
    pub fn new(grid: GridSize, background: Color) -> Self {
        Self {
            grid,
            background,
            texels: vec![background; grid.cell_count()],
            composed_from: None,
            compositions: 0,
        }
    }

    /// Recompose if the pixel sets changed since the last composition. Returns true if it did.
    pub fn recompose_if_dirty(&mut self, committed: &CommittedStore, staged: &EditBuffer) -> bool {
        let key = (committed.revision(), staged.revision());
        if self.composed_from == Some(key) {
            return false;
        }
        self.compose(committed, staged);
        self.composed_from = Some(key);
        true
    }

    /// Committed pixels first, staged pixels on top.
    fn compose(&mut self, committed: &CommittedStore, staged: &EditBuffer) {
        self.texels.fill(self.background);
        for pixel in committed.iter() {
            if self.grid.contains(pixel.pos) {
                let idx = self.grid.index(pixel.pos);
                self.texels[idx] = pixel.color;
            }
        }
        for pixel in staged.iter() {
            if self.grid.contains(pixel.pos) {
                let idx = self.grid.index(pixel.pos);
                self.texels[idx] = pixel.color;
            }
        }
        self.compositions += 1;
        log::debug!(
            "recomposed bitmap: {} committed, {} staged",
            committed.len(),
            staged.len()
        );
    }

    pub fn width(&self) -> u32 {
        self.grid.width
    }

    pub fn height(&self) -> u32 {
        self.grid.height
    }

    pub fn texel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.grid.width || y >= self.grid.height {
            return None;
        }
        Some(self.texels[(y * self.grid.width + x) as usize])
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    /// Raw pointer to texel data for host reads out of wasm memory.
    pub fn bytes_ptr(&self) -> *const u8 {
        self.texels.as_ptr() as *const u8
    }

    pub fn byte_len(&self) -> usize {
        self.texels.len() * 4
    }

    /// Number of full compositions performed so far.
    pub fn compositions(&self) -> u64 {
        self.compositions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{CommittedPixel, GridPos};

    const RED: Color = Color::rgb(255, 0, 0);

    fn committed(grid: GridSize) -> CommittedStore {
        let mut store = CommittedStore::new(grid);
        store.merge([CommittedPixel {
            pos: GridPos::new(1, 0),
            color: Color::BLACK,
            owner_id: "u".into(),
            placed_at: None,
        }]);
        store
    }

    #[test]
    fn composes_committed_then_staged() {
        let grid = GridSize::new(4, 3);
        let store = committed(grid);
        let mut staged = EditBuffer::new();
        staged.stage(GridPos::new(1, 0), RED, 5).unwrap();
        staged.stage(GridPos::new(3, 2), RED, 5).unwrap();

        let mut bitmap = PixelBitmap::new(grid, Color::WHITE);
        assert!(bitmap.recompose_if_dirty(&store, &staged));
        assert_eq!(bitmap.texel(1, 0), Some(RED));
        assert_eq!(bitmap.texel(3, 2), Some(RED));
        assert_eq!(bitmap.texel(0, 0), Some(Color::WHITE));
        assert_eq!(bitmap.as_bytes().len(), 4 * 3 * 4);
        assert_eq!(&bitmap.as_bytes()[4..8], &[255, 0, 0, 255]);
    }

    #[test]
    fn skips_when_unchanged() {
        let grid = GridSize::new(4, 3);
        let store = committed(grid);
        let mut staged = EditBuffer::new();
        let mut bitmap = PixelBitmap::new(grid, Color::WHITE);
        assert!(bitmap.recompose_if_dirty(&store, &staged));
        assert!(!bitmap.recompose_if_dirty(&store, &staged));
        assert_eq!(bitmap.compositions(), 1);

        staged.stage(GridPos::new(0, 0), RED, 1).unwrap();
        assert!(bitmap.recompose_if_dirty(&store, &staged));
        assert_eq!(bitmap.compositions(), 2);
    }

    #[test]
    fn unstaging_reveals_committed_color() {
        let grid = GridSize::new(4, 3);
        let store = committed(grid);
        let mut staged = EditBuffer::new();
        staged.stage(GridPos::new(1, 0), RED, 1).unwrap();
        let mut bitmap = PixelBitmap::new(grid, Color::WHITE);
        bitmap.recompose_if_dirty(&store, &staged);
        staged.undo_last();
        bitmap.recompose_if_dirty(&store, &staged);
        assert_eq!(bitmap.texel(1, 0), Some(Color::BLACK));
    }
}
