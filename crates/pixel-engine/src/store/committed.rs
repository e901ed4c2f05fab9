use std::collections::HashMap;

use crate::api::types::{CommittedPixel, GridPos, GridSize};

/// Server-authoritative pixels, at most one per cell.
///
/// Written only from server pushes (snapshot or incremental batch) and from
/// acknowledged submits. `revision` bumps on every effective change.
pub struct CommittedStore {
    grid: GridSize,
    pixels: HashMap<GridPos, CommittedPixel>,
    revision: u64,
}

impl CommittedStore {
    pub fn new(grid: GridSize) -> Self {
        Self {
            grid,
            pixels: HashMap::new(),
            revision: 0,
        }
    }

    /// Replace everything with a full snapshot. Out-of-grid pixels are dropped.
    pub fn replace_all(&mut self, snapshot: impl IntoIterator<Item = CommittedPixel>) {
        self.pixels.clear();
        let dropped = self.insert_all(snapshot);
        if dropped > 0 {
            log::warn!("canvas snapshot: dropped {} out-of-grid pixels", dropped);
        }
        self.revision += 1;
    }

    /// Merge an ordered batch; the last value for a cell wins. Returns the number applied.
    pub fn merge(&mut self, batch: impl IntoIterator<Item = CommittedPixel>) -> usize {
        let before = self.revision;
        let mut applied = 0;
        for pixel in batch {
            if !self.grid.contains(pixel.pos) {
                log::warn!("ignoring pixel outside grid at {:?}", pixel.pos);
                continue;
            }
            if self.pixels.get(&pixel.pos) != Some(&pixel) {
                self.pixels.insert(pixel.pos, pixel);
                applied += 1;
            }
        }
        if applied > 0 {
            self.revision = before + 1;
        }
        applied
    }

    fn insert_all(&mut self, pixels: impl IntoIterator<Item = CommittedPixel>) -> usize {
        let mut dropped = 0;
        for pixel in pixels {
            if self.grid.contains(pixel.pos) {
                self.pixels.insert(pixel.pos, pixel);
            } else {
                dropped += 1;
            }
        }
        dropped
    }

    pub fn get(&self, pos: GridPos) -> Option<&CommittedPixel> {
        self.pixels.get(&pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommittedPixel> {
        self.pixels.values()
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
