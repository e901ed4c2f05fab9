use crate::api::error::StageError;
use crate::api::types::{Color, GridPos, StagedPixel};

/// Locally staged, unsubmitted pixels in insertion order.
///
/// Sized by the energy budget (tens of pixels), so a flat Vec with linear lookup is enough.
/// The caller passes the current whole-unit balance as `limit`; insertion is refused once
/// `len() >= limit`, which keeps `len() <= floor(balance)`.
#[derive(Default)]
pub struct EditBuffer {
    pixels: Vec<StagedPixel>,
    revision: u64,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, pos: GridPos, color: Color, limit: usize) -> Result<(), StageError> {
        if self.contains(pos) {
            return Err(StageError::AlreadyStaged(pos));
        }
        if self.pixels.len() >= limit {
            return Err(StageError::InsufficientEnergy {
                staged: self.pixels.len(),
                available: limit,
            });
        }
        self.pixels.push(StagedPixel { pos, color });
        self.revision += 1;
        Ok(())
    }

    /// Erase a staged pixel. Cells without one (including committed cells) are rejected.
    pub fn unstage(&mut self, pos: GridPos) -> Result<StagedPixel, StageError> {
        let idx = self
            .pixels
            .iter()
            .position(|p| p.pos == pos)
            .ok_or(StageError::NotStaged(pos))?;
        self.revision += 1;
        Ok(self.pixels.remove(idx))
    }

    /// Remove the most recently staged pixel.
    pub fn undo_last(&mut self) -> Option<StagedPixel> {
        let last = self.pixels.pop()?;
        self.revision += 1;
        Some(last)
    }

    /// Discard everything. Returns how many pixels were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.pixels.len();
        if count > 0 {
            self.pixels.clear();
            self.revision += 1;
        }
        count
    }

    /// Remove exactly the given pixels (same cell and color) after a confirmed submit.
    /// Pixels staged or recolored while the submit was in flight stay.
    pub fn remove_submitted(&mut self, submitted: &[StagedPixel]) -> usize {
        let before = self.pixels.len();
        self.pixels.retain(|p| !submitted.contains(p));
        let removed = before - self.pixels.len();
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }

    pub fn get(&self, pos: GridPos) -> Option<&StagedPixel> {
        self.pixels.iter().find(|p| p.pos == pos)
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        self.get(pos).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedPixel> {
        self.pixels.iter()
    }

    pub fn as_slice(&self) -> &[StagedPixel] {
        &self.pixels
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
