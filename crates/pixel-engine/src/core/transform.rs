//! Screen ↔ grid coordinate math.
//!
//! Screen space is the host canvas in CSS pixels with the origin at its top-left corner.
//! A cell `(x, y)` covers `offset + [x, x+1) * cell_size * scale` on each axis.
//! All functions here are pure and deterministic.

use glam::{IVec2, Vec2};

/// Map a screen point to the (possibly out-of-grid) cell under it.
pub fn screen_to_grid(screen: Vec2, offset: Vec2, scale: f32, cell_size: f32) -> IVec2 {
    ((screen - offset) / (cell_size * scale)).floor().as_ivec2()
}

/// Screen position of a cell's center.
pub fn grid_to_screen(cell: IVec2, offset: Vec2, scale: f32, cell_size: f32) -> Vec2 {
    offset + (cell.as_vec2() + Vec2::splat(0.5)) * (cell_size * scale)
}

/// Restrict an offset so the scaled grid stays anchored to the viewport.
///
/// Per axis: when the scaled grid is narrower than the viewport the offset may sit anywhere
/// in `[0, slack]`; when wider, in `[slack, 0]` (slack is negative), so neither grid edge
/// retreats inside the viewport.
pub fn clamp_offset(candidate: Vec2, scale: f32, viewport: Vec2, grid_px: Vec2) -> Vec2 {
    let slack = viewport - grid_px * scale;
    let min = slack.min(Vec2::ZERO);
    let max = slack.max(Vec2::ZERO);
    candidate.clamp(min, max)
}

/// Offset that centers the scaled grid in the viewport.
pub fn centered_offset(scale: f32, viewport: Vec2, grid_px: Vec2) -> Vec2 {
    (viewport - grid_px * scale) * 0.5
}

/// New offset after changing scale so that `anchor` keeps pointing at the same grid point.
pub fn zoom_about(anchor: Vec2, offset: Vec2, old_scale: f32, new_scale: f32) -> Vec2 {
    let grid_point = (anchor - offset) / old_scale;
    anchor - grid_point * new_scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const CELL: f32 = 10.0;

    #[test]
    fn tap_resolves_to_cell() {
        let cell = screen_to_grid(Vec2::new(405.0, 305.0), Vec2::ZERO, 1.0, CELL);
        assert_eq!(cell, IVec2::new(40, 30));
    }

    #[test]
    fn negative_side_floors_down() {
        let cell = screen_to_grid(Vec2::new(5.0, 5.0), Vec2::new(10.0, 10.0), 1.0, CELL);
        assert_eq!(cell, IVec2::new(-1, -1));
    }

    #[test]
    fn scale_affects_cell_size() {
        let cell = screen_to_grid(Vec2::new(45.0, 19.0), Vec2::ZERO, 2.0, CELL);
        assert_eq!(cell, IVec2::new(2, 0));
        let cell = screen_to_grid(Vec2::new(45.0, 19.0), Vec2::ZERO, 0.5, CELL);
        assert_eq!(cell, IVec2::new(9, 3));
    }

    #[test]
    fn clamp_large_grid_keeps_edges_outside() {
        let viewport = Vec2::new(800.0, 600.0);
        let grid = Vec2::new(1000.0, 1000.0);
        assert_eq!(clamp_offset(Vec2::new(50.0, 50.0), 1.0, viewport, grid), Vec2::ZERO);
        assert_eq!(
            clamp_offset(Vec2::new(-900.0, -900.0), 1.0, viewport, grid),
            Vec2::new(-200.0, -400.0)
        );
    }

    #[test]
    fn clamp_small_grid_allows_slack() {
        let viewport = Vec2::new(800.0, 600.0);
        let grid = Vec2::new(1000.0, 1000.0);
        // scaled grid is 200x200, slack is 600x400
        let clamped = clamp_offset(Vec2::new(300.0, 900.0), 0.2, viewport, grid);
        assert_eq!(clamped, Vec2::new(300.0, 400.0));
        let clamped = clamp_offset(Vec2::new(-10.0, 10.0), 0.2, viewport, grid);
        assert_eq!(clamped, Vec2::new(0.0, 10.0));
    }

    #[test]
    fn centered_offset_is_within_clamp() {
        let viewport = Vec2::new(800.0, 600.0);
        let grid = Vec2::new(1000.0, 1000.0);
        for scale in [0.2, 0.5, 1.0, 3.0] {
            let center = centered_offset(scale, viewport, grid);
            assert_eq!(clamp_offset(center, scale, viewport, grid), center);
        }
    }

    #[test]
    fn zoom_about_keeps_anchor() {
        let anchor = Vec2::new(400.0, 300.0);
        let offset = Vec2::new(-120.0, -40.0);
        let before = (anchor - offset) / (CELL * 1.0);
        let new_offset = zoom_about(anchor, offset, 1.0, 2.5);
        let after = (anchor - new_offset) / (CELL * 2.5);
        assert!((before - after).length() < 1e-4);
    }

    proptest! {
        #[test]
        fn grid_screen_round_trip(
            x in 0i32..500,
            y in 0i32..500,
            ox in -5000.0f32..5000.0,
            oy in -5000.0f32..5000.0,
            scale in 0.2f32..8.0,
        ) {
            let cell = IVec2::new(x, y);
            let offset = Vec2::new(ox, oy);
            let screen = grid_to_screen(cell, offset, scale, CELL);
            prop_assert_eq!(screen_to_grid(screen, offset, scale, CELL), cell);
        }

        #[test]
        fn clamp_is_idempotent(
            cx in -20_000.0f32..20_000.0,
            cy in -20_000.0f32..20_000.0,
            scale in 0.2f32..8.0,
            vw in 1.0f32..4000.0,
            vh in 1.0f32..4000.0,
        ) {
            let viewport = Vec2::new(vw, vh);
            let grid = Vec2::new(5000.0, 5000.0);
            let once = clamp_offset(Vec2::new(cx, cy), scale, viewport, grid);
            let twice = clamp_offset(once, scale, viewport, grid);
            prop_assert_eq!(once, twice);
        }
    }
}
