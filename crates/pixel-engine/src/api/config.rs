use serde::{Deserialize, Serialize};

use crate::api::types::{Color, GridSize};

/// Configuration for the canvas engine, provided by the host once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasConfig {
    /// Grid width in cells.
    pub grid_width: u32,
    /// Grid height in cells.
    pub grid_height: u32,
    /// Size of one cell in screen pixels at scale 1.0.
    pub cell_size: f32,
    /// Lower zoom bound.
    pub min_scale: f32,
    /// Upper zoom bound.
    pub max_scale: f32,
    /// Pointer travel (screen px) past which a press becomes a pan instead of a tap.
    pub drag_threshold: f32,
    /// Multiplicative zoom step per wheel notch.
    pub wheel_zoom_step: f32,
    /// Seconds between forced energy display refreshes.
    pub balance_refresh_interval: f32,
    /// Energy capacity assumed until the server reports one.
    pub energy_capacity: u32,
    /// Seconds per regenerated energy unit, until the server reports a rate.
    pub regen_seconds: f64,
    /// Color of cells without a committed pixel.
    pub background: Color,
    /// Selectable colors. The first entry is selected initially.
    pub palette: Vec<Color>,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            grid_width: 500,
            grid_height: 500,
            cell_size: 10.0,
            min_scale: 0.2,
            max_scale: 8.0,
            drag_threshold: 5.0,
            wheel_zoom_step: 1.1,
            balance_refresh_interval: 1.0,
            energy_capacity: 10,
            regen_seconds: 60.0,
            background: Color::WHITE,
            palette: default_palette(),
        }
    }
}

fn default_palette() -> Vec<Color> {
    [
        "#000000", "#ffffff", "#888888", "#e4e4e4", "#a06a42", "#ffa7d1", "#e50000", "#e59500",
        "#e5d900", "#94e044", "#02be01", "#00d3dd", "#0083c7", "#0000ea", "#cf6ee4", "#820080",
    ]
    .iter()
    .filter_map(|hex| Color::parse_hex(hex))
    .collect()
}

/// Rejected configuration values.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("grid must be at least 1x1 (got {width}x{height})")]
    EmptyGrid { width: u32, height: u32 },
    #[error("cell size must be positive (got {0})")]
    CellSize(f32),
    #[error("scale bounds must satisfy 0 < min <= max (got {min}..{max})")]
    ScaleBounds { min: f32, max: f32 },
    #[error("wheel zoom step must be greater than 1 (got {0})")]
    WheelStep(f32),
    #[error("energy regeneration time must be positive (got {0})")]
    RegenSeconds(f64),
    #[error("palette must contain at least one color")]
    EmptyPalette,
}

impl CanvasConfig {
    /// Parse a config from JSON. Omitted fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::EmptyGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if !(self.cell_size > 0.0) {
            return Err(ConfigError::CellSize(self.cell_size));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= self.max_scale) {
            return Err(ConfigError::ScaleBounds {
                min: self.min_scale,
                max: self.max_scale,
            });
        }
        if !(self.wheel_zoom_step > 1.0) {
            return Err(ConfigError::WheelStep(self.wheel_zoom_step));
        }
        if !(self.regen_seconds > 0.0) {
            return Err(ConfigError::RegenSeconds(self.regen_seconds));
        }
        if self.palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        Ok(())
    }

    pub fn grid(&self) -> GridSize {
        GridSize::new(self.grid_width, self.grid_height)
    }

    /// Full grid extent in screen pixels at scale 1.0.
    pub fn grid_pixel_size(&self) -> glam::Vec2 {
        glam::Vec2::new(
            self.grid_width as f32 * self.cell_size,
            self.grid_height as f32 * self.cell_size,
        )
    }

    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}
