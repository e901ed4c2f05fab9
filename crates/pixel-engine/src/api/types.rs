use std::fmt;
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};
use glam::IVec2;
use serde::{Deserialize, Serialize};

/// Wall-clock time in milliseconds since the Unix epoch (same unit as `Date.now()`).
pub type Millis = f64;

/// Integer cell coordinates inside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
}

impl GridPos {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Parse a `"x:y"` key. Returns None for anything else.
    pub fn from_key(key: &str) -> Option<Self> {
        let (x, y) = key.split_once(':')?;
        Some(Self::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
    }
}

impl From<GridPos> for IVec2 {
    fn from(pos: GridPos) -> Self {
        IVec2::new(pos.x as i32, pos.y as i32)
    }
}

/// Fixed grid dimensions for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Resolve a possibly out-of-range cell. Cells outside `[0, w) × [0, h)` yield None.
    pub fn cell(&self, cell: IVec2) -> Option<GridPos> {
        if cell.x < 0 || cell.y < 0 {
            return None;
        }
        let pos = GridPos::new(cell.x as u32, cell.y as u32);
        self.contains(pos).then_some(pos)
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Row-major index of a cell.
    pub fn index(&self, pos: GridPos) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// An RGBA8 color. Travels over the wire as a `#rrggbb` string.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional, case-insensitive).
    pub fn parse_hex(text: &str) -> Option<Self> {
        let hex = text.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => {
                let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Self::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Error for color strings that are not hex colors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color {0:?}")]
pub struct InvalidColor(pub String);

impl FromStr for Color {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s).ok_or_else(|| InvalidColor(s.to_string()))
    }
}

impl TryFrom<String> for Color {
    type Error = InvalidColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// A server-confirmed cell color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedPixel {
    pub pos: GridPos,
    pub color: Color,
    /// Owner as reported by the server. Empty when the payload omitted it.
    pub owner_id: String,
    /// Placement time, if the server sent one.
    pub placed_at: Option<Millis>,
}

/// A local edit that has not been submitted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedPixel {
    pub pos: GridPos,
    pub color: Color,
}
