//! Overlay layout constants and screen-space math

use crate::domain::Polygon;
use crate::session::ViewportMapper;

/// Code outline constants
pub mod outline {
    /// Shadow stroke added on each side of the colored outline
    pub const SHADOW: f32 = 1.5;
    /// Alpha of the shadow stroke
    pub const SHADOW_ALPHA: u8 = 160;
}

/// Text overlay constants
pub mod label {
    /// Glyph scale of the Manual/Auto label
    pub const MODE_SCALE: u32 = 2;
    /// Glyph scale of the payload tooltip
    pub const TOOLTIP_SCALE: u32 = 1;
    /// Padding around label text
    pub const PADDING: u32 = 3;
    /// Distance of the mode label from the preview corner
    pub const MARGIN: i32 = 6;
    /// Tooltip offset from the pointer
    pub const TOOLTIP_OFFSET: (i32, i32) = (12, 16);
    /// Longest payload shown in a tooltip before truncation
    pub const TOOLTIP_MAX_CHARS: usize = 48;
    pub const TEXT: [u8; 4] = [255, 255, 255, 255];
    pub const BACKGROUND: [u8; 4] = [0, 0, 0, 255];
}

/// Product photo constants
pub mod photo {
    /// Edge of the square photo placeholder
    pub const PLACEHOLDER_SIZE: u32 = 128;
}

/// Polygon corners in preview coordinates
pub fn polygon_to_screen(polygon: &Polygon, viewport: &ViewportMapper) -> Vec<(f32, f32)> {
    polygon
        .points()
        .iter()
        .map(|p| viewport.to_screen_space(p.x as f32, p.y as f32))
        .collect()
}

/// Keep a box of `size` at `pos` inside `bounds`, shifting it back when it
/// would run off the right or bottom edge
pub fn clamp_box(pos: (i32, i32), size: (u32, u32), bounds: (u32, u32)) -> (i32, i32) {
    let max_x = bounds.0 as i32 - size.0 as i32;
    let max_y = bounds.1 as i32 - size.1 as i32;
    (pos.0.min(max_x).max(0), pos.1.min(max_y).max(0))
}
