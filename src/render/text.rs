//! Bitmap text drawn straight into RGBA buffers using the font8x8 glyph set

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage};

/// Glyph cell edge in unscaled pixels
pub const GLYPH_SIZE: u32 = 8;

/// Pixel size of `text` drawn at `scale`, single line
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let chars = text.chars().count() as u32;
    (chars * GLYPH_SIZE * scale, GLYPH_SIZE * scale)
}

/// Draw one line of text with its top-left corner at (x, y).
///
/// Pixels falling outside the image are clipped.
pub fn draw_text(img: &mut RgbaImage, x: i32, y: i32, text: &str, color: [u8; 4], scale: u32) {
    let scale = scale.max(1) as i32;
    let (w, h) = (img.width() as i32, img.height() as i32);
    let mut cursor_x = x;

    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += GLYPH_SIZE as i32 * scale;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            let bits = *row;
            for col_idx in 0..GLYPH_SIZE as i32 {
                if (bits >> col_idx) & 1 == 0 {
                    continue;
                }
                let px = cursor_x + col_idx * scale;
                let py = y + row_idx as i32 * scale;
                for sy in 0..scale {
                    for sx in 0..scale {
                        let (tx, ty) = (px + sx, py + sy);
                        if tx >= 0 && ty >= 0 && tx < w && ty < h {
                            img.put_pixel(tx as u32, ty as u32, Rgba(color));
                        }
                    }
                }
            }
        }
        cursor_x += GLYPH_SIZE as i32 * scale;
    }
}

/// Draw text over a filled backing box padded by `padding` pixels
pub fn draw_label(
    img: &mut RgbaImage,
    x: i32,
    y: i32,
    text: &str,
    color: [u8; 4],
    background: [u8; 4],
    scale: u32,
    padding: u32,
) {
    let (tw, th) = text_size(text, scale.max(1));
    fill_rect(
        img,
        x,
        y,
        tw + padding * 2,
        th + padding * 2,
        background,
    );
    draw_text(img, x + padding as i32, y + padding as i32, text, color, scale);
}

/// Fill an axis-aligned box, clipped to the image
pub fn fill_rect(img: &mut RgbaImage, x: i32, y: i32, width: u32, height: u32, color: [u8; 4]) {
    let x0 = x.max(0) as u32;
    let y0 = y.max(0) as u32;
    let x1 = ((x + width as i32).max(0) as u32).min(img.width());
    let y1 = ((y + height as i32).max(0) as u32).min(img.height());
    for py in y0..y1 {
        for px in x0..x1 {
            img.put_pixel(px, py, Rgba(color));
        }
    }
}
