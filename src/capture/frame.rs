//! Captured frame type moved between the worker and the front end

use image::{Rgba, RgbaImage};

use crate::render::text;

/// Size of the stand-in frame produced when capture fails
pub const PLACEHOLDER_WIDTH: u32 = 640;
pub const PLACEHOLDER_HEIGHT: u32 = 360;

const PLACEHOLDER_BACKGROUND: [u8; 4] = [32, 32, 32, 255];
const PLACEHOLDER_TEXT: [u8; 4] = [235, 64, 52, 255];

/// A frame of RGBA pixels, optionally carrying the capture error it stands in for
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub rgba: RgbaImage,
    pub error: Option<String>,
}

impl Frame {
    pub fn new(rgba: RgbaImage) -> Self {
        Self { rgba, error: None }
    }

    /// Fixed-size frame with the error message rendered into its pixels, so
    /// later stages never special-case a missing capture.
    pub fn placeholder(message: impl Into<String>) -> Self {
        let message = message.into();
        let mut rgba =
            RgbaImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, Rgba(PLACEHOLDER_BACKGROUND));

        let max_chars = (PLACEHOLDER_WIDTH / text::GLYPH_SIZE).saturating_sub(4) as usize;
        let mut y = 24;
        text::draw_text(&mut rgba, 16, y, "NO FRAME", PLACEHOLDER_TEXT, 3);
        y += 40;
        for line in wrap(&message, max_chars) {
            text::draw_text(&mut rgba, 16, y, &line, PLACEHOLDER_TEXT, 1);
            y += 12;
        }

        Self {
            rgba,
            error: Some(message),
        }
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.rgba.height()
    }

    #[cfg(test)]
    pub fn is_placeholder(&self) -> bool {
        self.error.is_some()
    }
}

/// Greedy word wrap on character count
fn wrap(message: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in message.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
